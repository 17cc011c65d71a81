//! Textual three-address code.
//!
//! One instruction per line, `#` starts a comment:
//!
//! ```text
//! .var counter int          # a global
//! .func sum
//! .var n int
//! .var s int
//!         = s, 0
//! loop:   > t, n, 0
//! ...
//! .endfunc
//! ```
//!
//! Directives:
//!
//! - `.func NAME` / `.endfunc` open and close a function.
//! - `.var NAME TYPE` declares a variable in the innermost open scope.
//! - `.scope` / `.endscope` open and close a nested scope inside a function.
//!
//! An instruction is `[label:] OPCODE [operand {, operand}]`. A line holding
//! only a label becomes a labelled `NOP`. Operands are literals (numbers,
//! `true`, `false`, `null`, `'c'`, `"s"`), variables (`x`, `x.field`,
//! `x[i]`) or, in the label position of `JUMP`, `IF_FALSE_JUMP`, `CALL` and
//! `MCALL`, a label. Variables resolve against the scopes open on that line.

use thiserror::Error;

use super::{Function, Instruction, IrError, Module, Opcode, Operand, Scope};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    /// 1-based source line.
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("unknown opcode `{0}`")]
    UnknownOpcode(String),

    #[error("`{0}` is not declared")]
    UnknownVariable(String),

    #[error("malformed operand `{0}`")]
    BadOperand(String),

    #[error("malformed directive `{0}`")]
    BadDirective(String),

    #[error("`{0}` is only allowed inside a function")]
    OutsideFunction(String),

    #[error("function `{0}` is still open")]
    UnterminatedFunction(String),

    #[error("`.endscope` without a matching `.scope`")]
    UnbalancedScope,

    #[error(transparent)]
    Ir(#[from] IrError),
}

struct OpenFunction {
    name: String,
    scopes: Vec<Scope>,
    insts: Vec<Instruction>,
}

struct TextParser {
    module: Module,
    global: Scope,
    func: Option<OpenFunction>,
}

/// Parse a module from its textual form.
pub fn parse_module(src: &str) -> Result<Module, ParseError> {
    let mut module = Module::default();
    let global = module.symbols.new_scope(None);
    let mut parser = TextParser {
        module,
        global,
        func: None,
    };

    for (index, line) in src.lines().enumerate() {
        parser
            .parse_line(line)
            .map_err(|kind| ParseError {
                line: index + 1,
                kind,
            })?;
    }

    if let Some(func) = parser.func {
        return Err(ParseError {
            line: src.lines().count(),
            kind: ParseErrorKind::UnterminatedFunction(func.name),
        });
    }

    Ok(parser.module)
}

fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '#') => return &line[..i],
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    line
}

/// Split on top-level commas, keeping quoted literals and brackets intact.
fn split_operands(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote = None;
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = s[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

fn is_ident(s: &str) -> bool {
    s.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_literal(s: &str) -> bool {
    if matches!(s, "true" | "false" | "null") {
        return true;
    }
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        return true;
    }
    let digits = s.strip_prefix('-').unwrap_or(s);
    digits.starts_with(|c: char| c.is_ascii_digit())
        && digits
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

impl TextParser {
    fn current_scope(&self) -> Scope {
        self.func
            .as_ref()
            .and_then(|f| f.scopes.last().copied())
            .unwrap_or(self.global)
    }

    fn open_func(&mut self, directive: &str) -> Result<&mut OpenFunction, ParseErrorKind> {
        self.func
            .as_mut()
            .ok_or_else(|| ParseErrorKind::OutsideFunction(directive.to_string()))
    }

    fn parse_line(&mut self, line: &str) -> Result<(), ParseErrorKind> {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return Ok(());
        }
        if line.starts_with('.') {
            return self.parse_directive(line);
        }

        let (label, rest) = match line.split_once(char::is_whitespace) {
            Some((first, rest)) if first.ends_with(':') => (Some(first), rest.trim()),
            None if line.ends_with(':') => (Some(line), ""),
            _ => (None, line),
        };
        let label = label.map(|l| l.trim_end_matches(':'));
        if let Some(label) = label {
            if !is_ident(label) {
                return Err(ParseErrorKind::BadOperand(label.to_string()));
            }
        }

        let (opcode_str, operands_str) = rest
            .split_once(char::is_whitespace)
            .map(|(op, args)| (op, args.trim()))
            .unwrap_or((rest, ""));
        let opcode: Opcode = opcode_str
            .parse()
            .map_err(|_| ParseErrorKind::UnknownOpcode(opcode_str.to_string()))?;

        let mut operands = Vec::new();
        for (index, text) in split_operands(operands_str).into_iter().enumerate() {
            if opcode.label_operand() == Some(index) {
                if !is_ident(text) {
                    return Err(ParseErrorKind::BadOperand(text.to_string()));
                }
                operands.push(Operand::Label(text.to_string()));
            } else {
                operands.push(self.parse_operand(text)?);
            }
        }

        let mut inst = Instruction::new(opcode, operands);
        if let Some(label) = label {
            inst = inst.with_label(label);
        }
        self.open_func(opcode_str)?.insts.push(inst);
        Ok(())
    }

    fn parse_operand(&self, text: &str) -> Result<Operand, ParseErrorKind> {
        if is_literal(text) {
            return Ok(Operand::Literal(text.to_string()));
        }

        let resolve = |name: &str| {
            if !is_ident(name) {
                return Err(ParseErrorKind::BadOperand(text.to_string()));
            }
            self.module
                .symbols
                .lookup(self.current_scope(), name)
                .ok_or_else(|| ParseErrorKind::UnknownVariable(name.to_string()))
        };

        if let Some(open) = text.find('[') {
            let index = text[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| ParseErrorKind::BadOperand(text.to_string()))?;
            let base = resolve(&text[..open])?;
            let index = self.parse_operand(index.trim())?;
            return Ok(Operand::Element(base, Box::new(index)));
        }

        if let Some((base, field)) = text.split_once('.') {
            if !is_ident(field) {
                return Err(ParseErrorKind::BadOperand(text.to_string()));
            }
            return Ok(Operand::Member(resolve(base)?, field.to_string()));
        }

        Ok(Operand::Var(resolve(text)?))
    }

    fn parse_directive(&mut self, line: &str) -> Result<(), ParseErrorKind> {
        let mut words = line.split_whitespace();
        let directive = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        let bad = || ParseErrorKind::BadDirective(line.to_string());

        match (directive, args.as_slice()) {
            (".func", [name]) if is_ident(name) => {
                if let Some(open) = &self.func {
                    return Err(ParseErrorKind::UnterminatedFunction(open.name.clone()));
                }
                let scope = self.module.symbols.new_scope(Some(self.global));
                self.func = Some(OpenFunction {
                    name: name.to_string(),
                    scopes: vec![scope],
                    insts: Vec::new(),
                });
            }
            (".endfunc", []) => {
                let func = self
                    .func
                    .take()
                    .ok_or_else(|| ParseErrorKind::OutsideFunction(directive.to_string()))?;
                if func.scopes.len() != 1 {
                    return Err(ParseErrorKind::UnbalancedScope);
                }
                self.module.funcs.push(Function {
                    name: func.name,
                    scope: func.scopes[0],
                    insts: func.insts,
                });
            }
            (".var", [name, ty]) if is_ident(name) => {
                let ty = ty.parse()?;
                let scope = self.current_scope();
                self.module.symbols.declare(scope, *name, ty)?;
            }
            (".scope", []) => {
                let parent = self.current_scope();
                let scope = self.module.symbols.new_scope(Some(parent));
                self.open_func(directive)?.scopes.push(scope);
            }
            (".endscope", []) => {
                let func = self.open_func(directive)?;
                if func.scopes.len() <= 1 {
                    return Err(ParseErrorKind::UnbalancedScope);
                }
                func.scopes.pop();
            }
            _ => return Err(bad()),
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{parse_module, ParseErrorKind};
    use crate::ir::{BinaryOp, Opcode, Operand, Type};

    #[test]
    fn test_parse_function() {
        let src = r#"
            .var g int            # global
            .func f
            .var a int
            .var s string
                    = a, 1
            top:    + a, a, g
                    = s, "x, # y"
                    IF_FALSE_JUMP a, top
            end:
                    RETURN a
            .endfunc
        "#;
        let module = parse_module(src).unwrap();
        let func = module.func("f").unwrap();
        assert_eq!(func.insts.len(), 6);

        let symbols = &module.symbols;
        let a = symbols.lookup(func.scope, "a").unwrap();
        let g = symbols.lookup(func.scope, "g").unwrap();

        assert_eq!(func.insts[1].label.as_deref(), Some("top"));
        assert_eq!(func.insts[1].opcode, Opcode::Binary(BinaryOp::Add));
        assert_eq!(
            func.insts[1].operands,
            vec![Operand::Var(a), Operand::Var(a), Operand::Var(g)]
        );
        assert_eq!(
            func.insts[2].operands[1],
            Operand::Literal("\"x, # y\"".into())
        );
        assert_eq!(func.insts[3].jump_target(), Some("top"));
        assert_eq!(func.insts[4].opcode, Opcode::Nop);
        assert!(func.insts[4].has_label());
        assert_eq!(a.ty(symbols), &Type::Int);
    }

    #[test]
    fn test_nested_scope_shadowing() {
        let src = "
            .func f
            .var x int
                = x, 1
            .scope
            .var x double
                = x, 2.5
            .endscope
                RETURN x
            .endfunc
        ";
        let module = parse_module(src).unwrap();
        let func = &module.funcs[0];
        let outer = func.insts[0].operands[0].base().unwrap();
        let inner = func.insts[1].operands[0].base().unwrap();
        let ret = func.insts[2].operands[0].base().unwrap();
        assert_ne!(outer, inner);
        assert_eq!(outer, ret);
        assert_eq!(inner.ty(&module.symbols), &Type::Double);
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_module(".func f\n  = y, 1\n.endfunc").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, ParseErrorKind::UnknownVariable("y".into()));

        let err = parse_module(".func f\n  FOO a\n.endfunc").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownOpcode("FOO".into()));

        let err = parse_module(".func f\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnterminatedFunction("f".into()));

        let err = parse_module("  RETURN").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::OutsideFunction("RETURN".into()));

        let err = parse_module(".func f\n.endscope\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnbalancedScope);
    }

    #[test]
    fn test_member_and_element_operands() {
        let src = "
            .func f
            .var p Point
            .var arr IntArray
            .var i int
                = p.x, arr[i]
            .endfunc
        ";
        let module = parse_module(src).unwrap();
        let func = &module.funcs[0];
        let symbols = &module.symbols;
        let p = symbols.lookup(func.scope, "p").unwrap();
        let arr = symbols.lookup(func.scope, "arr").unwrap();
        let i = symbols.lookup(func.scope, "i").unwrap();
        assert_eq!(
            func.insts[0].operands,
            vec![
                Operand::Member(p, "x".into()),
                Operand::Element(arr, Box::new(Operand::Var(i)))
            ]
        );
        assert_eq!(
            func.insts[0].display(symbols).to_string(),
            "= p.x, arr[i]"
        );
    }
}
