use std::{fmt, str::FromStr};

use super::{Scope, SymbolTable, Variable};

/// Three-address opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// An instruction that only carries a label.
    Nop,
    FuncBegin,
    FuncEnd,
    Jump,
    IfFalseJump,
    Return,
    Param,
    Call,
    MCall,
    Alloc,
    AllocArray,
    Del,
    /// `arg0 = arg1`
    Assign,
    /// `arg0 op= arg1`
    CompoundAssign(BinaryOp),
    /// `arg0 = arg1 op arg2`
    Binary(BinaryOp),
    /// `arg0 = op arg1`
    Unary(UnaryOp),
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    Cast,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }

    /// Comparisons have no compound-assignment form.
    fn is_arith(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }
}

const BINARY_OPS: [BinaryOp; 11] = [
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::Div,
    BinaryOp::Rem,
    BinaryOp::Lt,
    BinaryOp::Le,
    BinaryOp::Gt,
    BinaryOp::Ge,
    BinaryOp::Eq,
    BinaryOp::Ne,
];

impl Opcode {
    /// Whether the instruction transfers control and ends a basic block.
    pub fn is_jump(self) -> bool { matches!(self, Opcode::Jump | Opcode::IfFalseJump) }

    /// Index of the operand naming a label or a function, if any.
    pub fn label_operand(self) -> Option<usize> {
        match self {
            Opcode::Jump | Opcode::Call | Opcode::MCall | Opcode::FuncBegin => Some(0),
            Opcode::IfFalseJump => Some(1),
            _ => None,
        }
    }
}

impl FromStr for Opcode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let opcode = match s {
            "" | "NOP" => Opcode::Nop,
            "FUNC_BEGIN" => Opcode::FuncBegin,
            "FUNC_END" => Opcode::FuncEnd,
            "JUMP" => Opcode::Jump,
            "IF_FALSE_JUMP" => Opcode::IfFalseJump,
            "RETURN" => Opcode::Return,
            "PARAM" => Opcode::Param,
            "CALL" => Opcode::Call,
            "MCALL" => Opcode::MCall,
            "ALLOC" => Opcode::Alloc,
            "ALLOC_ARRAY" => Opcode::AllocArray,
            "DEL" => Opcode::Del,
            "=" => Opcode::Assign,
            "NEG" => Opcode::Unary(UnaryOp::Neg),
            "!" => Opcode::Unary(UnaryOp::Not),
            "CAST" => Opcode::Unary(UnaryOp::Cast),
            "++" => Opcode::Inc,
            "--" => Opcode::Dec,
            _ => {
                if let Some(op) = BINARY_OPS.iter().find(|op| op.symbol() == s) {
                    Opcode::Binary(*op)
                } else if let Some(op) = s.strip_suffix('=').and_then(|s| {
                    BINARY_OPS
                        .iter()
                        .find(|op| op.is_arith() && op.symbol() == s)
                }) {
                    Opcode::CompoundAssign(*op)
                } else {
                    return Err(());
                }
            }
        };
        Ok(opcode)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Nop => write!(f, "NOP"),
            Opcode::FuncBegin => write!(f, "FUNC_BEGIN"),
            Opcode::FuncEnd => write!(f, "FUNC_END"),
            Opcode::Jump => write!(f, "JUMP"),
            Opcode::IfFalseJump => write!(f, "IF_FALSE_JUMP"),
            Opcode::Return => write!(f, "RETURN"),
            Opcode::Param => write!(f, "PARAM"),
            Opcode::Call => write!(f, "CALL"),
            Opcode::MCall => write!(f, "MCALL"),
            Opcode::Alloc => write!(f, "ALLOC"),
            Opcode::AllocArray => write!(f, "ALLOC_ARRAY"),
            Opcode::Del => write!(f, "DEL"),
            Opcode::Assign => write!(f, "="),
            Opcode::CompoundAssign(op) => write!(f, "{}=", op.symbol()),
            Opcode::Binary(op) => write!(f, "{}", op.symbol()),
            Opcode::Unary(UnaryOp::Neg) => write!(f, "NEG"),
            Opcode::Unary(UnaryOp::Not) => write!(f, "!"),
            Opcode::Unary(UnaryOp::Cast) => write!(f, "CAST"),
            Opcode::Inc => write!(f, "++"),
            Opcode::Dec => write!(f, "--"),
        }
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A jump target or a callee name.
    Label(String),
    /// A literal, kept in its source spelling.
    Literal(String),
    /// A variable read or written as a whole.
    Var(Variable),
    /// `base.field`
    Member(Variable, String),
    /// `base[index]`
    Element(Variable, Box<Operand>),
}

impl Operand {
    /// The variable whose storage this operand denotes, if any.
    pub fn base(&self) -> Option<Variable> {
        match self {
            Operand::Label(_) | Operand::Literal(_) => None,
            Operand::Var(var) | Operand::Member(var, _) | Operand::Element(var, _) => Some(*var),
        }
    }

    /// Variables read by evaluating this operand as a value.
    fn collect_reads(&self, uses: &mut Vec<Variable>) {
        match self {
            Operand::Label(_) | Operand::Literal(_) => {}
            Operand::Var(var) | Operand::Member(var, _) => uses.push(*var),
            Operand::Element(var, index) => {
                uses.push(*var);
                index.collect_reads(uses);
            }
        }
    }

    /// Variables affected by storing into this operand.
    ///
    /// Storing into a member or element writes through the base pointer, so
    /// the base is read, not redefined.
    fn collect_writes(&self, defs: &mut Vec<Variable>, uses: &mut Vec<Variable>) {
        match self {
            Operand::Var(var) => defs.push(*var),
            _ => self.collect_reads(uses),
        }
    }

    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> DisplayOperand<'a> {
        DisplayOperand {
            operand: self,
            symbols,
        }
    }
}

pub struct DisplayOperand<'a> {
    operand: &'a Operand,
    symbols: &'a SymbolTable,
}

impl fmt::Display for DisplayOperand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::Label(label) => write!(f, "{}", label),
            Operand::Literal(lit) => write!(f, "{}", lit),
            Operand::Var(var) => write!(f, "{}", var.name(self.symbols)),
            Operand::Member(var, field) => write!(f, "{}.{}", var.name(self.symbols), field),
            Operand::Element(var, index) => write!(
                f,
                "{}[{}]",
                var.name(self.symbols),
                index.display(self.symbols)
            ),
        }
    }
}

/// The variables an instruction defines and uses.
///
/// A variable may appear in both lists, e.g. for `+= x, 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefUse {
    pub defs: Vec<Variable>,
    pub uses: Vec<Variable>,
}

/// A three-address instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub label: Option<String>,
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self {
            label: None,
            opcode,
            operands,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether a jump may target this instruction.
    pub fn has_label(&self) -> bool { self.label.as_ref().is_some_and(|l| !l.is_empty()) }

    fn operand(&self, index: usize) -> Option<&Operand> { self.operands.get(index) }

    /// The label operand of a jump.
    pub fn jump_target(&self) -> Option<&str> {
        if !self.opcode.is_jump() {
            return None;
        }
        match self.operand(self.opcode.label_operand()?)? {
            Operand::Label(label) => Some(label),
            _ => None,
        }
    }

    /// Compute the variables defined and used by this instruction.
    pub fn def_use(&self) -> DefUse {
        let mut du = DefUse::default();

        let read = |index: usize, du: &mut DefUse| {
            if let Some(operand) = self.operand(index) {
                operand.collect_reads(&mut du.uses);
            }
        };
        let write = |index: usize, du: &mut DefUse| {
            if let Some(operand) = self.operand(index) {
                operand.collect_writes(&mut du.defs, &mut du.uses);
            }
        };

        match self.opcode {
            Opcode::Assign | Opcode::Unary(_) | Opcode::AllocArray => {
                write(0, &mut du);
                read(1, &mut du);
            }
            Opcode::CompoundAssign(_) => {
                read(0, &mut du);
                write(0, &mut du);
                read(1, &mut du);
            }
            Opcode::Binary(_) => {
                write(0, &mut du);
                read(1, &mut du);
                read(2, &mut du);
            }
            Opcode::Inc | Opcode::Dec => {
                read(0, &mut du);
                write(0, &mut du);
            }
            Opcode::IfFalseJump | Opcode::Return | Opcode::Param | Opcode::Del => {
                read(0, &mut du);
            }
            Opcode::Alloc => write(0, &mut du),
            // the callee never touches the caller's locals
            Opcode::Call
            | Opcode::MCall
            | Opcode::Jump
            | Opcode::FuncBegin
            | Opcode::FuncEnd
            | Opcode::Nop => {}
        }

        du
    }

    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> DisplayInstruction<'a> {
        DisplayInstruction {
            inst: self,
            symbols,
        }
    }
}

pub struct DisplayInstruction<'a> {
    inst: &'a Instruction,
    symbols: &'a SymbolTable,
}

impl fmt::Display for DisplayInstruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.inst.label {
            write!(f, "{}: ", label)?;
        }
        write!(f, "{}", self.inst.opcode)?;
        for (i, operand) in self.inst.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, operand.display(self.symbols))?;
        }
        Ok(())
    }
}

/// A function: the unit of register allocation.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    /// The outermost scope of the function body.
    pub scope: Scope,
    pub insts: Vec<Instruction>,
}

/// A list of functions sharing one symbol table.
#[derive(Debug, Default)]
pub struct Module {
    pub symbols: SymbolTable,
    pub funcs: Vec<Function>,
}

impl Module {
    pub fn func(&self, name: &str) -> Option<&Function> { self.funcs.iter().find(|f| f.name == name) }
}
