use super::{ControlFlowGraph, RegAllocError};
use crate::{
    collections::storage::ArenaPtr,
    ir::{Function, SymbolTable, Variable},
};

/// Record, for every block, which variables each line defines and uses.
///
/// Variables are numbered here, so a variable's [VarId](super::VarId) is the
/// order of its first reference: block order, then line order, definitions
/// of a line before its uses.
pub fn analyze_on_function(
    cfg: &mut ControlFlowGraph,
    func: &Function,
    symbols: &SymbolTable,
) -> Result<(), RegAllocError> {
    let check = |var: Variable| {
        if var.try_deref(symbols).is_none() {
            return Err(RegAllocError::UnknownVariable {
                function: func.name.clone(),
                handle: var.handle(),
            });
        }
        Ok(var)
    };

    for block in cfg.blocks.iter_mut() {
        for line in block.lines() {
            let du = func.insts[line].def_use();

            for var in du.defs {
                let id = cfg.vars.intern(check(var)?);
                if !block.defs_at(line).contains(&id) {
                    block.add_def(id, line);
                }
            }
            for var in du.uses {
                let id = cfg.vars.intern(check(var)?);
                if !block.uses_at(line).contains(&id) {
                    block.add_use(id, line);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use crate::{
        backend::reg_alloc::{ControlFlowGraph, RegAllocError, VarId},
        ir::{text::parse_module, Instruction, Opcode, Operand, SymbolTable, Type},
    };

    #[test]
    fn test_defuse_per_line() {
        let src = "
            .func f
            .var a int
            .var b int
            .var arr int
                = a, 1
                + b, a, a
                = arr[b], a
                += a, b
                RETURN a
            .endfunc
        ";
        let module = parse_module(src).unwrap();
        let cfg = ControlFlowGraph::build(&module.funcs[0], &module.symbols).unwrap();
        let block = &cfg.blocks()[0];
        let (a, b, arr) = (VarId::new(0), VarId::new(1), VarId::new(2));

        assert_eq!(cfg.vars().len(), 3);
        assert_eq!(block.defs_at(0), &[a]);
        // the same variable read twice on a line is recorded once
        assert_eq!(block.uses_at(1), &[a]);
        assert_eq!(block.defs_at(1), &[b]);
        // storing into an element reads the base and the index
        assert_eq!(block.defs_at(2), &[] as &[VarId]);
        assert_eq!(block.uses_at(2), &[arr, b, a]);
        assert_eq!(block.defs_at(3), &[a]);
        assert_eq!(block.uses_at(3), &[a, b]);
        assert_eq!(block.uses()[&a], vec![1, 2, 3, 4]);
        assert_eq!(block.defs()[&a], vec![0, 3]);
    }

    #[test]
    fn test_unknown_variable() {
        let module = parse_module(".func f\n.endfunc").unwrap();
        let mut func = module.funcs.into_iter().next().unwrap();

        // a handle from a table the function does not belong to
        let mut other = SymbolTable::new();
        let scope = other.new_scope(None);
        let stray = other.declare(scope, "stray", Type::Int).unwrap();
        func.insts
            .push(Instruction::new(Opcode::Return, vec![Operand::Var(stray)]));

        let err = ControlFlowGraph::build(&func, &module.symbols);
        assert!(matches!(
            err,
            Err(RegAllocError::UnknownVariable { ref function, handle: 0 }) if function == "f"
        ));
        if let Err(err) = err {
            assert_eq!(
                err.to_string(),
                "in function `f`: variable #0 is not in the symbol table"
            );
        }
    }
}
