//! # Three-Address Code
//!
//! The linear IR consumed by the register allocator. The front end produces a
//! [Module]: one [SymbolTable] and a list of [Function]s, each a flat list of
//! [Instruction]s with an optional label, an [Opcode] and up to three
//! operands.
//!
//! - `ty`: Type expressions of declared variables.
//! - `symbol`: Scoped symbol table and the [Variable] handle.
//! - `inst`: Instructions, operands and the per-instruction def/use table.
//! - `text`: A line-oriented textual form of a module.

mod inst;
mod symbol;
mod ty;

pub mod text;

pub use inst::{
    BinaryOp,
    DefUse,
    Function,
    Instruction,
    Module,
    Opcode,
    Operand,
    UnaryOp,
};
pub use symbol::{Scope, ScopeData, SymbolTable, Variable, VariableData};
use thiserror::Error;
pub use ty::Type;

/// Errors raised while building the IR.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IrError {
    /// The type expression is neither a builtin nor a class name.
    #[error("unknown type expression: {0:?}")]
    UnknownType(String),

    /// The name is already declared in the same scope.
    #[error("`{0}` is already declared in this scope")]
    Redeclared(String),
}
