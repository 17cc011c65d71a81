use rustc_hash::FxHashMap;

use super::{IrError, Type};
use crate::{
    collections::storage::{ArenaAlloc, ArenaPtr, BaseArena, BaseArenaPtr},
    impl_arena,
};

/// A declared program variable.
#[derive(Debug)]
pub struct VariableData {
    name: String,
    ty: Type,
    scope: Scope,
}

/// Handle to a declared variable.
///
/// Identity is the declaration, not the spelling: `x` in a nested scope is a
/// different [Variable] from `x` in the enclosing one. Handles order by
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(BaseArenaPtr<VariableData>);

/// A lexical scope.
#[derive(Debug)]
pub struct ScopeData {
    parent: Option<Scope>,
    names: FxHashMap<String, Variable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(BaseArenaPtr<ScopeData>);

/// The symbol table of a module.
///
/// All variables of all functions share one table, functions only differ in
/// the scopes they resolve names in.
#[derive(Debug, Default)]
pub struct SymbolTable {
    vars: BaseArena<VariableData>,
    scopes: BaseArena<ScopeData>,
}

impl_arena!(SymbolTable, VariableData, Variable, vars);
impl_arena!(SymbolTable, ScopeData, Scope, scopes);

impl SymbolTable {
    pub fn new() -> Self { Self::default() }

    /// Open a new scope, nested in `parent` if given.
    pub fn new_scope(&mut self, parent: Option<Scope>) -> Scope {
        self.alloc(ScopeData {
            parent,
            names: FxHashMap::default(),
        })
    }

    /// Declare a variable in a scope.
    ///
    /// Shadowing a name of an enclosing scope is allowed, redeclaring a name
    /// in the same scope is not.
    pub fn declare(
        &mut self,
        scope: Scope,
        name: impl Into<String>,
        ty: Type,
    ) -> Result<Variable, IrError> {
        let name = name.into();
        if scope.deref(self).names.contains_key(&name) {
            return Err(IrError::Redeclared(name));
        }
        let var = self.alloc(VariableData {
            name: name.clone(),
            ty,
            scope,
        });
        scope.deref_mut(self).names.insert(name, var);
        Ok(var)
    }

    /// Resolve a name from `scope` outwards.
    pub fn lookup(&self, scope: Scope, name: &str) -> Option<Variable> {
        let mut curr = Some(scope);
        while let Some(scope) = curr {
            let data = scope.deref(self);
            if let Some(var) = data.names.get(name) {
                return Some(*var);
            }
            curr = data.parent;
        }
        None
    }

    /// Number of declared variables.
    pub fn num_variables(&self) -> usize { self.vars.len() }
}

impl Variable {
    pub fn name(self, symbols: &SymbolTable) -> &str { &self.deref(symbols).name }

    pub fn ty(self, symbols: &SymbolTable) -> &Type { &self.deref(symbols).ty }

    pub fn scope(self, symbols: &SymbolTable) -> Scope { self.deref(symbols).scope }

    /// The declaration index of the handle, stable without a symbol table.
    pub fn handle(self) -> usize { self.0.id() }
}

impl Scope {
    pub fn parent(self, symbols: &SymbolTable) -> Option<Scope> { self.deref(symbols).parent }
}
