use std::fmt;

use rustc_hash::FxHashMap;

use crate::ir::Variable;

/// Dense index of a variable within one allocation run.
///
/// Ids are handed out in first-reference order, so they double as the
/// tie-breaker wherever the allocator has to pick among equals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    pub fn new(index: usize) -> Self { Self(index as u32) }

    pub fn index(self) -> usize { self.0 as usize }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "v{}", self.0) }
}

/// Bidirectional mapping between [Variable] handles and [VarId]s.
#[derive(Debug, Clone, Default)]
pub struct VarNumbering {
    vars: Vec<Variable>,
    ids: FxHashMap<Variable, VarId>,
}

impl VarNumbering {
    pub fn new() -> Self { Self::default() }

    /// Get the id of a variable, numbering it if it is new.
    pub fn intern(&mut self, var: Variable) -> VarId {
        if let Some(id) = self.ids.get(&var) {
            return *id;
        }
        let id = VarId::new(self.vars.len());
        self.vars.push(var);
        self.ids.insert(var, id);
        id
    }

    pub fn id(&self, var: Variable) -> Option<VarId> { self.ids.get(&var).copied() }

    pub fn var(&self, id: VarId) -> Variable { self.vars[id.index()] }

    pub fn len(&self) -> usize { self.vars.len() }

    pub fn is_empty(&self) -> bool { self.vars.is_empty() }

    /// Iterate in id order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, Variable)> + '_ {
        self.vars
            .iter()
            .enumerate()
            .map(|(index, var)| (VarId::new(index), *var))
    }
}

#[cfg(test)]
mod test {
    use super::{VarId, VarNumbering};
    use crate::ir::{SymbolTable, Type};

    #[test]
    fn test_intern_is_stable() {
        let mut symbols = SymbolTable::new();
        let scope = symbols.new_scope(None);
        let a = symbols.declare(scope, "a", Type::Int).unwrap();
        let b = symbols.declare(scope, "b", Type::Int).unwrap();

        let mut numbering = VarNumbering::new();
        assert_eq!(numbering.intern(b), VarId::new(0));
        assert_eq!(numbering.intern(a), VarId::new(1));
        assert_eq!(numbering.intern(b), VarId::new(0));
        assert_eq!(numbering.len(), 2);
        assert_eq!(numbering.var(VarId::new(1)), a);
        assert_eq!(numbering.id(a), Some(VarId::new(1)));
        assert_eq!(
            numbering.iter().map(|(_, v)| v).collect::<Vec<_>>(),
            vec![b, a]
        );
    }
}
