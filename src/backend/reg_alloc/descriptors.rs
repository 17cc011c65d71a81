use std::fmt;

use super::VarId;
use crate::backend::PReg;

/// A place a variable's value can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Reg(PReg),
    /// Byte offset into the function's spill area.
    Mem(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Reg(reg) => write!(f, "{}", reg),
            Location::Mem(offset) => write!(f, "[spill+{}]", offset),
        }
    }
}

/// Where a variable lives.
///
/// A list rather than a single location: a value may sit in a register and
/// in its spill slot at the same time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableDescriptor {
    locations: Vec<Location>,
}

impl VariableDescriptor {
    pub fn new() -> Self { Self::default() }

    pub fn locations(&self) -> &[Location] { &self.locations }

    pub fn add_location(&mut self, location: Location) {
        if !self.locations.contains(&location) {
            self.locations.push(location);
        }
    }

    pub fn remove_location(&mut self, location: Location) {
        self.locations.retain(|l| *l != location);
    }

    /// The first register location.
    pub fn register(&self) -> Option<PReg> {
        self.locations.iter().find_map(|l| match l {
            Location::Reg(reg) => Some(*reg),
            Location::Mem(_) => None,
        })
    }

    /// The first memory location.
    pub fn memory(&self) -> Option<usize> {
        self.locations.iter().find_map(|l| match l {
            Location::Mem(offset) => Some(*offset),
            Location::Reg(_) => None,
        })
    }
}

/// Which variables currently occupy a register.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterDescriptor {
    vars: Vec<VarId>,
}

impl RegisterDescriptor {
    pub fn new() -> Self { Self::default() }

    pub fn vars(&self) -> &[VarId] { &self.vars }

    pub fn add_var(&mut self, var: VarId) {
        if !self.vars.contains(&var) {
            self.vars.push(var);
        }
    }

    pub fn is_free(&self) -> bool { self.vars.is_empty() }

    /// Forget all occupants, returning them.
    pub fn take(&mut self) -> Vec<VarId> { std::mem::take(&mut self.vars) }
}

#[cfg(test)]
mod test {
    use super::{Location, VariableDescriptor};
    use crate::backend::x86_64::regs::{rax, rbx};

    #[test]
    fn test_variable_descriptor() {
        let mut desc = VariableDescriptor::new();
        assert_eq!(desc.register(), None);

        desc.add_location(Location::Mem(8));
        desc.add_location(Location::Reg(rbx()));
        desc.add_location(Location::Reg(rax()));
        desc.add_location(Location::Reg(rbx()));
        assert_eq!(desc.locations().len(), 3);
        assert_eq!(desc.register(), Some(rbx()));
        assert_eq!(desc.memory(), Some(8));

        desc.remove_location(Location::Reg(rbx()));
        assert_eq!(desc.register(), Some(rax()));
        assert_eq!(Location::Mem(8).to_string(), "[spill+8]");
    }
}
