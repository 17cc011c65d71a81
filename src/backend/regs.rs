use core::fmt;

use crate::ir::Type;

/// The kind of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegKind {
    /// The general purpose register, holding integers, booleans, characters
    /// and pointers.
    General,
    /// The floating point register.
    Float,
}

impl RegKind {
    /// The register file a value of type `ty` is kept in.
    pub fn of_type(ty: &Type) -> Self {
        if ty.is_floating_point() {
            RegKind::Float
        } else {
            RegKind::General
        }
    }
}

impl fmt::Display for RegKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegKind::General => write!(f, "general purpose"),
            RegKind::Float => write!(f, "floating point"),
        }
    }
}

/// The physical register.
///
/// Register number and kind are kept apart, the number is the hardware
/// encoding within the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PReg(u8, RegKind);

impl PReg {
    pub const fn new(num: u8, kind: RegKind) -> Self { Self(num, kind) }

    pub const fn num(&self) -> u8 { self.0 }

    pub const fn kind(&self) -> RegKind { self.1 }
}

impl fmt::Display for PReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", super::x86_64::regs::display_preg(*self))
    }
}

#[cfg(test)]
mod test {
    use super::RegKind;
    use crate::ir::Type;

    #[test]
    fn test_reg_kind_of_type() {
        assert_eq!(RegKind::of_type(&Type::Float), RegKind::Float);
        assert_eq!(RegKind::of_type(&Type::Double), RegKind::Float);
        assert_eq!(RegKind::of_type(&Type::Char), RegKind::General);
        assert_eq!(RegKind::of_type(&Type::Class("A".into())), RegKind::General);
    }
}
