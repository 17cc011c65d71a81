use std::{fmt, str::FromStr};

use super::IrError;

/// The type expression attached to a declared variable.
///
/// Only the storage-relevant part of the source type is kept here: the
/// register allocator needs to know which register file a value lives in and
/// how many bytes it takes when spilled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    /// IEEE 754 single precision.
    Float,
    /// IEEE 754 double precision.
    Double,
    Bool,
    /// A UTF-16 code unit.
    Char,
    /// A string, stored as a pointer.
    String,
    /// An instance of a user-defined class, stored as a pointer.
    Class(String),
}

impl Type {
    /// Size in bytes of a value of this type in a stack slot.
    ///
    /// Strings and class instances are references, so they take a full
    /// pointer.
    pub fn size(&self) -> usize {
        match self {
            Type::Int | Type::Float => 4,
            Type::Double => 8,
            Type::Bool => 1,
            Type::Char => 2,
            Type::String | Type::Class(_) => 8,
        }
    }

    /// Whether values of this type travel in floating point registers.
    pub fn is_floating_point(&self) -> bool { matches!(self, Type::Float | Type::Double) }
}

impl FromStr for Type {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s {
            "int" => Type::Int,
            "float" => Type::Float,
            "double" => Type::Double,
            "bool" => Type::Bool,
            "char" => Type::Char,
            "string" => Type::String,
            _ => {
                let is_ident = s
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                    && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                if !is_ident {
                    return Err(IrError::UnknownType(s.to_string()));
                }
                Type::Class(s.to_string())
            }
        };
        Ok(ty)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::String => write!(f, "string"),
            Type::Class(name) => write!(f, "{}", name),
        }
    }
}
