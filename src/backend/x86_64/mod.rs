//! x86-64 register file.

pub mod regs;
