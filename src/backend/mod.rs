//! # Backend
//!
//! - `regs`: Physical registers and register kinds.
//! - `x86_64`: The x86-64 register file and its allocatable pools.
//! - `reg_alloc`: Register allocation over three-address code.

pub mod reg_alloc;
pub mod regs;
pub mod x86_64;

pub use regs::{PReg, RegKind};
