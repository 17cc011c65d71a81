//! # Register Allocation
//!
//! This module implements graph coloring register allocation over the
//! three-address code of one function, and its utilities.
//!
//! - `basic_block`: Basic blocks and their per-line def/use records.
//! - `control_flow_graph`: Block partitioning and control flow edges.
//! - `block_defuse_analysis`: Block-level def-use analysis.
//! - `liveness_analysis`: Liveness analysis (aka. in and out set).
//! - `live_interval_analysis`: Per-block live ranges, merged per variable.
//! - `interference_graph`: The interference graph, built from live sets.
//! - `descriptors`: Variable and register descriptors.
//! - `graph_coloring_allocation`: Simplify/spill/select allocator.
//!
//! The passes run strictly in the order above. [ControlFlowGraph::build]
//! partitions and collects def/use, [ControlFlowGraph::analyze_liveness]
//! runs the two liveness passes, and [GraphColoringAllocation] does the rest.

pub mod basic_block;
pub mod block_defuse_analysis;
pub mod control_flow_graph;
pub mod descriptors;
pub mod graph_coloring_allocation;
pub mod interference_graph;
pub mod live_interval_analysis;
pub mod liveness_analysis;
pub mod numbering;

pub use basic_block::{BasicBlock, BlockId};
pub use control_flow_graph::ControlFlowGraph;
pub use descriptors::{Location, RegisterDescriptor, VariableDescriptor};
pub use graph_coloring_allocation::{AllocationResult, GraphColoringAllocation};
pub use interference_graph::InterferenceGraph;
pub use live_interval_analysis::{merge_ranges, LiveInfo, Range};
pub use numbering::{VarId, VarNumbering};
use thiserror::Error;

use super::{
    x86_64::regs::{allocatable_fp_regs, allocatable_gp_regs},
    PReg,
    RegKind,
};

/// Configuration of the register allocator.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Registers for integer-class variables, in assignment precedence.
    pub int_regs: Vec<PReg>,
    /// Registers for floating point variables, in assignment precedence.
    pub float_regs: Vec<PReg>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            int_regs: allocatable_gp_regs(),
            float_regs: allocatable_fp_regs(),
        }
    }
}

impl AllocatorConfig {
    /// Keep only the first `int` integer and `float` floating point registers
    /// of the default pools.
    pub fn with_limits(int: usize, float: usize) -> Self {
        let mut config = Self::default();
        config.int_regs.truncate(int);
        config.float_regs.truncate(float);
        config
    }

    /// The pool for a register kind.
    pub fn regs(&self, kind: RegKind) -> &[PReg] {
        match kind {
            RegKind::General => &self.int_regs,
            RegKind::Float => &self.float_regs,
        }
    }
}

/// Errors that abort allocation for a function.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegAllocError {
    /// A variable needs a register of this kind but the pool is empty.
    #[error("no {0} registers are available for allocation")]
    EmptyRegisterPool(RegKind),

    /// A block whose start lies after its end.
    #[error("in function `{function}`: invalid block [{start}, {end}]")]
    InvalidBlock {
        function: String,
        start: usize,
        end: usize,
    },

    /// A block reaching past the instruction list.
    #[error("in function `{function}`: instruction {index} is out of range ({len} instructions)")]
    InstructionOutOfRange {
        function: String,
        index: usize,
        len: usize,
    },

    /// The blocks leave a gap or overlap.
    #[error("in function `{function}`: instruction {index} is not covered by exactly one block")]
    NotAPartition { function: String, index: usize },

    /// An operand refers to a variable handle the symbol table does not know.
    #[error("in function `{function}`: variable #{handle} is not in the symbol table")]
    UnknownVariable { function: String, handle: usize },
}
