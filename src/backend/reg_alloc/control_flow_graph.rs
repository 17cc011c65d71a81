use std::fmt::Write;

use rustc_hash::FxHashMap;

use super::{
    block_defuse_analysis,
    live_interval_analysis,
    liveness_analysis,
    BasicBlock,
    BlockId,
    LiveInfo,
    RegAllocError,
    VarId,
    VarNumbering,
};
use crate::ir::{Function, Instruction, Opcode, SymbolTable};

/// The control flow graph of one function.
///
/// Owns the blocks, the edge list and, once
/// [analyze_liveness](ControlFlowGraph::analyze_liveness) has run, the
/// merged live information of every variable.
pub struct ControlFlowGraph {
    pub(super) function: String,
    pub(super) blocks: Vec<BasicBlock>,
    pub(super) edges: Vec<(BlockId, BlockId)>,
    pub(super) succs: Vec<Vec<BlockId>>,
    pub(super) preds: Vec<Vec<BlockId>>,
    pub(super) entry: Option<BlockId>,
    pub(super) exit: Option<BlockId>,
    /// Every variable referenced in the function, in first-reference order.
    pub(super) vars: VarNumbering,
    /// Indexed by [VarId].
    pub(super) live_infos: Vec<LiveInfo>,
}

/// Split an instruction list into basic blocks.
///
/// A block ends after a jump and before a labelled instruction. Returns the
/// inclusive `[start, end]` bounds of every block.
pub fn partition(insts: &[Instruction]) -> Vec<(usize, usize)> {
    let mut bounds = Vec::new();
    let mut start = 0;
    for (i, inst) in insts.iter().enumerate() {
        let next_is_target = insts.get(i + 1).is_some_and(|next| next.has_label());
        if inst.opcode.is_jump() || next_is_target || i + 1 == insts.len() {
            bounds.push((start, i));
            start = i + 1;
        }
    }
    bounds
}

impl ControlFlowGraph {
    /// Partition the function, link the blocks and collect def/use
    /// information.
    pub fn build(func: &Function, symbols: &SymbolTable) -> Result<Self, RegAllocError> {
        Self::from_partition(func, symbols, &partition(&func.insts))
    }

    /// Like [build](ControlFlowGraph::build), but with externally computed
    /// block bounds.
    ///
    /// The bounds must cover every instruction exactly once, in order.
    pub fn from_partition(
        func: &Function,
        symbols: &SymbolTable,
        bounds: &[(usize, usize)],
    ) -> Result<Self, RegAllocError> {
        let len = func.insts.len();
        let mut blocks = Vec::with_capacity(bounds.len());
        let mut expected = 0;

        for &(start, end) in bounds {
            if start > end {
                return Err(RegAllocError::InvalidBlock {
                    function: func.name.clone(),
                    start,
                    end,
                });
            }
            if end >= len {
                return Err(RegAllocError::InstructionOutOfRange {
                    function: func.name.clone(),
                    index: end,
                    len,
                });
            }
            if start != expected {
                return Err(RegAllocError::NotAPartition {
                    function: func.name.clone(),
                    index: start.min(expected),
                });
            }
            expected = end + 1;

            let label = func.insts[start]
                .has_label()
                .then(|| func.insts[start].label.clone())
                .flatten();
            blocks.push(BasicBlock::new(start, end, label));
        }
        if expected != len {
            return Err(RegAllocError::NotAPartition {
                function: func.name.clone(),
                index: expected,
            });
        }

        let num_blocks = blocks.len();
        let mut cfg = Self {
            function: func.name.clone(),
            blocks,
            edges: Vec::new(),
            succs: vec![Vec::new(); num_blocks],
            preds: vec![Vec::new(); num_blocks],
            entry: None,
            exit: None,
            vars: VarNumbering::new(),
            live_infos: Vec::new(),
        };

        cfg.link(&func.insts);
        block_defuse_analysis::analyze_on_function(&mut cfg, func, symbols)?;

        log::debug!(
            "[ cfg ] `{}`: {} blocks, {} edges, {} variables",
            cfg.function,
            cfg.blocks.len(),
            cfg.edges.len(),
            cfg.vars.len()
        );

        Ok(cfg)
    }

    /// Compute IN/OUT to a fixed point, then the per-block live ranges and
    /// their per-variable merge.
    ///
    /// Returns the number of liveness iterations.
    pub fn analyze_liveness(&mut self) -> usize {
        let iterations = liveness_analysis::analyze_on_function(self);
        live_interval_analysis::analyze_on_function(self);
        iterations
    }

    fn add_edge(&mut self, src: BlockId, dst: BlockId) {
        if self.edges.contains(&(src, dst)) {
            return;
        }
        self.edges.push((src, dst));
        self.succs[src.index()].push(dst);
        self.preds[dst.index()].push(src);
    }

    fn link(&mut self, insts: &[Instruction]) {
        if self.blocks.is_empty() {
            return;
        }

        let labels: FxHashMap<&str, BlockId> = self
            .blocks
            .iter()
            .enumerate()
            .filter_map(|(i, block)| block.label().map(|l| (l, BlockId::new(i))))
            .collect();
        // `labels` borrows the blocks, resolve every target up front
        let targets: Vec<Option<BlockId>> = self
            .blocks
            .iter()
            .map(|block| {
                let target = insts[block.end()].jump_target()?;
                let resolved = labels.get(target).copied();
                if resolved.is_none() {
                    log::warn!(
                        "[ cfg ] `{}`: jump to undefined label `{}` at line {}",
                        self.function,
                        target,
                        block.end()
                    );
                }
                resolved
            })
            .collect();

        let num_blocks = self.blocks.len();
        self.entry = Some(BlockId::new(0));
        self.exit = Some(
            self.blocks
                .iter()
                .position(|block| block.lines().any(|i| insts[i].opcode == Opcode::FuncEnd))
                .map(BlockId::new)
                .unwrap_or(BlockId::new(num_blocks - 1)),
        );

        for (i, target) in targets.into_iter().enumerate() {
            let curr = BlockId::new(i);
            let next = (i + 1 < num_blocks).then(|| BlockId::new(i + 1));
            match insts[self.blocks[i].end()].opcode {
                Opcode::Jump => {
                    if let Some(target) = target {
                        self.add_edge(curr, target);
                    }
                }
                Opcode::IfFalseJump => {
                    if let Some(target) = target {
                        self.add_edge(curr, target);
                    }
                    if let Some(next) = next {
                        self.add_edge(curr, next);
                    }
                }
                Opcode::Return => {
                    if let Some(exit) = self.exit.filter(|exit| *exit != curr) {
                        self.add_edge(curr, exit);
                    }
                }
                Opcode::FuncEnd => {}
                _ => {
                    if let Some(next) = next {
                        self.add_edge(curr, next);
                    }
                }
            }
        }

        // an entry has no predecessors and an exit no successors
        self.entry = self.entry.filter(|entry| self.preds(*entry).is_empty());
        self.exit = self.exit.filter(|exit| self.succs(*exit).is_empty());
        if self.entry.is_none() || self.exit.is_none() {
            log::debug!(
                "[ cfg ] `{}`: no distinguished entry or exit block",
                self.function
            );
        }
    }

    /// The name of the function.
    pub fn function(&self) -> &str { &self.function }

    pub fn blocks(&self) -> &[BasicBlock] { &self.blocks }

    pub fn block(&self, id: BlockId) -> &BasicBlock { &self.blocks[id.index()] }

    pub fn block_ids(&self) -> impl DoubleEndedIterator<Item = BlockId> {
        (0..self.blocks.len()).map(BlockId::new)
    }

    /// The block holding an instruction.
    pub fn block_of(&self, line: usize) -> Option<BlockId> {
        let index = self.blocks.partition_point(|block| block.end() < line);
        self.blocks
            .get(index)
            .filter(|block| block.contains(line))
            .map(|_| BlockId::new(index))
    }

    pub fn edges(&self) -> &[(BlockId, BlockId)] { &self.edges }

    /// Successors, in the order the edges were added.
    pub fn succs(&self, id: BlockId) -> &[BlockId] { &self.succs[id.index()] }

    /// Predecessors, in the order the edges were added.
    pub fn preds(&self, id: BlockId) -> &[BlockId] { &self.preds[id.index()] }

    /// The first block.
    ///
    /// `None` for an empty function, or when a jump targets the first block.
    pub fn entry(&self) -> Option<BlockId> { self.entry }

    /// The block holding `FUNC_END`, or the last block.
    ///
    /// `None` for an empty function, or when that block has successors.
    pub fn exit(&self) -> Option<BlockId> { self.exit }

    pub fn vars(&self) -> &VarNumbering { &self.vars }

    /// Merged live information of a variable.
    ///
    /// Empty until [analyze_liveness](ControlFlowGraph::analyze_liveness) has
    /// run.
    pub fn live_info(&self, var: VarId) -> Option<&LiveInfo> { self.live_infos.get(var.index()) }

    /// Dump the blocks with their def/use and liveness sets.
    pub fn display(&self, symbols: &SymbolTable) -> String {
        let name = |var: &VarId| self.vars.var(*var).name(symbols).to_string();
        let list = |mut vars: Vec<VarId>| {
            vars.sort();
            vars.iter().map(name).collect::<Vec<_>>().join(" ")
        };

        let mut s = String::new();
        for id in self.block_ids() {
            let block = self.block(id);
            let _ = writeln!(
                s,
                "{} [{}, {}]{} preds: [{}] succs: [{}]",
                id,
                block.start(),
                block.end(),
                block.label().map(|l| format!(" {}:", l)).unwrap_or_default(),
                self.preds(id)
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                self.succs(id)
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            let _ = writeln!(s, "  use: {}", list(block.uses().keys().copied().collect()));
            let _ = writeln!(s, "  def: {}", list(block.defs().keys().copied().collect()));
            let _ = writeln!(s, "  in:  {}", list(block.live_in().iter().copied().collect()));
            let _ = writeln!(s, "  out: {}", list(block.live_out().iter().copied().collect()));
        }
        s
    }
}
