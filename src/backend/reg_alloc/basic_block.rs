use std::{fmt, ops::RangeInclusive};

use rustc_hash::{FxHashMap, FxHashSet};

use super::{Range, VarId};

/// Index of a block in its [ControlFlowGraph](super::ControlFlowGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    pub fn new(index: usize) -> Self { Self(index as u32) }

    pub fn index(self) -> usize { self.0 as usize }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "B{}", self.0) }
}

/// A maximal straight-line run of instructions `[start, end]`.
///
/// Neighbors are not stored here, the graph owns the edges.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    start: usize,
    end: usize,
    label: Option<String>,

    /// Lines on which each variable is used.
    pub(super) uses: FxHashMap<VarId, Vec<usize>>,
    /// Lines on which each variable is defined.
    pub(super) defs: FxHashMap<VarId, Vec<usize>>,
    /// Variables used on each line, indexed by `line - start`.
    pub(super) line_uses: Vec<Vec<VarId>>,
    /// Variables defined on each line, indexed by `line - start`.
    pub(super) line_defs: Vec<Vec<VarId>>,

    /// Variables live on entry.
    pub(super) live_in: FxHashSet<VarId>,
    /// Variables live on exit.
    pub(super) live_out: FxHashSet<VarId>,

    /// Local live ranges, see
    /// [local_live_ranges](super::live_interval_analysis::local_live_ranges).
    pub(super) live_ranges: FxHashMap<VarId, Vec<Range>>,
}

impl BasicBlock {
    /// Create an empty block.
    ///
    /// The caller guarantees `start <= end`.
    pub(super) fn new(start: usize, end: usize, label: Option<String>) -> Self {
        debug_assert!(start <= end);
        let len = end - start + 1;
        Self {
            start,
            end,
            label,
            uses: FxHashMap::default(),
            defs: FxHashMap::default(),
            line_uses: vec![Vec::new(); len],
            line_defs: vec![Vec::new(); len],
            live_in: FxHashSet::default(),
            live_out: FxHashSet::default(),
            live_ranges: FxHashMap::default(),
        }
    }

    /// Index of the first instruction.
    pub fn start(&self) -> usize { self.start }

    /// Index of the last instruction, inclusive.
    pub fn end(&self) -> usize { self.end }

    pub fn lines(&self) -> RangeInclusive<usize> { self.start..=self.end }

    /// The label of the first instruction, if it has one.
    pub fn label(&self) -> Option<&str> { self.label.as_deref() }

    /// Whether the line belongs to this block.
    pub fn contains(&self, line: usize) -> bool { self.start <= line && line <= self.end }

    pub(super) fn add_use(&mut self, var: VarId, line: usize) {
        self.uses.entry(var).or_default().push(line);
        self.line_uses[line - self.start].push(var);
    }

    pub(super) fn add_def(&mut self, var: VarId, line: usize) {
        self.defs.entry(var).or_default().push(line);
        self.line_defs[line - self.start].push(var);
    }

    /// The USE map: variable to the lines it is used on, ascending.
    pub fn uses(&self) -> &FxHashMap<VarId, Vec<usize>> { &self.uses }

    /// The DEF map: variable to the lines it is defined on, ascending.
    pub fn defs(&self) -> &FxHashMap<VarId, Vec<usize>> { &self.defs }

    /// Variables used on a line of this block.
    pub fn uses_at(&self, line: usize) -> &[VarId] { &self.line_uses[line - self.start] }

    /// Variables defined on a line of this block.
    pub fn defs_at(&self, line: usize) -> &[VarId] { &self.line_defs[line - self.start] }

    /// The IN set.
    pub fn live_in(&self) -> &FxHashSet<VarId> { &self.live_in }

    /// The OUT set.
    pub fn live_out(&self) -> &FxHashSet<VarId> { &self.live_out }

    /// Live ranges of the variables referenced by, or live through, this
    /// block.
    pub fn live_ranges(&self) -> &FxHashMap<VarId, Vec<Range>> { &self.live_ranges }

    /// All variables the block mentions or carries: USE, DEF, IN and OUT.
    ///
    /// Sorted by id.
    pub fn referenced_vars(&self) -> Vec<VarId> {
        let mut vars: Vec<VarId> = self
            .uses
            .keys()
            .chain(self.defs.keys())
            .chain(self.live_in.iter())
            .chain(self.live_out.iter())
            .copied()
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();
        vars.sort();
        vars
    }
}

#[cfg(test)]
mod test {
    use super::BasicBlock;
    use crate::backend::reg_alloc::VarId;

    #[test]
    fn test_per_line_records() {
        let a = VarId::new(0);
        let b = VarId::new(1);
        let mut block = BasicBlock::new(4, 6, Some("L".into()));
        block.add_def(a, 4);
        block.add_use(a, 5);
        block.add_def(b, 5);
        block.add_use(a, 6);

        assert_eq!(block.lines().count(), 3);
        assert_eq!(block.label(), Some("L"));
        assert_eq!(block.uses()[&a], vec![5, 6]);
        assert_eq!(block.defs_at(5), &[b]);
        assert_eq!(block.uses_at(4), &[] as &[VarId]);
        assert!(block.contains(6) && !block.contains(7));
        assert_eq!(block.referenced_vars(), vec![a, b]);
    }
}
