use std::fmt::{self, Display, Write};

use rustc_hash::FxHashMap;

use super::{BasicBlock, ControlFlowGraph, VarId};
use crate::ir::{Function, SymbolTable};

/// Left-closed right-open range
/// [start, end)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self { Self { start, end } }

    /// Whether the ranges overlap. Ranges that merely touch count as
    /// overlapping, so they coalesce.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.start.max(other.start) <= self.end.min(other.end)
    }

    /// Whether the instruction at `pos` lies in the range.
    pub fn contains(&self, pos: usize) -> bool { self.start <= pos && pos < self.end }
}

impl Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Sort the ranges and coalesce the overlapping ones.
///
/// The result is sorted by start and pairwise disjoint, and merging it again
/// gives it back unchanged.
pub fn merge_ranges(ranges: &[Range]) -> Vec<Range> {
    let mut sorted = ranges.to_vec();
    sorted.sort();

    let mut merged: Vec<Range> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(last) if last.overlaps(&range) => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// The live ranges of one variable over the whole function.
#[derive(Debug, Clone, Default)]
pub struct LiveInfo {
    ranges: Vec<Range>,
    merged_ranges: Vec<Range>,
}

impl LiveInfo {
    pub fn new() -> Self { Self::default() }

    /// Ranges as the blocks reported them, in block order.
    pub fn ranges(&self) -> &[Range] { &self.ranges }

    /// Sorted, disjoint ranges.
    pub fn merged_ranges(&self) -> &[Range] { &self.merged_ranges }

    pub fn add_ranges(&mut self, ranges: &[Range]) { self.ranges.extend_from_slice(ranges); }

    /// Recompute the merged ranges from the reported ones.
    pub fn merge(&mut self) { self.merged_ranges = merge_ranges(&self.ranges); }

    pub fn is_live_at(&self, pos: usize) -> bool {
        self.merged_ranges.iter().any(|range| range.contains(pos))
    }
}

impl Display for LiveInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ranges = self
            .merged_ranges
            .iter()
            .map(|range| range.to_string())
            .collect::<Vec<_>>();
        write!(f, "{}", ranges.join(" "))
    }
}

/// Compute the live ranges inside one block from its OUT set.
///
/// Walks the lines backwards. A variable becomes live at its last use before
/// the scan position and dies at a definition, so each definition that
/// reaches a live use closes a range `[def, last use + 1)`. A variable
/// still live when the scan reaches the block start gets `[start, ...)`, and
/// one live on exit is live up to `end + 1`.
pub fn local_live_ranges(block: &BasicBlock) -> FxHashMap<VarId, Vec<Range>> {
    let mut live_ranges = FxHashMap::default();
    let empty = Vec::new();

    for var in block.referenced_vars() {
        let uses = block.uses.get(&var).unwrap_or(&empty);
        let defs = block.defs.get(&var).unwrap_or(&empty);

        let mut is_live = block.live_out.contains(&var);
        let mut dead = block.end() + 1;
        let mut ranges = Vec::new();

        // merge the two ascending line lists from the back
        let mut uses = uses.iter().rev().peekable();
        let mut defs = defs.iter().rev().peekable();
        loop {
            let line = match (uses.peek(), defs.peek()) {
                (None, None) => break,
                (Some(&&u), None) => u,
                (None, Some(&&d)) => d,
                (Some(&&u), Some(&&d)) => u.max(d),
            };

            // a line reading and writing the variable defines after it reads
            if defs.next_if(|d| **d == line).is_some() && is_live {
                ranges.push(Range::new(line, dead));
                is_live = false;
            }
            if uses.next_if(|u| **u == line).is_some() && !is_live {
                is_live = true;
                dead = line + 1;
            }
        }

        if is_live {
            ranges.push(Range::new(block.start(), dead));
        }
        if !ranges.is_empty() {
            ranges.reverse();
            live_ranges.insert(var, ranges);
        }
    }

    live_ranges
}

/// Compute the local live ranges of every block and merge them per variable.
///
/// Expects the IN/OUT sets to be at their fixed point.
pub fn analyze_on_function(cfg: &mut ControlFlowGraph) {
    let mut live_infos = vec![LiveInfo::new(); cfg.vars.len()];

    for block in cfg.blocks.iter_mut() {
        block.live_ranges = local_live_ranges(block);

        let mut vars: Vec<_> = block.live_ranges.keys().copied().collect();
        vars.sort();
        for var in vars {
            live_infos[var.index()].add_ranges(&block.live_ranges[&var]);
        }
    }

    live_infos.iter_mut().for_each(LiveInfo::merge);
    cfg.live_infos = live_infos;
}

/// List the merged ranges of every variable.
pub fn display(cfg: &ControlFlowGraph, symbols: &SymbolTable) -> String {
    let mut s = String::new();
    for (id, var) in cfg.vars().iter() {
        if let Some(info) = cfg.live_info(id) {
            let _ = writeln!(s, "{}: {}", var.name(symbols), info);
        }
    }
    s
}

/// Chart the live ranges next to the instructions.
///
/// ```text
///        i s c
/// B0
/// 0      |       = i, 0
/// 1      | |     = s, 0
/// ```
pub fn pretty_display(cfg: &ControlFlowGraph, func: &Function, symbols: &SymbolTable) -> String {
    let mut s = String::new();

    let mut header_line = String::new();
    let mut x_pos = Vec::new();
    for (_, var) in cfg.vars().iter() {
        x_pos.push(header_line.chars().count());
        header_line.push_str(&format!("{} ", var.name(symbols)));
    }
    let width = header_line.chars().count();

    // the widest instruction number plus some padding
    let margin = func.insts.len().saturating_sub(1).to_string().len() + 4;
    let _ = writeln!(s, "{}{}", " ".repeat(margin), header_line.trim_end());

    for id in cfg.block_ids() {
        let block = cfg.block(id);
        let _ = writeln!(s, "{}", id);
        for line in block.lines() {
            let mut chart = vec![' '; width];
            for (var, _) in cfg.vars().iter() {
                if cfg.live_info(var).is_some_and(|info| info.is_live_at(line)) {
                    chart[x_pos[var.index()]] = '|';
                }
            }
            let _ = writeln!(
                s,
                "{:<margin$}{}  {}",
                line,
                chart.into_iter().collect::<String>(),
                func.insts[line].display(symbols),
                margin = margin
            );
        }
    }

    s
}

#[cfg(test)]
mod test {
    use super::{local_live_ranges, merge_ranges, Range};
    use crate::backend::reg_alloc::{BasicBlock, VarId};

    #[test]
    fn test_merge_ranges() {
        let merged = merge_ranges(&[
            Range::new(7, 9),
            Range::new(0, 2),
            Range::new(2, 4),
            Range::new(1, 3),
            Range::new(10, 11),
        ]);
        assert_eq!(
            merged,
            vec![Range::new(0, 4), Range::new(7, 9), Range::new(10, 11)]
        );
        assert_eq!(merge_ranges(&merged), merged);
        assert!(merge_ranges(&[]).is_empty());
    }

    #[test]
    fn test_nested_ranges_merge() {
        let merged = merge_ranges(&[Range::new(0, 10), Range::new(2, 3), Range::new(5, 12)]);
        assert_eq!(merged, vec![Range::new(0, 12)]);
    }

    #[test]
    fn test_local_ranges() {
        // 0: = a, 1
        // 1: = b, a
        // 2: + c, a, b
        let (a, b, c) = (VarId::new(0), VarId::new(1), VarId::new(2));
        let mut block = BasicBlock::new(0, 2, None);
        block.add_def(a, 0);
        block.add_def(b, 1);
        block.add_use(a, 1);
        block.add_def(c, 2);
        block.add_use(a, 2);
        block.add_use(b, 2);

        let ranges = local_live_ranges(&block);
        assert_eq!(ranges[&a], vec![Range::new(0, 3)]);
        assert_eq!(ranges[&b], vec![Range::new(1, 3)]);
        // a dead definition is not live anywhere
        assert!(!ranges.contains_key(&c));
    }

    #[test]
    fn test_def_and_use_share_a_line() {
        // 0: DEF a
        // 1: USE a, DEF b
        // 2: USE b
        let (a, b) = (VarId::new(0), VarId::new(1));
        let mut block = BasicBlock::new(0, 2, None);
        block.add_def(a, 0);
        block.add_use(a, 1);
        block.add_def(b, 1);
        block.add_use(b, 2);

        let ranges = local_live_ranges(&block);
        assert_eq!(ranges[&a], vec![Range::new(0, 2)]);
        assert_eq!(ranges[&b], vec![Range::new(1, 3)]);
        assert_eq!(ranges.len(), 2);
    }

    #[test]
    fn test_local_ranges_with_live_sets() {
        // 4: = a, 1
        // 5: RETURN b
        // 6: = b, a
        // with `a` live on entry and `b` on exit
        let (a, b) = (VarId::new(0), VarId::new(1));
        let mut block = BasicBlock::new(4, 6, None);
        block.add_def(a, 4);
        block.add_use(b, 5);
        block.add_def(b, 6);
        block.add_use(a, 6);
        block.live_in.insert(b);
        block.live_out.insert(b);

        let ranges = local_live_ranges(&block);
        assert_eq!(ranges[&a], vec![Range::new(4, 7)]);
        // live on exit from the def, and from the block start to the use
        assert_eq!(ranges[&b], vec![Range::new(4, 6), Range::new(6, 7)]);
        assert_eq!(merge_ranges(&ranges[&b]), vec![Range::new(4, 7)]);
    }

    #[test]
    fn test_use_and_def_on_one_line() {
        // 0: ++ i   with `i` live on entry and exit
        let i = VarId::new(0);
        let mut block = BasicBlock::new(0, 0, None);
        block.add_def(i, 0);
        block.add_use(i, 0);
        block.live_in.insert(i);
        block.live_out.insert(i);

        let ranges = local_live_ranges(&block);
        assert_eq!(ranges[&i], vec![Range::new(0, 1), Range::new(0, 1)]);
    }
}
