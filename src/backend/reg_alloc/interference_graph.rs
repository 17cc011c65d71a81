use std::fmt::Write;

use bitvec::{order::Lsb0, vec::BitVec};
use rustc_hash::FxHashSet;

use super::{ControlFlowGraph, VarId};

#[derive(Debug, Clone)]
struct InterferenceNode {
    neighbors: BitVec<u32, Lsb0>,
}

/// An undirected interference graph over the variables of one function.
///
/// Nodes are indexed by [VarId], adjacency is kept as one bit row per node.
/// The graph is symmetric and has no self loops.
#[derive(Debug, Clone)]
pub struct InterferenceGraph {
    nodes: Vec<Option<InterferenceNode>>,
}

impl InterferenceGraph {
    /// An empty graph with room for `num_vars` variables.
    pub fn new(num_vars: usize) -> Self {
        Self {
            nodes: vec![None; num_vars],
        }
    }

    /// Build the graph from the IN/OUT sets.
    ///
    /// Sweeps every block backwards from its OUT set: a definition interferes
    /// with everything live across it, then leaves the live set, and a use
    /// joins it. Two variables that are never defined while the other is live
    /// do not interfere, even when both are live at the same point.
    pub fn build(cfg: &ControlFlowGraph) -> Self {
        let mut graph = Self::new(cfg.vars().len());

        for id in cfg.block_ids() {
            let block = cfg.block(id);
            let mut live: FxHashSet<VarId> = block.live_out().clone();

            for line in block.lines().rev() {
                for &def in block.defs_at(line) {
                    graph.get_or_create_node(def);
                    for &other in live.iter() {
                        graph.add_interference(def, other);
                    }
                    live.remove(&def);
                }
                for &var in block.uses_at(line) {
                    graph.get_or_create_node(var);
                    live.insert(var);
                }
            }
        }

        log::debug!(
            "[ interference ] `{}`: {} nodes, {} edges",
            cfg.function(),
            graph.num_nodes(),
            graph.num_edges()
        );

        graph
    }

    fn node(&self, var: VarId) -> Option<&InterferenceNode> {
        self.nodes.get(var.index()).and_then(Option::as_ref)
    }

    /// Make sure the variable has a node, possibly without any edge.
    pub fn get_or_create_node(&mut self, var: VarId) {
        if var.index() >= self.nodes.len() {
            let len = var.index() + 1;
            self.nodes.resize(len, None);
            for node in self.nodes.iter_mut().flatten() {
                node.neighbors.resize(len, false);
            }
        }
        let len = self.nodes.len();
        self.nodes[var.index()].get_or_insert_with(|| InterferenceNode {
            neighbors: BitVec::repeat(false, len),
        });
    }

    /// Add the undirected edge `a -- b`, creating the nodes as needed.
    ///
    /// A variable never interferes with itself, so `a == b` is a no-op.
    pub fn add_interference(&mut self, a: VarId, b: VarId) {
        if a == b {
            return;
        }
        self.get_or_create_node(a);
        self.get_or_create_node(b);
        if let Some(node) = self.nodes[a.index()].as_mut() {
            node.neighbors.set(b.index(), true);
        }
        if let Some(node) = self.nodes[b.index()].as_mut() {
            node.neighbors.set(a.index(), true);
        }
    }

    pub fn contains(&self, var: VarId) -> bool { self.node(var).is_some() }

    pub fn interferes(&self, a: VarId, b: VarId) -> bool {
        self.node(a)
            .is_some_and(|node| node.neighbors.get(b.index()).is_some_and(|bit| *bit))
    }

    /// Neighbors in ascending order, nothing for a missing node.
    pub fn neighbors(&self, var: VarId) -> impl Iterator<Item = VarId> + '_ {
        self.node(var)
            .into_iter()
            .flat_map(|node| node.neighbors.iter_ones().map(VarId::new))
    }

    pub fn degree(&self, var: VarId) -> usize {
        self.node(var)
            .map(|node| node.neighbors.count_ones())
            .unwrap_or(0)
    }

    /// Remove a node and all its edges.
    pub fn remove_node(&mut self, var: VarId) {
        let Some(node) = self.nodes.get_mut(var.index()).and_then(Option::take) else {
            return;
        };
        for other in node.neighbors.iter_ones() {
            if let Some(other) = self.nodes[other].as_mut() {
                other.neighbors.set(var.index(), false);
            }
        }
    }

    /// Present nodes in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = VarId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_some())
            .map(|(index, _)| VarId::new(index))
    }

    pub fn num_nodes(&self) -> usize { self.nodes().count() }

    pub fn num_edges(&self) -> usize {
        self.nodes().map(|var| self.degree(var)).sum::<usize>() / 2
    }

    /// Render as a mermaid flowchart, each edge once.
    pub fn to_mermaid(&self, name: impl Fn(VarId) -> String) -> String {
        let mut s = String::new();
        s.push_str("graph LR;\n");
        for var in self.nodes() {
            if self.degree(var) == 0 {
                let _ = writeln!(s, "    {};", name(var));
            }
            for other in self.neighbors(var).filter(|other| *other > var) {
                let _ = writeln!(s, "    {} --- {};", name(var), name(other));
            }
        }
        s
    }
}
