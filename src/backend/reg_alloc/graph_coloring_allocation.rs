use std::fmt::Write;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    AllocatorConfig,
    ControlFlowGraph,
    InterferenceGraph,
    Location,
    RegAllocError,
    RegisterDescriptor,
    VarId,
    VarNumbering,
    VariableDescriptor,
};
use crate::{
    backend::{PReg, RegKind},
    collections::storage::ArenaPtr,
    ir::{Function, SymbolTable, Variable},
};

/// The outcome of allocating one function.
#[derive(Debug, Clone, Default)]
pub struct AllocationResult {
    /// Variables kept in a register.
    pub allocation: FxHashMap<Variable, PReg>,
    /// Variables kept in memory.
    pub spilled_variables: FxHashSet<Variable>,
    /// Byte offset of every spilled variable in the spill area.
    pub spill_offsets: FxHashMap<Variable, usize>,
    /// Total size of the spill area in bytes.
    pub spill_area_size: usize,
    /// Every variable of the function, in collection order.
    order: Vec<Variable>,
}

impl AllocationResult {
    /// Every allocated variable, in the order they were first referenced.
    pub fn variables(&self) -> &[Variable] { &self.order }

    pub fn location(&self, var: Variable) -> Option<Location> {
        if let Some(reg) = self.allocation.get(&var) {
            return Some(Location::Reg(*reg));
        }
        self.spill_offsets.get(&var).map(|offset| Location::Mem(*offset))
    }

    /// Whether every variable got a register.
    pub fn no_spills(&self) -> bool { self.spilled_variables.is_empty() }

    pub fn display(&self, symbols: &SymbolTable) -> String {
        let mut s = String::new();
        for var in &self.order {
            let location = self
                .location(*var)
                .map(|l| l.to_string())
                .unwrap_or_else(|| "?".to_string());
            let _ = writeln!(
                s,
                "{}: {} -> {}",
                var.name(symbols),
                var.ty(symbols),
                location
            );
        }
        let _ = writeln!(
            s,
            "{} in registers, {} spilled, spill area {} bytes",
            self.allocation.len(),
            self.spilled_variables.len(),
            self.spill_area_size
        );
        s
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Unvisited,
    /// On the select stack.
    Simplified,
    /// Removed without a guaranteed color, retried after select.
    SpillCandidate,
    Colored(PReg),
    Spilled,
}

/// Chaitin-style graph coloring register allocator.
///
/// One instance can allocate any number of functions, one after the other.
/// The descriptors of the last run stay queryable until the next one.
pub struct GraphColoringAllocation {
    pub total_spills: usize,

    config: AllocatorConfig,

    vars: VarNumbering,
    kinds: Vec<RegKind>,
    sizes: Vec<usize>,
    variable_descriptors: Vec<VariableDescriptor>,
    register_descriptors: FxHashMap<PReg, RegisterDescriptor>,
    current_spill_offset: usize,
}

impl Default for GraphColoringAllocation {
    fn default() -> Self { Self::new(AllocatorConfig::default()) }
}

impl GraphColoringAllocation {
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            total_spills: 0,
            config,
            vars: VarNumbering::new(),
            kinds: Vec::new(),
            sizes: Vec::new(),
            variable_descriptors: Vec::new(),
            register_descriptors: FxHashMap::default(),
            current_spill_offset: 0,
        }
    }

    pub fn config(&self) -> &AllocatorConfig { &self.config }

    /// Build the control flow graph of a function and allocate it.
    pub fn run_on_function(
        &mut self,
        func: &Function,
        symbols: &SymbolTable,
    ) -> Result<AllocationResult, RegAllocError> {
        let mut cfg = ControlFlowGraph::build(func, symbols)?;
        self.allocate_registers(&mut cfg, symbols)
    }

    /// Allocate the variables of an already partitioned function.
    ///
    /// Liveness is recomputed here, so the IN/OUT sets are at their fixed
    /// point before the interference graph is built.
    pub fn allocate_registers(
        &mut self,
        cfg: &mut ControlFlowGraph,
        symbols: &SymbolTable,
    ) -> Result<AllocationResult, RegAllocError> {
        self.reset(cfg, symbols)?;

        cfg.analyze_liveness();
        let graph = InterferenceGraph::build(cfg);

        let num_vars = self.vars.len();
        let mut states = vec![NodeState::Unvisited; num_vars];
        let (stack, candidates) = self.simplify(&graph, &mut states);

        // select
        for var in stack.into_iter().rev() {
            states[var.index()] = match self.pick_color(&graph, &states, var) {
                Some(reg) => NodeState::Colored(reg),
                None => NodeState::Spilled,
            };
            log::trace!("[ reg_alloc ] select {}: {:?}", var, states[var.index()]);
        }

        // optimistic coloring of the spill candidates
        for var in candidates {
            states[var.index()] = match self.pick_color(&graph, &states, var) {
                Some(reg) => NodeState::Colored(reg),
                None => NodeState::Spilled,
            };
            log::trace!("[ reg_alloc ] retry {}: {:?}", var, states[var.index()]);
        }

        for (index, state) in states.iter().enumerate() {
            let var = VarId::new(index);
            match state {
                NodeState::Colored(reg) => self.assign_register(var, *reg),
                NodeState::Spilled => self.assign_memory(var),
                NodeState::Unvisited | NodeState::Simplified | NodeState::SpillCandidate => {
                    unreachable!("{} left without a location", var)
                }
            }
        }

        let result = self.collect_result();
        log::debug!(
            "[ reg_alloc ] `{}`: {} variables, {} in registers, {} spilled ({} bytes)",
            cfg.function(),
            num_vars,
            result.allocation.len(),
            result.spilled_variables.len(),
            result.spill_area_size
        );

        Ok(result)
    }

    /// Start a fresh run over the variables of `cfg`.
    fn reset(
        &mut self,
        cfg: &ControlFlowGraph,
        symbols: &SymbolTable,
    ) -> Result<(), RegAllocError> {
        self.vars = cfg.vars().clone();
        self.kinds.clear();
        self.sizes.clear();

        for (_, var) in self.vars.iter() {
            if var.try_deref(symbols).is_none() {
                return Err(RegAllocError::UnknownVariable {
                    function: cfg.function().to_string(),
                    handle: var.handle(),
                });
            }
            let ty = var.ty(symbols);
            let kind = RegKind::of_type(ty);
            if self.config.regs(kind).is_empty() {
                return Err(RegAllocError::EmptyRegisterPool(kind));
            }
            self.kinds.push(kind);
            self.sizes.push(ty.size());
        }

        self.variable_descriptors = vec![VariableDescriptor::new(); self.vars.len()];
        self.register_descriptors = self
            .config
            .int_regs
            .iter()
            .chain(self.config.float_regs.iter())
            .map(|reg| (*reg, RegisterDescriptor::new()))
            .collect();
        self.current_spill_offset = 0;

        Ok(())
    }

    fn num_colors(&self, var: VarId) -> usize { self.config.regs(self.kinds[var.index()]).len() }

    /// Remove every node from a working copy of the graph.
    ///
    /// Returns the select stack and the spill candidates, both in removal
    /// order.
    fn simplify(
        &self,
        graph: &InterferenceGraph,
        states: &mut [NodeState],
    ) -> (Vec<VarId>, Vec<VarId>) {
        let mut working_graph = graph.clone();
        let mut stack = Vec::new();
        let mut candidates = Vec::new();

        for _ in 0..states.len() {
            let unvisited: Vec<VarId> = (0..states.len())
                .map(VarId::new)
                .filter(|var| states[var.index()] == NodeState::Unvisited)
                .collect();

            let simplifiable = unvisited
                .iter()
                .copied()
                .find(|var| working_graph.degree(*var) < self.num_colors(*var));

            let var = if let Some(var) = simplifiable {
                log::trace!(
                    "[ reg_alloc ] simplify {} (degree {})",
                    var,
                    working_graph.degree(var)
                );
                stack.push(var);
                states[var.index()] = NodeState::Simplified;
                var
            } else {
                // highest degree, lowest id among equals
                let Some(var) = unvisited.iter().copied().fold(None, |best: Option<VarId>, var| match best {
                    Some(best) if working_graph.degree(best) >= working_graph.degree(var) => {
                        Some(best)
                    }
                    _ => Some(var),
                }) else {
                    break;
                };
                log::trace!(
                    "[ reg_alloc ] spill candidate {} (degree {})",
                    var,
                    working_graph.degree(var)
                );
                candidates.push(var);
                states[var.index()] = NodeState::SpillCandidate;
                var
            };

            working_graph.remove_node(var);
        }

        (stack, candidates)
    }

    /// The first register of the variable's class no colored neighbor holds.
    fn pick_color(
        &self,
        graph: &InterferenceGraph,
        states: &[NodeState],
        var: VarId,
    ) -> Option<PReg> {
        let taken: FxHashSet<PReg> = graph
            .neighbors(var)
            .filter_map(|other| match states[other.index()] {
                NodeState::Colored(reg) => Some(reg),
                _ => None,
            })
            .collect();

        self.config
            .regs(self.kinds[var.index()])
            .iter()
            .find(|reg| !taken.contains(reg))
            .copied()
    }

    fn assign_register(&mut self, var: VarId, reg: PReg) {
        self.variable_descriptors[var.index()].add_location(Location::Reg(reg));
        self.register_descriptors.entry(reg).or_default().add_var(var);
    }

    /// Bump-allocate a slot in the spill area.
    fn assign_memory(&mut self, var: VarId) {
        let offset = self.current_spill_offset;
        self.current_spill_offset += self.sizes[var.index()];
        self.variable_descriptors[var.index()].add_location(Location::Mem(offset));
        self.total_spills += 1;
    }

    fn collect_result(&self) -> AllocationResult {
        let mut result = AllocationResult {
            spill_area_size: self.current_spill_offset,
            ..AllocationResult::default()
        };

        for (id, var) in self.vars.iter() {
            let desc = &self.variable_descriptors[id.index()];
            if let Some(reg) = desc.register() {
                result.allocation.insert(var, reg);
            } else if let Some(offset) = desc.memory() {
                result.spilled_variables.insert(var);
                result.spill_offsets.insert(var, offset);
            }
            result.order.push(var);
        }

        result
    }

    /// The descriptor of a variable from the last run.
    pub fn variable_descriptor(&self, var: Variable) -> Option<&VariableDescriptor> {
        let id = self.vars.id(var)?;
        self.variable_descriptors.get(id.index())
    }

    /// The descriptor of a register from the last run.
    pub fn register_descriptor(&self, reg: PReg) -> Option<&RegisterDescriptor> {
        self.register_descriptors.get(&reg)
    }

    /// Evict every variable from a register.
    pub fn free_register(&mut self, reg: PReg) {
        let Some(desc) = self.register_descriptors.get_mut(&reg) else {
            return;
        };
        for var in desc.take() {
            self.variable_descriptors[var.index()].remove_location(Location::Reg(reg));
        }
    }
}

#[cfg(test)]
mod test {
    use super::GraphColoringAllocation;
    use crate::{
        backend::{
            reg_alloc::{AllocatorConfig, Location, RegAllocError},
            x86_64::regs::{rax, rbx, xmm0},
            RegKind,
        },
        ir::text::parse_module,
    };

    const TRIANGLE: &str = "
        .func f
        .var a int
        .var b int
        .var c int
        .var d int
            = a, 1
            = b, 2
            = c, 3
            + d, a, b
            + d, d, c
            RETURN d
        .endfunc
    ";

    #[test]
    fn test_single_register_spills() {
        let module = parse_module(TRIANGLE).unwrap();
        let mut allocator = GraphColoringAllocation::new(AllocatorConfig::with_limits(1, 1));
        let result = allocator
            .run_on_function(&module.funcs[0], &module.symbols)
            .unwrap();
        let func = &module.funcs[0];
        let var = |name| module.symbols.lookup(func.scope, name).unwrap();

        // a, b and c are all live at line 2, only one of them fits
        assert_eq!(result.allocation.len(), 2);
        assert_eq!(result.spilled_variables.len(), 2);
        assert_eq!(result.allocation.get(&var("d")), Some(&rax()));
        assert!(!result.no_spills());
        assert_eq!(result.spill_area_size, 8);

        let mut offsets: Vec<_> = result.spill_offsets.values().copied().collect();
        offsets.sort();
        assert_eq!(offsets, vec![0, 4]);
        assert_eq!(allocator.total_spills, 2);
    }

    #[test]
    fn test_enough_registers() {
        let module = parse_module(TRIANGLE).unwrap();
        let mut allocator = GraphColoringAllocation::default();
        let result = allocator
            .run_on_function(&module.funcs[0], &module.symbols)
            .unwrap();

        assert!(result.no_spills());
        assert_eq!(result.allocation.len(), 4);
        assert_eq!(result.spill_area_size, 0);
        assert_eq!(result.variables().len(), 4);
    }

    #[test]
    fn test_classes_use_their_pools() {
        let src = "
            .func f
            .var i int
            .var x double
                = i, 1
                CAST x, i
                RETURN x
            .endfunc
        ";
        let module = parse_module(src).unwrap();
        let func = &module.funcs[0];
        let mut allocator = GraphColoringAllocation::new(AllocatorConfig::with_limits(1, 1));
        let result = allocator.run_on_function(func, &module.symbols).unwrap();

        let i = module.symbols.lookup(func.scope, "i").unwrap();
        let x = module.symbols.lookup(func.scope, "x").unwrap();
        assert_eq!(result.location(i), Some(Location::Reg(rax())));
        assert_eq!(result.location(x), Some(Location::Reg(xmm0())));
    }

    #[test]
    fn test_empty_pool() {
        let src = "
            .func f
            .var x float
                = x, 1.0
                RETURN x
            .endfunc
        ";
        let module = parse_module(src).unwrap();
        let mut allocator = GraphColoringAllocation::new(AllocatorConfig::with_limits(4, 0));
        let err = allocator.run_on_function(&module.funcs[0], &module.symbols);
        assert_eq!(err.unwrap_err(), RegAllocError::EmptyRegisterPool(RegKind::Float));
    }

    #[test]
    fn test_empty_function() {
        let module = parse_module(".func f\n.endfunc").unwrap();
        let mut allocator = GraphColoringAllocation::new(AllocatorConfig::with_limits(0, 0));
        let result = allocator
            .run_on_function(&module.funcs[0], &module.symbols)
            .unwrap();
        assert!(result.no_spills());
        assert!(result.variables().is_empty());
    }

    #[test]
    fn test_descriptors() {
        let module = parse_module(TRIANGLE).unwrap();
        let func = &module.funcs[0];
        let mut allocator = GraphColoringAllocation::new(AllocatorConfig::with_limits(2, 1));
        let result = allocator.run_on_function(func, &module.symbols).unwrap();

        for var in result.variables() {
            let desc = allocator.variable_descriptor(*var).unwrap();
            assert_eq!(result.location(*var), desc.locations().first().copied());
        }

        let holders = allocator.register_descriptor(rbx()).unwrap().vars().to_vec();
        assert!(!holders.is_empty());
        allocator.free_register(rbx());
        assert!(allocator.register_descriptor(rbx()).unwrap().is_free());
        for var in result.variables() {
            let desc = allocator.variable_descriptor(*var).unwrap();
            assert_ne!(desc.register(), Some(rbx()));
        }
    }
}
