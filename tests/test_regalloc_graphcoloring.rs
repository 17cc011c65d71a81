use tacra::{
    backend::{
        reg_alloc::{
            AllocationResult,
            AllocatorConfig,
            ControlFlowGraph,
            GraphColoringAllocation,
            InterferenceGraph,
        },
        x86_64::regs::{rax, xmm0},
    },
    ir::{text::parse_module, Module, Variable},
};

fn allocate(module: &Module, func: &str, config: AllocatorConfig) -> AllocationResult {
    let func = module.func(func).unwrap();
    let mut allocator = GraphColoringAllocation::new(config);
    let result = allocator.run_on_function(func, &module.symbols).unwrap();
    println!("{}", result.display(&module.symbols));
    result
}

fn var(module: &Module, func: &str, name: &str) -> Variable {
    let func = module.func(func).unwrap();
    module.symbols.lookup(func.scope, name).unwrap()
}

/// Every variable is placed exactly once, and interfering registers differ.
fn check_allocation(module: &Module, func: &str, result: &AllocationResult) {
    let func = module.func(func).unwrap();
    let mut cfg = ControlFlowGraph::build(func, &module.symbols).unwrap();
    cfg.analyze_liveness();
    let graph = InterferenceGraph::build(&cfg);

    assert_eq!(result.variables().len(), cfg.vars().len());
    for (_, var) in cfg.vars().iter() {
        let in_reg = result.allocation.contains_key(&var);
        let spilled = result.spilled_variables.contains(&var);
        assert!(in_reg != spilled);
        assert_eq!(spilled, result.spill_offsets.contains_key(&var));
    }

    for a in graph.nodes() {
        for b in graph.neighbors(a) {
            let ra = result.allocation.get(&cfg.vars().var(a));
            let rb = result.allocation.get(&cfg.vars().var(b));
            if let (Some(ra), Some(rb)) = (ra, rb) {
                assert_ne!(ra, rb);
            }
        }
    }
}

#[test]
fn test_regalloc_graphcoloring() {
    let src = include_str!("tac/loop.tac");
    let module = parse_module(src).unwrap();
    let result = allocate(&module, "sum", AllocatorConfig::default());
    check_allocation(&module, "sum", &result);

    assert!(result.no_spills());
    assert_eq!(result.spill_area_size, 0);
    // `total` is dead right after its store and may share with `n`
    assert_eq!(
        result.allocation[&var(&module, "sum", "total")],
        result.allocation[&var(&module, "sum", "n")]
    );
}

#[test]
fn test_regalloc_graphcoloring_spill() {
    let src = include_str!("tac/loop.tac");
    let module = parse_module(src).unwrap();
    let result = allocate(&module, "sum", AllocatorConfig::with_limits(3, 16));
    check_allocation(&module, "sum", &result);

    // s, i, n and c are all live in the loop header, one of four must go
    let s = var(&module, "sum", "s");
    assert_eq!(result.spilled_variables.len(), 1);
    assert!(result.spilled_variables.contains(&s));
    assert_eq!(result.spill_offsets[&s], 0);
    assert_eq!(result.spill_area_size, 4);
}

#[test]
fn test_regalloc_graphcoloring_spill_offsets() {
    let src = include_str!("tac/pressure.tac");
    let module = parse_module(src).unwrap();
    let result = allocate(&module, "mix", AllocatorConfig::with_limits(1, 1));
    check_allocation(&module, "mix", &result);

    let v = |name| var(&module, "mix", name);
    assert_eq!(result.allocation[&v("a")], rax());
    assert_eq!(result.allocation[&v("e")], xmm0());

    // bump allocated in first-reference order: double, bool, char, string
    assert_eq!(result.spill_offsets[&v("d")], 0);
    assert_eq!(result.spill_offsets[&v("b")], 8);
    assert_eq!(result.spill_offsets[&v("ch")], 9);
    assert_eq!(result.spill_offsets[&v("str")], 11);
    assert_eq!(result.spill_area_size, 19);
}

#[test]
fn test_regalloc_graphcoloring_no_pressure() {
    let src = include_str!("tac/pressure.tac");
    let module = parse_module(src).unwrap();
    let result = allocate(&module, "mix", AllocatorConfig::default());
    check_allocation(&module, "mix", &result);
    assert!(result.no_spills());
}

#[test]
fn test_regalloc_graphcoloring_scopes() {
    let src = include_str!("tac/scopes.tac");
    let module = parse_module(src).unwrap();

    let result = allocate(&module, "shadow", AllocatorConfig::default());
    check_allocation(&module, "shadow", &result);
    let regs: Vec<_> = result
        .variables()
        .iter()
        .map(|var| result.allocation[var])
        .collect();
    assert_eq!(regs.len(), 2);
    assert_ne!(regs[0], regs[1]);

    // writing through `p.y` reads `p`, so `p` stays live up to `DEL`
    let result = allocate(&module, "object", AllocatorConfig::with_limits(1, 1));
    check_allocation(&module, "object", &result);
    assert_eq!(result.spilled_variables.len(), 1);
}

#[test]
fn test_regalloc_graphcoloring_deterministic() {
    let src = include_str!("tac/pressure.tac");
    let module = parse_module(src).unwrap();
    let config = AllocatorConfig::with_limits(2, 1);

    let first = allocate(&module, "mix", config.clone());
    for _ in 0..4 {
        let again = allocate(&module, "mix", config.clone());
        assert_eq!(again.allocation, first.allocation);
        assert_eq!(again.spill_offsets, first.spill_offsets);
        assert_eq!(
            again.display(&module.symbols),
            first.display(&module.symbols)
        );
    }
}
