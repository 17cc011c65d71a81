use rustc_hash::FxHashSet;

use super::{ControlFlowGraph, VarId};

/// Iterate the IN/OUT equations until nothing changes.
///
/// ```text
/// out[B] = U in[S] for all S in succ[B]
/// in[B]  = use[B] U (out[B] - def[B])
/// ```
///
/// Every line that uses a variable counts towards `use[B]`, whether or not
/// the block defined it first. Returns the number of sweeps, the last one
/// being the sweep that changed nothing.
pub fn analyze_on_function(cfg: &mut ControlFlowGraph) -> usize {
    for block in cfg.blocks.iter_mut() {
        block.live_in.clear();
        block.live_out.clear();
    }

    let mut iterations = 0;
    let mut changed = true;
    while changed {
        changed = false;
        iterations += 1;

        // backward problem, so visit the blocks backwards
        for id in cfg.block_ids().rev() {
            let mut out: FxHashSet<VarId> = FxHashSet::default();
            for succ in cfg.succs(id) {
                out.extend(cfg.block(*succ).live_in.iter().copied());
            }

            let block = cfg.block(id);
            let mut in_: FxHashSet<VarId> = block.uses.keys().copied().collect();
            in_.extend(out.iter().filter(|var| !block.defs.contains_key(var)).copied());

            let block = &mut cfg.blocks[id.index()];
            if block.live_in != in_ {
                block.live_in = in_;
                changed = true;
            }
            if block.live_out != out {
                block.live_out = out;
                changed = true;
            }
        }
    }

    log::debug!(
        "[ liveness ] `{}`: fixed point after {} iterations",
        cfg.function,
        iterations
    );

    iterations
}
