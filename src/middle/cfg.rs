//! Basic-block partitioning and backward liveness dataflow.
//!
//! Block boundaries and successor edges follow `spec.md` §4.2 directly.
//! The liveness fixed point is grounded on the gen/kill-then-iterate
//! shape used by `other_examples`' ARC liveness pass: precompute each
//! block's `gen`/`kill` once, iterate block-level `liveIn`/`liveOut` to a
//! fixed point, then do a single backward pass per block to fill in each
//! location's sets (the two are equivalent to iterating per-location to a
//! fixed point directly, since a block's instructions are straight-line).

use crate::common::Set;
use crate::middle::tac::{Instr, Label, TacFunction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Continuous,
    ByBranch,
    ByCondBranch,
    ByReturn,
}

/// A TAC instruction paired with its computed `liveIn`/`liveOut` sets
/// (temp indices).
#[derive(Debug)]
pub struct Loc {
    pub instr: Instr,
    pub live_in: Set<u32>,
    pub live_out: Set<u32>,
}

#[derive(Debug)]
pub struct BasicBlock {
    pub id: usize,
    pub label: Option<Label>,
    pub kind: BlockKind,
    pub locs: Vec<Loc>,
    pub succ: Vec<usize>,
}

impl BasicBlock {
    pub fn is_empty(&self) -> bool {
        self.locs.is_empty()
    }

    /// Union of every location's `liveIn`/`liveOut`, exposed for callers
    /// that want a block-level summary rather than per-location detail.
    pub fn live_in(&self) -> Set<u32> {
        self.locs.first().map(|l| l.live_in.clone()).unwrap_or_default()
    }

    pub fn live_out(&self) -> Set<u32> {
        self.locs.last().map(|l| l.live_out.clone()).unwrap_or_default()
    }
}

pub struct Cfg {
    pub blocks: Vec<BasicBlock>,
    reachable: Set<usize>,
}

impl Cfg {
    pub fn iter(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    pub fn unreachable(&self, id: usize) -> bool {
        !self.reachable.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl std::ops::Index<usize> for Cfg {
    type Output = BasicBlock;
    fn index(&self, id: usize) -> &BasicBlock {
        &self.blocks[id]
    }
}

pub fn build(func: &TacFunction) -> Cfg {
    tracing::debug!(function = %func.name, instrs = func.instrs.len(), "building cfg");

    let grouped = split_blocks(&func.instrs);
    let num_blocks = grouped.len();

    let mut label_to_block = crate::common::Map::new();
    for (id, instrs) in grouped.iter().enumerate() {
        if let Some(Instr::Mark { label }) = instrs.first() {
            label_to_block.insert(*label, id);
        }
    }

    let mut blocks: Vec<BasicBlock> = grouped
        .into_iter()
        .enumerate()
        .map(|(id, instrs)| {
            let label = match instrs.first() {
                Some(Instr::Mark { label }) => Some(*label),
                _ => None,
            };
            let (kind, succ) = classify(id, num_blocks, instrs.last(), &label_to_block);
            let locs = instrs
                .into_iter()
                .map(|instr| Loc { instr, live_in: Set::new(), live_out: Set::new() })
                .collect();
            BasicBlock { id, label, kind, locs, succ }
        })
        .collect();

    let reachable = reachable_from(0, &blocks);
    for id in 0..blocks.len() {
        if !reachable.contains(&id) {
            tracing::debug!(function = %func.name, block = id, "unreachable block");
        }
    }

    compute_liveness(&mut blocks);

    Cfg { blocks, reachable }
}

/// Start a new block at every `Mark` (unless the current block is still
/// empty) and immediately after every terminator.
fn split_blocks(instrs: &[Instr]) -> Vec<Vec<Instr>> {
    let mut blocks = Vec::new();
    let mut current: Vec<Instr> = Vec::new();
    for instr in instrs {
        let starts_new_block =
            !current.is_empty() && (instr.is_label() || current.last().unwrap().is_terminator());
        if starts_new_block {
            blocks.push(std::mem::take(&mut current));
        }
        current.push(instr.clone());
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn classify(
    id: usize,
    num_blocks: usize,
    last: Option<&Instr>,
    label_to_block: &crate::common::Map<Label, usize>,
) -> (BlockKind, Vec<usize>) {
    match last {
        Some(Instr::Branch { target }) => (BlockKind::ByBranch, vec![label_to_block[target]]),
        Some(Instr::CondBranch { target, .. }) => {
            let mut succ = Vec::new();
            if id + 1 < num_blocks {
                succ.push(id + 1);
            }
            succ.push(label_to_block[target]);
            (BlockKind::ByCondBranch, succ)
        }
        Some(Instr::Return { .. }) => (BlockKind::ByReturn, vec![]),
        _ => {
            let succ = if id + 1 < num_blocks { vec![id + 1] } else { vec![] };
            (BlockKind::Continuous, succ)
        }
    }
}

fn reachable_from(start: usize, blocks: &[BasicBlock]) -> Set<usize> {
    let mut seen = Set::new();
    let mut queue = std::collections::VecDeque::new();
    if !blocks.is_empty() {
        queue.push_back(start);
        seen.insert(start);
    }
    while let Some(id) = queue.pop_front() {
        for &s in &blocks[id].succ {
            if seen.insert(s) {
                queue.push_back(s);
            }
        }
    }
    seen
}

fn gen_kill(instrs: &[Loc]) -> (Set<u32>, Set<u32>) {
    let mut gen = Set::new();
    let mut kill = Set::new();
    for loc in instrs {
        for used in loc.instr.reads() {
            if !kill.contains(&used.0) {
                gen.insert(used.0);
            }
        }
        for defined in loc.instr.writes() {
            kill.insert(defined.0);
        }
    }
    (gen, kill)
}

fn compute_liveness(blocks: &mut [BasicBlock]) {
    let n = blocks.len();
    let mut gens = Vec::with_capacity(n);
    let mut kills = Vec::with_capacity(n);
    for b in blocks.iter() {
        let (g, k) = gen_kill(&b.locs);
        gens.push(g);
        kills.push(k);
    }

    let mut live_in: Vec<Set<u32>> = vec![Set::new(); n];
    let mut live_out: Vec<Set<u32>> = vec![Set::new(); n];

    let mut iterations = 0u32;
    loop {
        iterations += 1;
        let mut changed = false;
        for id in 0..n {
            let mut new_out = Set::new();
            for &s in &blocks[id].succ {
                new_out.extend(live_in[s].iter().copied());
            }
            let mut new_in = gens[id].clone();
            for &t in &new_out {
                if !kills[id].contains(&t) {
                    new_in.insert(t);
                }
            }
            if new_in != live_in[id] || new_out != live_out[id] {
                changed = true;
                live_in[id] = new_in;
                live_out[id] = new_out;
            }
        }
        if !changed {
            break;
        }
    }
    tracing::debug!(iterations, blocks = n, "liveness converged");

    for (id, block) in blocks.iter_mut().enumerate() {
        let mut cur_out = live_out[id].clone();
        for loc in block.locs.iter_mut().rev() {
            loc.live_out = cur_out.clone();
            let mut new_in = cur_out.clone();
            for d in loc.instr.writes() {
                new_in.remove(&d.0);
            }
            for u in loc.instr.reads() {
                new_in.insert(u.0);
            }
            loc.live_in = new_in.clone();
            cur_out = new_in;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::{parse, resolve};
    use crate::middle::tac;

    fn cfg_for(src: &str) -> Cfg {
        let prog = resolve(parse(src).unwrap()).unwrap();
        let tac_prog = tac::build(&prog);
        build(&tac_prog.functions[0])
    }

    #[test]
    fn single_block_for_straight_line_function() {
        let cfg = cfg_for("int main() { int a = 1; return a; }");
        assert_eq!(cfg.len(), 1);
        assert_eq!(cfg[0].kind, BlockKind::ByReturn);
    }

    #[test]
    fn if_else_splits_into_four_blocks() {
        let cfg = cfg_for("int main() { int a; if (1) { a = 1; } else { a = 2; } return a; }");
        assert!(cfg.len() >= 4);
        assert!(!cfg.unreachable(0));
    }

    #[test]
    fn while_loop_has_cond_branch_block() {
        let cfg = cfg_for("int main() { int i = 0; while (i) { i = 0; } return 0; }");
        assert!(cfg.iter().any(|b| b.kind == BlockKind::ByCondBranch));
    }

    #[test]
    fn used_temp_is_live_in_at_its_use() {
        let cfg = cfg_for("int main() { int a = 1; int b = 2; return a + b; }");
        for block in cfg.iter() {
            for loc in &block.locs {
                for used in loc.instr.reads() {
                    assert!(loc.live_in.contains(&used.0));
                }
            }
        }
    }

    #[test]
    fn liveness_is_idempotent() {
        let a = cfg_for("int main() { int a = 1; int b = a + 1; return b; }");
        let b = cfg_for("int main() { int a = 1; int b = a + 1; return b; }");
        for (ba, bb) in a.iter().zip(b.iter()) {
            assert_eq!(ba.live_in(), bb.live_in());
            assert_eq!(ba.live_out(), bb.live_out());
        }
    }
}
