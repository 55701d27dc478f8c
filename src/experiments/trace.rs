//! Hand-wired four-node graph run through dream cycles, one snapshot per
//! cycle. Useful for eyeballing pulse timing and spill order.

use stynker::config::MindConfig;
use stynker::edge::Edge;
use stynker::error::Result;
use stynker::mind::{Mind, Phase};
use stynker::node::{Node, NodeId, NodeKind};
use stynker::observer::{MindAdapter, MindSnapshot};

/// Filler nodes never fill up.
const INERT_CAPACITY: i64 = 1_000_000;

/// `(id, capacity, gain)` of the wired nodes.
const WIRED: [(NodeId, i64, i64); 4] = [(2, 13, 1), (5, 17, 3), (8, 15, 2), (11, 15, 2)];

/// `(source, target, weight, delay)`.
const WIRING: [(NodeId, NodeId, i64, u32); 7] = [
    (11, 2, 1, 2),
    (2, 11, 1, 1),
    (2, 8, 2, 1),
    (5, 2, 3, 2),
    (5, 11, 1, 1),
    (5, 8, 1, 3),
    (8, 5, 3, 1),
];

pub fn hand_built_mind() -> Result<Mind> {
    let nodes = (0..12)
        .map(|id| match WIRED.iter().find(|(n, _, _)| *n == id) {
            Some(&(_, capacity, gain)) => Node::new(id, NodeKind::Regular, capacity, gain),
            None => Node::new(id, NodeKind::Regular, INERT_CAPACITY, 0),
        })
        .collect();
    let edges = WIRING
        .iter()
        .map(|&(source, target, weight, delay)| (source, Edge::new(target, weight, delay)))
        .collect();
    Mind::from_parts(MindConfig::with_size(12, 0, 0), nodes, edges)
}

/// Snapshot before the first cycle, then after each of `cycles` dream cycles.
pub fn run(cycles: usize) -> Result<Vec<MindSnapshot>> {
    let mut mind = hand_built_mind()?;
    let mut out = Vec::with_capacity(cycles + 1);
    out.push(MindAdapter::new(&mind).snapshot());
    for _ in 0..cycles {
        mind.run_cycle(Phase::Dream)?;
        out.push(MindAdapter::new(&mind).snapshot());
    }
    Ok(out)
}
