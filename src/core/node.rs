#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::MindConfig;
use crate::error::{Result, StynkerError};
use crate::prng::Prng;

/// Dense index of a node inside its mind.
pub type NodeId = usize;

/// Type alias for node levels, capacities, gains and edge weights.
pub type Charge = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NodeKind {
    /// Excited by wall contact through the input rings.
    Input,
    /// Kicks the body when it spills.
    Output,
    Regular,
}

impl NodeKind {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            NodeKind::Input => 0,
            NodeKind::Output => 1,
            NodeKind::Regular => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(NodeKind::Input),
            1 => Some(NodeKind::Output),
            2 => Some(NodeKind::Regular),
            _ => None,
        }
    }

    /// Kind of node `id` under the "inputs first, then outputs" layout.
    pub fn for_index(id: NodeId, input_count: usize, output_count: usize) -> Self {
        if id < input_count {
            NodeKind::Input
        } else if id < input_count + output_count {
            NodeKind::Output
        } else {
            NodeKind::Regular
        }
    }
}

/// Capacity-bounded accumulator.
///
/// `level` never drops below zero. A node is full once `level >= capacity`;
/// the mind then spills it, which resets the level and counts one unit of
/// damage.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub capacity: Charge,
    /// Charge added on every propagation pass.
    pub gain: Charge,
    pub level: Charge,
    /// Spills since the last remodel batch.
    pub damage: u64,
    active: bool,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, capacity: Charge, gain: Charge) -> Self {
        Self {
            id,
            kind,
            capacity,
            gain,
            level: 0,
            damage: 0,
            active: false,
        }
    }

    /// A node with capacity and gain drawn from the configured ranges.
    pub fn random(id: NodeId, kind: NodeKind, cfg: &MindConfig, rng: &mut Prng) -> Self {
        let capacity = rng.gen_in(cfg.capacity_range);
        let gain = rng.gen_in(cfg.gain_range);
        Self::new(id, kind, capacity, gain)
    }

    /// Restores every field, including the activation flag (used by image loading).
    pub(crate) fn restore(
        id: NodeId,
        kind: NodeKind,
        capacity: Charge,
        gain: Charge,
        level: Charge,
        damage: u64,
        active: bool,
    ) -> Self {
        Self {
            id,
            kind,
            capacity,
            gain,
            level: level.max(0),
            damage,
            active: active && kind != NodeKind::Regular,
        }
    }

    #[inline]
    pub fn increase_level(&mut self, delta: Charge) {
        self.level = self.level.saturating_add(delta).max(0);
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.level >= self.capacity
    }

    /// Empties the node and records the overflow. Edges are the caller's business.
    #[inline]
    pub fn spill(&mut self) {
        self.level = 0;
        self.damage += 1;
    }

    /// Draws a fresh capacity and gain. Damage is left alone: the mind resets
    /// it for every node once the whole remodel batch is done.
    pub fn remake(&mut self, cfg: &MindConfig, rng: &mut Prng) {
        self.capacity = rng.gen_in(cfg.capacity_range);
        self.gain = rng.gen_in(cfg.gain_range);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) -> Result<()> {
        self.set_active(true)
    }

    pub fn deactivate(&mut self) -> Result<()> {
        self.set_active(false)
    }

    fn set_active(&mut self, active: bool) -> Result<()> {
        match self.kind {
            NodeKind::Input | NodeKind::Output => {
                self.active = active;
                Ok(())
            }
            NodeKind::Regular => Err(StynkerError::InvalidOperation {
                id: self.id,
                kind: self.kind,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValueRange;

    #[test]
    fn level_is_clamped_at_zero() {
        let mut node = Node::new(0, NodeKind::Regular, 10, 1);
        node.increase_level(4);
        node.increase_level(-9);
        assert_eq!(node.level, 0);
        node.increase_level(3);
        assert_eq!(node.level, 3);
    }

    #[test]
    fn full_at_capacity() {
        let mut node = Node::new(0, NodeKind::Regular, 5, 1);
        node.increase_level(4);
        assert!(!node.is_full());
        node.increase_level(1);
        assert!(node.is_full());
    }

    #[test]
    fn spill_resets_level_and_counts_damage() {
        let mut node = Node::new(0, NodeKind::Output, 5, 1);
        node.increase_level(17);
        node.damage = 2;
        node.spill();
        assert_eq!(node.level, 0);
        assert_eq!(node.damage, 3);
    }

    #[test]
    fn regular_nodes_cannot_be_activated() {
        let mut node = Node::new(4, NodeKind::Regular, 5, 1);
        let err = node.activate().unwrap_err();
        assert!(matches!(
            err,
            StynkerError::InvalidOperation {
                id: 4,
                kind: NodeKind::Regular
            }
        ));
        assert!(node.deactivate().is_err());
        assert!(!node.is_active());
    }

    #[test]
    fn input_and_output_nodes_toggle() {
        for kind in [NodeKind::Input, NodeKind::Output] {
            let mut node = Node::new(0, kind, 5, 1);
            node.activate().unwrap();
            assert!(node.is_active());
            node.deactivate().unwrap();
            assert!(!node.is_active());
        }
    }

    #[test]
    fn remake_keeps_damage_and_draws_from_ranges() {
        let cfg = MindConfig {
            capacity_range: ValueRange::new(20, 25),
            gain_range: ValueRange::fixed(7),
            ..Default::default()
        };
        let mut rng = Prng::new(5);
        let mut node = Node::new(1, NodeKind::Regular, 1, 1);
        node.damage = 9;
        node.remake(&cfg, &mut rng);
        assert!(cfg.capacity_range.contains(node.capacity));
        assert_eq!(node.gain, 7);
        assert_eq!(node.damage, 9);
    }

    #[test]
    fn kind_layout_puts_inputs_first() {
        assert_eq!(NodeKind::for_index(0, 2, 2), NodeKind::Input);
        assert_eq!(NodeKind::for_index(1, 2, 2), NodeKind::Input);
        assert_eq!(NodeKind::for_index(2, 2, 2), NodeKind::Output);
        assert_eq!(NodeKind::for_index(3, 2, 2), NodeKind::Output);
        assert_eq!(NodeKind::for_index(4, 2, 2), NodeKind::Regular);
    }
}
