#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::node::{Charge, Node, NodeId};

/// Delayed, weighted channel towards `target`.
///
/// Every `load()` queues a pulse whose countdown starts at `delay`; the pulse
/// lands on the target during the `run_cycle` at which its countdown reads 1.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Edge {
    pub target: NodeId,
    pub weight: Charge,
    /// Cycles from `load()` to delivery; at least 1.
    pub delay: u32,
    /// Remaining-delay counters of pulses in transit, oldest first.
    pub in_flight: Vec<u32>,
}

impl Edge {
    pub fn new(target: NodeId, weight: Charge, delay: u32) -> Self {
        Self {
            target,
            weight,
            delay: delay.max(1),
            in_flight: Vec::new(),
        }
    }

    #[inline]
    pub fn load(&mut self) {
        self.in_flight.push(self.delay);
    }

    /// Delivers due pulses to `target` and advances the rest.
    ///
    /// Returns how many pulses arrived.
    pub fn run_cycle(&mut self, target: &mut Node) -> usize {
        debug_assert_eq!(target.id, self.target);
        let weight = self.weight;
        let mut arrived = 0;
        self.in_flight.retain_mut(|t| {
            if *t <= 1 {
                target.increase_level(weight);
                arrived += 1;
                false
            } else {
                *t -= 1;
                true
            }
        });
        arrived
    }

    pub fn pulses_in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
