//! A mind embodied as a point body in an arena.
//!
//! On wake ticks the mind's spilled outputs push the body, the arena resolves
//! the move, and the wall the body touched (or nearly touched) arms one input
//! node for the next tick.

use std::f32::consts::PI;

use hashbrown::HashMap;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::{Arena, SegmentId};
use crate::config::AgentConfig;
use crate::error::{Result, StynkerError};
use crate::geometry::Vec2;
use crate::mind::{Mind, Phase, PropagationEvents};
use crate::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RingBand {
    Inner,
    Outer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingSlot {
    pub node: NodeId,
    pub band: RingBand,
    /// Position relative to the body's centre.
    pub offset: Vec2,
}

/// Sensor layout of the input nodes: two concentric rings around the body.
///
/// Input `i` of `n` sits on the inner ring (radius `r`) when `i < n / 2`,
/// otherwise on the outer ring (`2r`), at angle `4πi / n`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRing {
    radius: f32,
    slots: Vec<RingSlot>,
}

impl InputRing {
    pub fn new(input_count: usize, radius: f32) -> Self {
        let half = (input_count / 2).max(1);
        let slots = (0..input_count)
            .map(|i| {
                let band = if i < half { RingBand::Inner } else { RingBand::Outer };
                let scale = match band {
                    RingBand::Inner => radius,
                    RingBand::Outer => 2.0 * radius,
                };
                let alpha = 4.0 * PI * i as f32 / input_count as f32;
                RingSlot {
                    node: i,
                    band,
                    offset: Vec2::new(alpha.cos() * scale, alpha.sin() * scale),
                }
            })
            .collect();
        Self { radius, slots }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn outer_radius(&self) -> f32 {
        2.0 * self.radius
    }

    pub fn slots(&self) -> &[RingSlot] {
        &self.slots
    }

    pub fn offset(&self, node: NodeId) -> Option<Vec2> {
        self.slots.iter().find(|s| s.node == node).map(|s| s.offset)
    }

    pub fn inner(&self) -> impl Iterator<Item = (NodeId, Vec2)> + '_ {
        self.slots
            .iter()
            .filter(|s| s.band == RingBand::Inner)
            .map(|s| (s.node, s.offset))
    }

    pub fn all(&self) -> impl Iterator<Item = (NodeId, Vec2)> + '_ {
        self.slots.iter().map(|s| (s.node, s.offset))
    }
}

/// Unit push for every output node: output `j` of `n` points from the middle
/// of the `j`-th arc of the unit circle towards the centre.
pub fn kick_table(input_count: usize, output_count: usize) -> HashMap<NodeId, Vec2> {
    (0..output_count)
        .map(|j| {
            let alpha = 2.0 * PI * (j as f32 + 0.5) / output_count as f32;
            (input_count + j, Vec2::new(-alpha.cos(), -alpha.sin()))
        })
        .collect()
}

/// What one agent tick did.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AgentEvents {
    pub cycle: u64,
    pub phase: Phase,
    pub won: bool,
    pub lost: bool,
    pub position: Vec2,
    pub velocity: Vec2,
    pub closest_input_node: Option<NodeId>,
    pub impacted: Option<SegmentId>,
    pub bounces: usize,
    pub degenerate: bool,
    pub propagation: PropagationEvents,
}

impl AgentEvents {
    pub fn is_terminal(&self) -> bool {
        self.won || self.lost
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    mind: Mind,
    arena: Arena,
    position: Vec2,
    velocity: Vec2,
    initial_position: Vec2,
    radius: f32,
    friction: f32,
    kick_table: HashMap<NodeId, Vec2>,
    input_ring: InputRing,
    current_cycle: u64,
    /// Set when a tick ends on the winning or losing wall; the body stays
    /// put until `reset_position`.
    at_terminal: bool,
}

impl Agent {
    pub fn new(cfg: &AgentConfig) -> Result<Self> {
        cfg.validate()?;
        let mind = Mind::new(cfg.mind.clone())?;
        Self::with_mind(cfg, mind)
    }

    /// Embodies an existing mind; its I/O layout overrides `cfg.mind`.
    pub fn with_mind(cfg: &AgentConfig, mind: Mind) -> Result<Self> {
        let input_count = mind.config().input_count;
        if input_count % 2 != 0 {
            return Err(StynkerError::config(format!(
                "input_count ({input_count}) must be even: inputs are laid out as two rings"
            )));
        }
        let arena = Arena::new(&cfg.arena)?;
        let kick_table = kick_table(input_count, mind.config().output_count);
        let input_ring = InputRing::new(input_count, cfg.radius);
        Ok(Self {
            mind,
            arena,
            position: cfg.initial_position,
            velocity: Vec2::ZERO,
            initial_position: cfg.initial_position,
            radius: cfg.radius,
            friction: cfg.friction,
            kick_table,
            input_ring,
            current_cycle: 0,
            at_terminal: false,
        })
    }

    pub fn mind(&self) -> &Mind {
        &self.mind
    }

    pub fn mind_mut(&mut self) -> &mut Mind {
        &mut self.mind
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn kick_table(&self) -> &HashMap<NodeId, Vec2> {
        &self.kick_table
    }

    pub fn input_ring(&self) -> &InputRing {
        &self.input_ring
    }

    pub fn current_cycle(&self) -> u64 {
        self.current_cycle
    }

    /// The last wake tick ended on a terminal wall and no reset followed.
    pub fn at_terminal(&self) -> bool {
        self.at_terminal
    }

    pub fn reset_position(&mut self) {
        self.position = self.initial_position;
        self.at_terminal = false;
    }

    pub fn reset_velocity(&mut self) {
        self.velocity = Vec2::ZERO;
    }

    /// Takes over `other`'s mind structure and kick table. Position,
    /// velocity and the receiver's generator are left alone.
    pub fn clone_mind_from(&mut self, other: &Agent) {
        self.mind.clone_structure_from(&other.mind);
        self.kick_table = other.kick_table.clone();
        self.input_ring = InputRing::new(self.mind.config().input_count, self.radius);
    }

    pub fn run_cycle(&mut self, phase: Phase) -> Result<AgentEvents> {
        self.current_cycle += 1;
        let propagation = self.mind.run_cycle(phase)?;
        let mut events = AgentEvents {
            cycle: self.current_cycle,
            phase,
            won: false,
            lost: false,
            position: self.position,
            velocity: self.velocity,
            closest_input_node: None,
            impacted: None,
            bounces: 0,
            degenerate: false,
            propagation,
        };
        if phase != Phase::Wake || self.at_terminal {
            return Ok(events);
        }

        for id in &events.propagation.spilled_outputs {
            if let Some(kick) = self.kick_table.get(id) {
                self.velocity += *kick;
            }
        }

        let res = self
            .arena
            .resolve_displacement(self.position, self.velocity, Some(&self.input_ring))?;
        self.position = res.position;
        self.velocity = res.velocity * self.friction;
        self.at_terminal = res.won || res.lost;

        if let Some(id) = res.closest_input_node {
            self.mind.activate(id)?;
            events.propagation.activated_next_input = Some(id);
        }
        if res.bounces > 0 {
            debug!(
                cycle = self.current_cycle,
                bounces = res.bounces,
                wall = ?res.impacted,
                "agent bounced"
            );
        }

        events.won = res.won;
        events.lost = res.lost;
        events.position = self.position;
        events.velocity = self.velocity;
        events.closest_input_node = res.closest_input_node;
        events.impacted = res.impacted;
        events.bounces = res.bounces;
        events.degenerate = res.degenerate;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaDefinition;
    use crate::config::MindConfig;
    use crate::node::{Node, NodeKind};

    const TOL: f32 = 1.0e-4;

    /// Two inputs, one output and no edges; the output spills every tick
    /// when `output_gain >= 1`.
    fn tiny_mind(output_gain: i64) -> Mind {
        let nodes = vec![
            Node::new(0, NodeKind::Input, 100, 0),
            Node::new(1, NodeKind::Input, 100, 0),
            Node::new(2, NodeKind::Output, 1, output_gain),
        ];
        Mind::from_parts(MindConfig::with_size(3, 2, 1), nodes, Vec::new()).unwrap()
    }

    fn cfg(arena: ArenaDefinition, start: Vec2) -> AgentConfig {
        AgentConfig {
            initial_position: start,
            ..AgentConfig::default().with_arena(arena)
        }
    }

    #[test]
    fn kicks_are_unit_vectors_that_cancel_out() {
        let table = kick_table(32, 16);
        assert_eq!(table.len(), 16);
        let mut sum = Vec2::ZERO;
        for (id, kick) in &table {
            assert!((32..48).contains(id));
            assert!((kick.length() - 1.0).abs() < TOL);
            sum += *kick;
        }
        assert!(sum.approx_eq(Vec2::ZERO, TOL));

        // Four outputs: the first arc is centred at 45 degrees.
        let first = kick_table(0, 4)[&0];
        let diag = -(0.5f32).sqrt();
        assert!(first.approx_eq(Vec2::new(diag, diag), TOL));
    }

    #[test]
    fn input_ring_layout() {
        let ring = InputRing::new(4, 10.0);
        let bands: Vec<RingBand> = ring.slots().iter().map(|s| s.band).collect();
        assert_eq!(
            bands,
            vec![RingBand::Inner, RingBand::Inner, RingBand::Outer, RingBand::Outer]
        );
        assert!(ring.offset(0).unwrap().approx_eq(Vec2::new(10.0, 0.0), TOL));
        assert!(ring.offset(1).unwrap().approx_eq(Vec2::new(-10.0, 0.0), TOL));
        assert!(ring.offset(2).unwrap().approx_eq(Vec2::new(20.0, 0.0), TOL));
        assert!(ring.offset(3).unwrap().approx_eq(Vec2::new(-20.0, 0.0), TOL));
        assert_eq!(ring.inner().count(), 2);
        assert_eq!(ring.outer_radius(), 20.0);
    }

    #[test]
    fn odd_input_count_is_rejected() {
        let mut config = AgentConfig::default();
        config.mind.input_count = 31;
        assert!(matches!(
            Agent::new(&config),
            Err(StynkerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn dream_ticks_do_not_move_the_body() {
        let mut agent = Agent::with_mind(
            &cfg(ArenaDefinition::square(100.0), Vec2::ZERO),
            tiny_mind(1),
        )
        .unwrap();
        let ev = agent.run_cycle(Phase::Dream).unwrap();
        assert_eq!(ev.propagation.spilled_outputs, vec![2]);
        assert_eq!(agent.position(), Vec2::ZERO);
        assert_eq!(agent.velocity(), Vec2::ZERO);
    }

    #[test]
    fn wake_applies_kick_then_moves_then_friction() {
        let mut agent = Agent::with_mind(
            &cfg(ArenaDefinition::square(100.0), Vec2::ZERO),
            tiny_mind(1),
        )
        .unwrap();
        // Single output: alpha = pi, kick = (1, 0).
        let ev = agent.run_cycle(Phase::Wake).unwrap();
        assert!(ev.position.approx_eq(Vec2::new(1.0, 0.0), TOL));
        assert!(ev.velocity.approx_eq(Vec2::new(0.8, 0.0), TOL));

        let ev = agent.run_cycle(Phase::Wake).unwrap();
        assert!(ev.position.approx_eq(Vec2::new(2.8, 0.0), TOL));
        assert!(ev.velocity.approx_eq(Vec2::new(1.44, 0.0), TOL));
        assert_eq!(ev.cycle, 2);
    }

    #[test]
    fn wall_contact_arms_the_facing_input() {
        let mut agent = Agent::with_mind(
            &cfg(ArenaDefinition::square(20.0), Vec2::new(15.0, 0.0)),
            tiny_mind(0),
        )
        .unwrap();
        agent.set_velocity(Vec2::new(10.0, 0.0));

        let ev = agent.run_cycle(Phase::Wake).unwrap();
        assert_eq!(ev.bounces, 1);
        assert_eq!(ev.closest_input_node, Some(0));
        assert_eq!(ev.propagation.activated_next_input, Some(0));
        assert!(agent.mind().node(0).unwrap().is_active());
        assert!(ev.position.approx_eq(Vec2::new(15.0, 0.0), TOL));
        assert!(ev.velocity.approx_eq(Vec2::new(-8.0, 0.0), TOL));

        // The armed input receives its charge on the next tick.
        agent.run_cycle(Phase::Dream).unwrap();
        let input = agent.mind().node(0).unwrap();
        assert_eq!(input.level, 10);
        assert!(!input.is_active());
    }

    #[test]
    fn terminal_wall_is_reported() {
        let arena = ArenaDefinition::square(20.0).with_terminals(Some(0), Some(2));
        let mut agent =
            Agent::with_mind(&cfg(arena, Vec2::new(15.0, 0.0)), tiny_mind(0)).unwrap();
        agent.set_velocity(Vec2::new(10.0, 0.0));
        let ev = agent.run_cycle(Phase::Wake).unwrap();
        assert!(ev.won && ev.is_terminal());
        assert!(ev.position.approx_eq(Vec2::new(20.0, 0.0), TOL));
        assert!(agent.at_terminal());

        // The outward velocity must not carry the body through the wall.
        let ev = agent.run_cycle(Phase::Wake).unwrap();
        assert!(!ev.is_terminal());
        assert!(ev.position.approx_eq(Vec2::new(20.0, 0.0), TOL));
        assert!(agent.position().x <= 20.0);

        agent.reset_position();
        assert!(!agent.at_terminal());
        agent.reset_velocity();
        assert_eq!(agent.position(), Vec2::new(15.0, 0.0));
        assert_eq!(agent.velocity(), Vec2::ZERO);
    }

    #[test]
    fn clone_mind_from_copies_structure_and_kicks() {
        let base = AgentConfig::default();
        let donor_cfg = AgentConfig {
            mind: base.mind.clone().with_seed(1),
            ..base.clone()
        };
        let receiver_cfg = AgentConfig {
            mind: base.mind.clone().with_seed(2),
            ..base
        };
        let donor = Agent::new(&donor_cfg).unwrap();
        let mut receiver = Agent::new(&receiver_cfg).unwrap();
        receiver.set_velocity(Vec2::new(3.0, 4.0));

        receiver.clone_mind_from(&donor);
        assert_eq!(receiver.mind().nodes(), donor.mind().nodes());
        assert_eq!(receiver.mind().edge_count(), donor.mind().edge_count());
        assert_eq!(receiver.kick_table(), donor.kick_table());
        assert_eq!(receiver.velocity(), Vec2::new(3.0, 4.0));
        assert!(receiver.mind().reverse_index_consistent());
    }
}
