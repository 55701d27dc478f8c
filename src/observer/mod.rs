#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentEvents};
use crate::edge::Edge;
use crate::geometry::Vec2;
use crate::mind::{Mind, Phase};
use crate::node::{Charge, Node, NodeId, NodeKind};

/// Receives every agent tick from the simulation driver.
///
/// Observers see events after the fact; they cannot steer the agents.
pub trait TickObserver {
    fn on_tick(&mut self, tick: u64, agent: usize, phase: Phase, events: &AgentEvents);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl TickObserver for NullObserver {
    fn on_tick(&mut self, _tick: u64, _agent: usize, _phase: Phase, _events: &AgentEvents) {}
}

impl<F> TickObserver for F
where
    F: FnMut(u64, usize, Phase, &AgentEvents),
{
    fn on_tick(&mut self, tick: u64, agent: usize, phase: Phase, events: &AgentEvents) {
        self(tick, agent, phase, events)
    }
}

/// Keeps every event, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub entries: Vec<(u64, usize, AgentEvents)>,
}

impl TickObserver for EventLog {
    fn on_tick(&mut self, tick: u64, agent: usize, _phase: Phase, events: &AgentEvents) {
        self.entries.push((tick, agent, events.clone()));
    }
}

/// A read-only snapshot of a mind.
///
/// Snapshotting is on demand and allocates; the tick loop is unaffected.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MindSnapshot {
    pub age_cycles: u64,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
    pub pulses_in_flight: usize,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    pub capacity: Charge,
    pub gain: Charge,
    pub level: Charge,
    pub damage: u64,
    pub active: bool,
}

impl From<&Node> for NodeSnapshot {
    fn from(n: &Node) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            capacity: n.capacity,
            gain: n.gain,
            level: n.level,
            damage: n.damage,
            active: n.is_active(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeSnapshot {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: Charge,
    pub delay: u32,
    pub in_flight: Vec<u32>,
}

impl EdgeSnapshot {
    fn new(source: NodeId, e: &Edge) -> Self {
        Self {
            source,
            target: e.target,
            weight: e.weight,
            delay: e.delay,
            in_flight: e.in_flight.clone(),
        }
    }
}

pub struct MindAdapter<'a> {
    mind: &'a Mind,
}

impl<'a> MindAdapter<'a> {
    pub fn new(mind: &'a Mind) -> Self {
        Self { mind }
    }

    pub fn snapshot(&self) -> MindSnapshot {
        MindSnapshot {
            age_cycles: self.mind.age_cycles(),
            nodes: self.mind.nodes().iter().map(NodeSnapshot::from).collect(),
            edges: self
                .mind
                .edges()
                .map(|(source, e)| EdgeSnapshot::new(source, e))
                .collect(),
            pulses_in_flight: self.mind.pulses_in_flight(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AgentSnapshot {
    pub cycle: u64,
    pub position: Vec2,
    pub velocity: Vec2,
    pub arena: String,
    pub mind: MindSnapshot,
}

pub struct AgentAdapter<'a> {
    agent: &'a Agent,
}

impl<'a> AgentAdapter<'a> {
    pub fn new(agent: &'a Agent) -> Self {
        Self { agent }
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            cycle: self.agent.current_cycle(),
            position: self.agent.position(),
            velocity: self.agent.velocity(),
            arena: self.agent.arena().name().to_string(),
            mind: MindAdapter::new(self.agent.mind()).snapshot(),
        }
    }
}
