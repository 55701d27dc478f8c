//! # stynker
//!
//! A spreading-activation "mind" embodied as a point body in a 2D arena.
//!
//! Nodes accumulate charge, spill when full and send delayed pulses along
//! weighted edges. Sleep cycles rebuild a few nodes and their wiring. On wake
//! cycles, spilling output nodes kick the body; the arena reflects it off
//! walls and the nearest wall arms an input node for the next cycle.
//!
//! ## Quick Start
//!
//! ```
//! use stynker::prelude::*;
//!
//! let cfg = AgentConfig::default().with_arena(ArenaDefinition::square(100.0));
//! let mut agent = Agent::new(&cfg)?;
//!
//! for _ in 0..10 {
//!     let ev = agent.run_cycle(Phase::Wake)?;
//!     assert!(ev.position.is_finite());
//! }
//! agent.run_cycle(Phase::Sleep)?;
//! # Ok::<(), StynkerError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): derives on configs, events and snapshots, plus JSON
//!   config loading
//!
//! ## Modules
//!
//! - [`mind`]: node graph, propagation and remodeling
//! - [`arena`]: walls and multi-bounce displacement
//! - [`agent`]: the embodied mind
//! - [`simulation`]: schedule-driven tick loop over a population
//! - [`storage`]: binary image framing
//! - [`observer`]: read-only observation adapters

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/node.rs"]
pub mod node;

#[path = "core/edge.rs"]
pub mod edge;

#[path = "core/mind.rs"]
pub mod mind;

#[path = "core/geometry.rs"]
pub mod geometry;

#[path = "core/arena.rs"]
pub mod arena;

#[path = "core/agent.rs"]
pub mod agent;

#[path = "core/storage.rs"]
pub mod storage;

#[path = "core/simulation.rs"]
pub mod simulation;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use stynker::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::{Agent, AgentEvents, InputRing, RingBand};
    pub use crate::arena::{Arena, ArenaDefinition, Resolution, SegmentId};
    pub use crate::config::{AgentConfig, MindConfig, RemodelPolicy, ValueRange};
    pub use crate::edge::Edge;
    pub use crate::error::{GeometryError, Result, StynkerError};
    pub use crate::geometry::Vec2;
    pub use crate::mind::{Mind, Phase, PropagationEvents};
    pub use crate::node::{Charge, Node, NodeId, NodeKind};
    pub use crate::observer::{NullObserver, TickObserver};
    pub use crate::simulation::{Schedule, Simulation, SimulationConfig, SimulationResult};
}
