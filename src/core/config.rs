#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arena::ArenaDefinition;
use crate::error::{Result, StynkerError};
use crate::geometry::Vec2;

/// Inclusive integer range `[min, max]` used for every random draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ValueRange {
    pub min: i64,
    pub max: i64,
}

impl ValueRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: i64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn contains(&self, v: i64) -> bool {
        self.min <= v && v <= self.max
    }

    fn check(&self, name: &str, floor: i64) -> Result<()> {
        if self.min > self.max {
            return Err(StynkerError::config(format!(
                "{name}: min {} exceeds max {}",
                self.min, self.max
            )));
        }
        if self.min < floor {
            return Err(StynkerError::config(format!(
                "{name}: min must be >= {floor}"
            )));
        }
        // Keeps `max - min + 1` representable for the generator.
        let too_wide = self
            .max
            .checked_sub(self.min)
            .map_or(true, |span| span >= i64::from(u32::MAX));
        if too_wide {
            return Err(StynkerError::config(format!("{name}: span too large")));
        }
        Ok(())
    }
}

/// How the sleep phase chooses which nodes to remake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RemodelPolicy {
    /// Lowest damage first, ties broken by ascending id.
    #[default]
    DamageOrdered,
    /// Distinct nodes sampled uniformly without replacement.
    UniformRandom,
}

impl RemodelPolicy {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            RemodelPolicy::DamageOrdered => 0,
            RemodelPolicy::UniformRandom => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(RemodelPolicy::DamageOrdered),
            1 => Some(RemodelPolicy::UniformRandom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MindConfig {
    pub node_count: usize,
    /// The first `input_count` ids are input nodes.
    pub input_count: usize,
    /// The next `output_count` ids are output nodes.
    pub output_count: usize,

    pub capacity_range: ValueRange,
    pub gain_range: ValueRange,

    /// Edges created per direction when a node gets fresh edges.
    pub edge_count_range: ValueRange,
    pub edge_weight_range: ValueRange,
    /// Cycles a pulse spends on an edge; at least 1.
    pub edge_delay_range: ValueRange,

    /// Nodes remade per sleep cycle.
    pub remodel_count: usize,
    pub remodel_policy: RemodelPolicy,

    /// Charge an active input node receives on the next propagation pass.
    pub input_charge: i64,

    // If set, makes behavior reproducible for evaluation.
    pub seed: Option<u64>,
}

impl Default for MindConfig {
    fn default() -> Self {
        Self {
            node_count: 48,
            input_count: 32,
            output_count: 16,
            capacity_range: ValueRange::new(10, 30),
            gain_range: ValueRange::new(1, 5),
            edge_count_range: ValueRange::new(1, 4),
            edge_weight_range: ValueRange::new(1, 6),
            edge_delay_range: ValueRange::new(1, 4),
            remodel_count: 4,
            remodel_policy: RemodelPolicy::DamageOrdered,
            input_charge: 10,
            seed: None,
        }
    }
}

impl MindConfig {
    /// Seed used when none is configured.
    pub const DEFAULT_SEED: u64 = 0x5EED_5EED;

    pub fn with_size(node_count: usize, input_count: usize, output_count: usize) -> Self {
        Self {
            node_count,
            input_count,
            output_count,
            remodel_count: Self::default().remodel_count.min(node_count),
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_remodel(mut self, count: usize, policy: RemodelPolicy) -> Self {
        self.remodel_count = count;
        self.remodel_policy = policy;
        self
    }

    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or(Self::DEFAULT_SEED)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_count + self.output_count > self.node_count {
            return Err(StynkerError::config(format!(
                "input_count ({}) + output_count ({}) exceeds node_count ({})",
                self.input_count, self.output_count, self.node_count
            )));
        }
        if self.remodel_count > self.node_count {
            return Err(StynkerError::config(format!(
                "remodel_count ({}) exceeds node_count ({})",
                self.remodel_count, self.node_count
            )));
        }
        self.capacity_range.check("capacity_range", 1)?;
        self.gain_range.check("gain_range", i64::MIN / 4)?;
        self.edge_count_range.check("edge_count_range", 0)?;
        self.edge_weight_range.check("edge_weight_range", i64::MIN / 4)?;
        self.edge_delay_range.check("edge_delay_range", 1)?;
        if self.edge_delay_range.max > i64::from(u32::MAX) {
            return Err(StynkerError::config("edge_delay_range: max too large"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AgentConfig {
    pub mind: MindConfig,
    /// Velocity multiplier applied after every wake tick.
    pub friction: f32,
    /// Body radius; the inner input ring sits at `radius`, the outer at `2 * radius`.
    pub radius: f32,
    pub initial_position: Vec2,
    pub arena: ArenaDefinition,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mind: MindConfig::default(),
            friction: 0.8,
            radius: 10.0,
            initial_position: Vec2::ZERO,
            arena: ArenaDefinition::simple_maze(),
        }
    }
}

impl AgentConfig {
    pub fn with_arena(mut self, arena: ArenaDefinition) -> Self {
        self.arena = arena;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.mind.validate()?;
        if self.mind.input_count % 2 != 0 {
            return Err(StynkerError::config(format!(
                "input_count ({}) must be even: inputs are laid out as two rings",
                self.mind.input_count
            )));
        }
        if !self.friction.is_finite() || self.friction < 0.0 {
            return Err(StynkerError::config("friction must be finite and >= 0"));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(StynkerError::config("radius must be finite and > 0"));
        }
        if !self.initial_position.is_finite() {
            return Err(StynkerError::config("initial_position must be finite"));
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AgentConfig::default().validate().unwrap();
    }

    #[test]
    fn remodel_count_above_node_count_is_rejected() {
        let cfg = MindConfig::with_size(4, 0, 0).with_remodel(5, RemodelPolicy::DamageOrdered);
        assert!(matches!(cfg.validate(), Err(StynkerError::InvalidConfig(_))));
    }

    #[test]
    fn io_count_above_node_count_is_rejected() {
        let cfg = MindConfig::with_size(10, 8, 4);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn odd_input_count_is_rejected_for_agents() {
        let cfg = AgentConfig {
            mind: MindConfig::with_size(10, 3, 2),
            ..Default::default()
        };
        cfg.mind.validate().unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_delay_is_rejected() {
        let mut cfg = MindConfig::with_size(8, 2, 2);
        cfg.edge_delay_range = ValueRange::new(0, 3);
        assert!(cfg.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg = AgentConfig::from_json_str(
            r#"{
                "friction": 1.0,
                "mind": {
                    "node_count": 12,
                    "input_count": 4,
                    "output_count": 4,
                    "remodel_policy": "uniform_random"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.friction, 1.0);
        assert_eq!(cfg.mind.node_count, 12);
        assert_eq!(cfg.mind.remodel_policy, RemodelPolicy::UniformRandom);
        assert_eq!(cfg.mind.input_charge, 10);
    }
}
