//! Error types shared by the mind, the arena and the driver.

use thiserror::Error;

use crate::node::{NodeId, NodeKind};

/// Failures of the geometric primitives.
///
/// Callers are expected to screen inputs (non-degenerate walls, crossing
/// segments) before reaching these; they surface programming mistakes rather
/// than ordinary collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The `(a, b)` part of a line's general form is zero.
    #[error("line normal has zero length")]
    ZeroNormal,
    /// Intersection requested for parallel or collinear lines.
    #[error("lines are parallel; no unique intersection point")]
    ParallelLines,
}

#[derive(Debug, Error)]
pub enum StynkerError {
    /// Rejected at construction time; never retried.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("node {id} is {kind:?}; only input and output nodes can be (de)activated")]
    InvalidOperation { id: NodeId, kind: NodeKind },

    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, StynkerError>;

impl StynkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
