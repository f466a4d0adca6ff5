//! Scenario errors

use iql_core::SimNodeId;
use thiserror::Error;

/// Errors raised while loading or validating a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scenario JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("node {node} is outside the {nodes}-node network")]
    UnknownNode { node: SimNodeId, nodes: u32 },

    #[error("contact at {at}s connects node {node} to itself")]
    SelfContact { node: SimNodeId, at: f64 },

    #[error("message {0} is addressed to its own source")]
    SelfAddressed(String),

    #[error("duplicate message id: {0}")]
    DuplicateMessage(String),

    #[error("random scenario needs at least 2 nodes, got {0}")]
    TooFewNodes(u32),
}

/// Result type for scenario operations
pub type ScenarioResult<T> = Result<T, ScenarioError>;
