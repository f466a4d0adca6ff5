//! # IQL Learning
//!
//! Reinforcement-learning decision engine for IQL routing.
//!
//! Provides a tabular Q-learning learner over a fixed set of states and
//! actions, with the exploration strategy chosen at construction:
//!
//! - [`BoltzmannExploration`]: softmax over estimates with a temperature
//! - [`EpsilonGreedyExploration`]: uniform exploration with probability epsilon
//! - [`GreedyExploration`]: pure exploitation
//!
//! Any [`ExplorationPolicy`] (including `Box<dyn ExplorationPolicy>`) can be
//! plugged into [`QLearning`].

pub mod error;
pub mod exploration;
pub mod qlearning;

use serde::{Deserialize, Serialize};

pub use error::{LearningError, LearningResult};
pub use exploration::{
    BoltzmannExploration, EpsilonGreedyExploration, ExplorationPolicy, GreedyExploration,
    greedy_action,
};
pub use qlearning::{QInit, QLearning};

/// Learning hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Initial learning rate, in `[0, 1]`
    pub learning_rate: f64,
    /// Discount applied to future value, in `[0, 1]`
    pub discount_factor: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.25,
            discount_factor: 0.2,
        }
    }
}

impl LearningConfig {
    /// Create a config; both values are clamped to `[0, 1]`
    pub fn new(learning_rate: f64, discount_factor: f64) -> Self {
        Self {
            learning_rate,
            discount_factor,
        }
        .clamped()
    }

    /// Copy with both values clamped to `[0, 1]`
    pub fn clamped(self) -> Self {
        Self {
            learning_rate: self.learning_rate.clamp(0.0, 1.0),
            discount_factor: self.discount_factor.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LearningConfig::default();
        assert_eq!(config.learning_rate, 0.25);
        assert_eq!(config.discount_factor, 0.2);
    }

    #[test]
    fn test_config_clamps() {
        let config = LearningConfig::new(1.5, -0.1);
        assert_eq!(config.learning_rate, 1.0);
        assert_eq!(config.discount_factor, 0.0);
    }

    #[test]
    fn test_config_partial_json() {
        let config: LearningConfig = serde_json::from_str(r#"{"discount_factor": 0.9}"#).unwrap();
        assert_eq!(config.learning_rate, 0.25);
        assert_eq!(config.discount_factor, 0.9);
    }
}
