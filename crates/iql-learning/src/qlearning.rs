//! Tabular Q-learning
//!
//! A [`QLearning`] instance owns a dense `states × actions` value table, an
//! equally shaped visit-count table and an immutable feasibility mask. Action
//! selection is delegated to an [`ExplorationPolicy`]; updates use a
//! visit-decayed learning rate.
//!
//! # Example
//!
//! ```
//! use iql_learning::{GreedyExploration, LearningConfig, QInit, QLearning};
//!
//! let feasible = vec![vec![true, true], vec![true, false]];
//! let mut q = QLearning::new(
//!     2,
//!     2,
//!     GreedyExploration,
//!     feasible,
//!     QInit::Zeros,
//!     LearningConfig::default(),
//! )
//! .unwrap();
//!
//! let action = q.select_action(0).unwrap();
//! q.update(0, action, 1.0, 1);
//! assert!(q.q_value(0, action) > 0.0);
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::LearningConfig;
use crate::error::{LearningError, LearningResult};
use crate::exploration::{ExplorationPolicy, greedy_action};

/// Initial contents of the value table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QInit {
    /// Every entry is zero
    Zeros,
    /// Every entry is uniform in `[0, 0.1)`; `None` seeds from the OS
    Random { seed: Option<u64> },
    /// Caller-supplied rows, one per state
    Pretrained(Vec<Vec<f64>>),
}

/// Q-learning table with a pluggable exploration policy
#[derive(Debug, Clone)]
pub struct QLearning<P> {
    states: usize,
    actions: usize,
    /// Row-major values
    q: Vec<f64>,
    /// Row-major visit counts
    visits: Vec<u64>,
    /// Row-major feasibility mask
    feasible: Vec<bool>,
    policy: P,
    learning_rate: f64,
    discount_factor: f64,
}

impl<P: ExplorationPolicy> QLearning<P> {
    /// Build a table
    ///
    /// `feasible` must have `states` rows of `actions` entries each, as must a
    /// pre-trained table.
    pub fn new(
        states: usize,
        actions: usize,
        policy: P,
        feasible: Vec<Vec<bool>>,
        init: QInit,
        config: LearningConfig,
    ) -> LearningResult<Self> {
        let feasible = flatten("feasibility mask", feasible, states, actions)?;

        let q = match init {
            QInit::Zeros => vec![0.0; states * actions],
            QInit::Random { seed } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_os_rng(),
                };
                (0..states * actions)
                    .map(|_| rng.random::<f64>() / 10.0)
                    .collect()
            }
            QInit::Pretrained(rows) => flatten("pre-trained table", rows, states, actions)?,
        };

        let config = config.clamped();

        Ok(Self {
            states,
            actions,
            q,
            visits: vec![0; states * actions],
            feasible,
            policy,
            learning_rate: config.learning_rate,
            discount_factor: config.discount_factor,
        })
    }

    /// Choose an action for `state` and count the visit
    ///
    /// # Panics
    ///
    /// Panics if `state` is out of range.
    pub fn select_action(&mut self, state: usize) -> LearningResult<usize> {
        let row = self.row_range(state);
        let action = self
            .policy
            .choose_action(&self.q[row.clone()], &self.feasible[row])?;
        let idx = self.index(state, action);
        self.visits[idx] += 1;
        trace!(state, action, visits = self.visits[idx], "Selected action");
        Ok(action)
    }

    /// Apply one Q-learning update for the transition `prev --action--> next`
    ///
    /// The rate is `1 / (1 + visits[prev][action])` and becomes the exposed
    /// learning rate. The bootstrap term takes the maximum over every action
    /// of `next`, feasible or not.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of range.
    pub fn update(&mut self, prev: usize, action: usize, reward: f64, next: usize) {
        let idx = self.index(prev, action);
        let rate = 1.0 / (1.0 + self.visits[idx] as f64);
        self.learning_rate = rate;

        let max_next = self.q[self.row_range(next)]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        let old = self.q[idx];
        self.q[idx] = old * (1.0 - rate) + rate * (reward + self.discount_factor * max_next);
        trace!(prev, action, next, reward, rate, old, new = self.q[idx], "Q update");
    }

    /// Best feasible action for `state` by current estimates, first on ties
    pub fn best_action(&self, state: usize) -> Option<usize> {
        let row = self.row_range(state);
        greedy_action(&self.q[row.clone()], &self.feasible[row])
    }

    /// Number of states
    pub fn states(&self) -> usize {
        self.states
    }

    /// Number of actions per state
    pub fn actions(&self) -> usize {
        self.actions
    }

    /// Current estimate for one pair
    pub fn q_value(&self, state: usize, action: usize) -> f64 {
        self.q[self.index(state, action)]
    }

    /// All estimates for one state
    pub fn q_row(&self, state: usize) -> &[f64] {
        &self.q[self.row_range(state)]
    }

    /// Times `action` was selected in `state`
    pub fn visits(&self, state: usize, action: usize) -> u64 {
        self.visits[self.index(state, action)]
    }

    /// Check whether `action` may be taken in `state`
    pub fn is_feasible(&self, state: usize, action: usize) -> bool {
        self.feasible[self.index(state, action)]
    }

    /// Copy of the value table, one row per state
    ///
    /// Suitable for [`QInit::Pretrained`].
    pub fn table(&self) -> Vec<Vec<f64>> {
        if self.actions == 0 {
            return vec![Vec::new(); self.states];
        }
        self.q.chunks(self.actions).map(<[f64]>::to_vec).collect()
    }

    /// Effective learning rate
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Set the learning rate, clamped to `[0, 1]`
    ///
    /// The next update replaces it with the visit-derived rate.
    pub fn set_learning_rate(&mut self, rate: f64) {
        self.learning_rate = rate.clamp(0.0, 1.0);
    }

    /// Discount applied to the bootstrap term
    pub fn discount_factor(&self) -> f64 {
        self.discount_factor
    }

    /// Set the discount factor, clamped to `[0, 1]`
    pub fn set_discount_factor(&mut self, factor: f64) {
        self.discount_factor = factor.clamp(0.0, 1.0);
    }

    /// The exploration policy
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Mutable access to the exploration policy (e.g. to cool a temperature)
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    fn index(&self, state: usize, action: usize) -> usize {
        assert!(
            state < self.states && action < self.actions,
            "Q-table index ({}, {}) out of range for {}x{} table",
            state,
            action,
            self.states,
            self.actions
        );
        state * self.actions + action
    }

    fn row_range(&self, state: usize) -> std::ops::Range<usize> {
        assert!(
            state < self.states,
            "state {} out of range for {} states",
            state,
            self.states
        );
        state * self.actions..(state + 1) * self.actions
    }
}

fn flatten<T: Copy>(
    what: &'static str,
    rows: Vec<Vec<T>>,
    states: usize,
    actions: usize,
) -> LearningResult<Vec<T>> {
    if rows.len() != states {
        return Err(LearningError::DimensionMismatch {
            what,
            expected: states,
            actual: rows.len(),
        });
    }
    let mut flat = Vec::with_capacity(states * actions);
    for row in rows {
        if row.len() != actions {
            return Err(LearningError::DimensionMismatch {
                what,
                expected: actions,
                actual: row.len(),
            });
        }
        flat.extend(row);
    }
    Ok(flat)
}
