//! Exploration policies
//!
//! An exploration policy turns a row of action-value estimates into a single
//! action, trading off exploitation of the best-known action against trying
//! others. Every policy only ever returns an action marked feasible.
//!
//! - [`BoltzmannExploration`]: softmax over estimates scaled by a temperature
//! - [`EpsilonGreedyExploration`]: random feasible action with probability epsilon
//! - [`GreedyExploration`]: always the best feasible action

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{LearningError, LearningResult};

/// Chooses one action from per-action estimates
pub trait ExplorationPolicy {
    /// Choose an action index
    ///
    /// `estimates` and `feasible` have one entry per action. At least one
    /// action must be feasible.
    fn choose_action(&mut self, estimates: &[f64], feasible: &[bool]) -> LearningResult<usize>;
}

impl<P: ExplorationPolicy + ?Sized> ExplorationPolicy for Box<P> {
    fn choose_action(&mut self, estimates: &[f64], feasible: &[bool]) -> LearningResult<usize> {
        (**self).choose_action(estimates, feasible)
    }
}

fn check_inputs(estimates: &[f64], feasible: &[bool]) -> LearningResult<()> {
    if estimates.len() != feasible.len() {
        return Err(LearningError::DimensionMismatch {
            what: "feasibility row",
            expected: estimates.len(),
            actual: feasible.len(),
        });
    }
    if !feasible.iter().any(|f| *f) {
        return Err(LearningError::InvalidState(
            "no feasible action".to_string(),
        ));
    }
    Ok(())
}

/// Feasible action with the highest estimate, first one on ties
pub fn greedy_action(estimates: &[f64], feasible: &[bool]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, estimate) in estimates.iter().enumerate() {
        if !feasible.get(i).copied().unwrap_or(false) {
            continue;
        }
        match best {
            Some(b) if estimates[b] >= *estimate => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Boltzmann (softmax) exploration
///
/// Each action gets weight `exp(estimate / temperature)`. The normalizer
/// sums over every action, feasible or not, and the draw scans feasible
/// actions in index order; if rounding leaves the draw above the last
/// cumulative value, the last feasible action is returned. A temperature of
/// zero, or weights that overflow, fall back to greedy selection.
#[derive(Debug, Clone)]
pub struct BoltzmannExploration<R = StdRng> {
    temperature: f64,
    rng: R,
}

impl BoltzmannExploration<StdRng> {
    /// Create a policy seeded from the operating system
    pub fn new(temperature: f64) -> Self {
        Self::with_rng(temperature, StdRng::from_os_rng())
    }

    /// Create a reproducible policy
    pub fn with_seed(temperature: f64, seed: u64) -> Self {
        Self::with_rng(temperature, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> BoltzmannExploration<R> {
    /// Create a policy drawing from the given generator
    ///
    /// Negative temperatures are treated as zero.
    pub fn with_rng(temperature: f64, rng: R) -> Self {
        Self {
            temperature: temperature.max(0.0),
            rng,
        }
    }

    /// Current temperature; lower is greedier
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Set the balance between exploration and greedy choice
    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature.max(0.0);
    }
}

impl<R: Rng> ExplorationPolicy for BoltzmannExploration<R> {
    fn choose_action(&mut self, estimates: &[f64], feasible: &[bool]) -> LearningResult<usize> {
        check_inputs(estimates, feasible)?;

        let no_feasible = || LearningError::InvalidState("no feasible action".to_string());

        if self.temperature == 0.0 {
            return greedy_action(estimates, feasible).ok_or_else(no_feasible);
        }

        let weights: Vec<f64> = estimates
            .iter()
            .map(|e| (e / self.temperature).exp())
            .collect();
        let total: f64 = weights.iter().sum();

        if total.is_infinite() {
            tracing::trace!(temperature = self.temperature, "Softmax overflow, choosing greedily");
            return greedy_action(estimates, feasible).ok_or_else(no_feasible);
        }

        let draw: f64 = self.rng.random();
        let mut cumulative = 0.0;
        let mut last_feasible = None;
        for (i, weight) in weights.iter().enumerate() {
            if !feasible[i] {
                continue;
            }
            cumulative += weight / total;
            last_feasible = Some(i);
            if draw <= cumulative {
                return Ok(i);
            }
        }

        last_feasible.ok_or_else(no_feasible)
    }
}

/// Epsilon-greedy exploration
#[derive(Debug, Clone)]
pub struct EpsilonGreedyExploration<R = StdRng> {
    epsilon: f64,
    rng: R,
}

impl EpsilonGreedyExploration<StdRng> {
    /// Create a policy seeded from the operating system
    pub fn new(epsilon: f64) -> Self {
        Self::with_rng(epsilon, StdRng::from_os_rng())
    }

    /// Create a reproducible policy
    pub fn with_seed(epsilon: f64, seed: u64) -> Self {
        Self::with_rng(epsilon, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> EpsilonGreedyExploration<R> {
    /// Create a policy drawing from the given generator; epsilon is clamped to `[0, 1]`
    pub fn with_rng(epsilon: f64, rng: R) -> Self {
        Self {
            epsilon: epsilon.clamp(0.0, 1.0),
            rng,
        }
    }

    /// Probability of choosing a random feasible action
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Set the exploration probability
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }
}

impl<R: Rng> ExplorationPolicy for EpsilonGreedyExploration<R> {
    fn choose_action(&mut self, estimates: &[f64], feasible: &[bool]) -> LearningResult<usize> {
        check_inputs(estimates, feasible)?;

        if self.epsilon > 0.0 && self.rng.random::<f64>() < self.epsilon {
            let candidates: Vec<usize> = (0..feasible.len()).filter(|i| feasible[*i]).collect();
            let pick = self.rng.random_range(0..candidates.len());
            return Ok(candidates[pick]);
        }

        greedy_action(estimates, feasible)
            .ok_or_else(|| LearningError::InvalidState("no feasible action".to_string()))
    }
}

/// Pure exploitation
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyExploration;

impl ExplorationPolicy for GreedyExploration {
    fn choose_action(&mut self, estimates: &[f64], feasible: &[bool]) -> LearningResult<usize> {
        check_inputs(estimates, feasible)?;
        greedy_action(estimates, feasible)
            .ok_or_else(|| LearningError::InvalidState("no feasible action".to_string()))
    }
}
