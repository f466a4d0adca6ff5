//! Learning performance benchmarks
//!
//! Benchmarks for the decision engine hot paths:
//! - Exploration policy selection
//! - Q-table action selection and update
//!
//! Run with: cargo bench -p iql-learning

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use iql_learning::{
    BoltzmannExploration, EpsilonGreedyExploration, ExplorationPolicy, GreedyExploration,
    LearningConfig, QInit, QLearning,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn estimates(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i as f64 * 0.37).sin()).collect()
}

fn half_mask(n: usize) -> Vec<bool> {
    (0..n).map(|i| i % 2 == 0).collect()
}

// ============================================================================
// Exploration Benchmarks
// ============================================================================

fn bench_exploration(c: &mut Criterion) {
    let mut group = c.benchmark_group("exploration");

    for actions in [8usize, 64, 512] {
        let values = estimates(actions);
        let feasible = half_mask(actions);

        let mut boltzmann = BoltzmannExploration::with_seed(0.5, 1);
        group.bench_function(format!("boltzmann_{}_actions", actions), |b| {
            b.iter(|| boltzmann.choose_action(black_box(&values), black_box(&feasible)))
        });

        let mut epsilon = EpsilonGreedyExploration::with_seed(0.1, 1);
        group.bench_function(format!("epsilon_greedy_{}_actions", actions), |b| {
            b.iter(|| epsilon.choose_action(black_box(&values), black_box(&feasible)))
        });

        let mut greedy = GreedyExploration;
        group.bench_function(format!("greedy_{}_actions", actions), |b| {
            b.iter(|| greedy.choose_action(black_box(&values), black_box(&feasible)))
        });
    }

    group.finish();
}

// ============================================================================
// Q-table Benchmarks
// ============================================================================

fn bench_qlearning(c: &mut Criterion) {
    let mut group = c.benchmark_group("qlearning");

    let states = 256;
    let actions = 16;
    let mut q = match QLearning::new(
        states,
        actions,
        BoltzmannExploration::with_seed(0.5, 7),
        vec![vec![true; actions]; states],
        QInit::Random { seed: Some(7) },
        LearningConfig::default(),
    ) {
        Ok(q) => q,
        Err(e) => panic!("failed to build table: {}", e),
    };

    group.bench_function("select_and_update", |b| {
        let mut state = 0usize;
        b.iter(|| {
            let action = q.select_action(state).unwrap_or(0);
            let next = (state * 31 + action) % states;
            q.update(state, action, black_box(0.5), next);
            state = next;
        })
    });

    group.bench_function("best_action", |b| {
        b.iter(|| q.best_action(black_box(42)))
    });

    group.finish();
}

criterion_group!(benches, bench_exploration, bench_qlearning);

criterion_main!(benches);
