//! # IQL Simulation
//!
//! Replays contact plans against congestion-aware epidemic routing.
//!
//! A [`Scenario`] lists when pairs of nodes meet and where messages appear.
//! A [`World`] plays it in fixed time steps: every node runs its own
//! [`EpidemicRouter`](iql_dtn::EpidemicRouter) (or the flooding baseline) on
//! an in-memory host, links move bytes at the scenario bandwidth, and the
//! run ends with a [`Report`] of delivery, overhead and congestion figures.
//!
//! ## Example
//!
//! ```rust
//! use iql_simulation::{PolicyKind, RandomScenario, World};
//!
//! let scenario = RandomScenario {
//!     nodes: 6,
//!     contacts: 40,
//!     messages: 10,
//!     duration: 600.0,
//!     ..Default::default()
//! }
//! .generate()
//! .unwrap();
//!
//! let report = World::new(scenario, PolicyKind::Adaptive).unwrap().run();
//! assert_eq!(report.stats.created, 10);
//! assert!(report.delivery_ratio <= 1.0);
//! ```
//!
//! ## Architecture
//!
//! - **Scenario** (`scenario.rs`): JSON contact plans and random generation
//! - **World** (`world.rs`): the discrete-time engine
//! - **Report** (`report.rs`): run statistics

pub mod error;
pub mod report;
pub mod scenario;
pub mod world;

pub use error::{ScenarioError, ScenarioResult};
pub use report::{NodeReport, Report, RunStats};
pub use scenario::{ContactEvent, ContactKind, MessageSpec, RandomScenario, Scenario};
pub use world::{PolicyKind, World};
