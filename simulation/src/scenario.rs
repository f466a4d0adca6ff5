//! Scenario definitions
//!
//! A scenario is a contact plan plus a message workload: which pairs of
//! nodes are in range when, and which messages appear where. It is plain
//! JSON so runs can be reproduced and shared.
//!
//! ```json
//! {
//!   "name": "relay",
//!   "nodes": 3,
//!   "buffer_capacity": 5000,
//!   "bandwidth": 1000.0,
//!   "duration": 60.0,
//!   "contacts": [
//!     { "at": 0.0, "a": 0, "b": 1, "kind": "up" },
//!     { "at": 10.0, "a": 0, "b": 1, "kind": "down" }
//!   ],
//!   "messages": [
//!     { "id": "M1", "at": 0.0, "source": 0, "destination": 2, "size": 1000, "ttl": 600.0 }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use iql_core::SimNodeId;
use iql_dtn::{ConfigWarning, DtnConfig};

use crate::error::{ScenarioError, ScenarioResult};

/// A contact plan and message workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Label carried into the report
    #[serde(default)]
    pub name: String,
    /// Number of nodes, identified `0..nodes`
    pub nodes: u32,
    /// Buffer size of every node in bytes
    pub buffer_capacity: usize,
    /// Link bandwidth in bytes per second
    pub bandwidth: f64,
    /// Simulated time in seconds
    pub duration: f64,
    /// Clock resolution in seconds
    #[serde(default = "default_step")]
    pub step: f64,
    /// Link-up and link-down events
    #[serde(default)]
    pub contacts: Vec<ContactEvent>,
    /// Message creations
    #[serde(default)]
    pub messages: Vec<MessageSpec>,
    /// Router configuration used by every node
    #[serde(default)]
    pub dtn: DtnConfig,
}

fn default_step() -> f64 {
    1.0
}

/// Whether a contact starts or ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Up,
    Down,
}

/// Two nodes coming into or going out of range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactEvent {
    /// Time of the event in seconds
    pub at: f64,
    pub a: SimNodeId,
    pub b: SimNodeId,
    pub kind: ContactKind,
}

/// A message appearing at its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSpec {
    pub id: String,
    /// Creation time in seconds
    pub at: f64,
    pub source: SimNodeId,
    pub destination: SimNodeId,
    /// Size in bytes
    pub size: usize,
    /// Lifetime in seconds
    pub ttl: f64,
}

impl Scenario {
    /// Parse and validate a scenario
    pub fn from_json(json: &str) -> ScenarioResult<Self> {
        let scenario: Scenario = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load and validate a scenario file
    pub fn load(path: impl AsRef<Path>) -> ScenarioResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> ScenarioResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every event refers to a real node and makes sense
    pub fn validate(&self) -> ScenarioResult<()> {
        positive("nodes", self.nodes as f64)?;
        positive("buffer_capacity", self.buffer_capacity as f64)?;
        positive("bandwidth", self.bandwidth)?;
        positive("step", self.step)?;
        if !(self.duration >= 0.0) {
            return Err(ScenarioError::NotPositive {
                field: "duration",
                value: self.duration,
            });
        }

        for contact in &self.contacts {
            self.check_node(contact.a)?;
            self.check_node(contact.b)?;
            if contact.a == contact.b {
                return Err(ScenarioError::SelfContact {
                    node: contact.a,
                    at: contact.at,
                });
            }
        }

        let mut ids = HashSet::new();
        for message in &self.messages {
            self.check_node(message.source)?;
            self.check_node(message.destination)?;
            if message.source == message.destination {
                return Err(ScenarioError::SelfAddressed(message.id.clone()));
            }
            if !ids.insert(message.id.as_str()) {
                return Err(ScenarioError::DuplicateMessage(message.id.clone()));
            }
        }

        Ok(())
    }

    /// Check the routing tunables, logging a warning for each issue
    ///
    /// Questionable tunables still run; they are reported, not rejected.
    pub fn config_warnings(&self) -> Vec<ConfigWarning> {
        let warnings = self.dtn.validate();
        for warning in &warnings {
            warn!(scenario = %self.name, %warning, "Questionable routing config");
        }
        warnings
    }

    fn check_node(&self, node: SimNodeId) -> ScenarioResult<()> {
        if node.index() < self.nodes {
            Ok(())
        } else {
            Err(ScenarioError::UnknownNode {
                node,
                nodes: self.nodes,
            })
        }
    }
}

fn positive(field: &'static str, value: f64) -> ScenarioResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ScenarioError::NotPositive { field, value })
    }
}

/// Parameters for a randomly generated scenario
///
/// Defaults follow common DTN evaluation settings: 250 kB/s links,
/// 500 kB to 1 MB messages and 5 MB buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomScenario {
    pub nodes: u32,
    pub contacts: usize,
    pub messages: usize,
    pub seed: u64,
    pub duration: f64,
    pub step: f64,
    pub buffer_capacity: usize,
    pub bandwidth: f64,
    /// Inclusive bounds on contact length in seconds
    pub contact_duration: (f64, f64),
    /// Inclusive bounds on message size in bytes
    pub message_size: (usize, usize),
    pub ttl: f64,
    pub dtn: DtnConfig,
}

impl Default for RandomScenario {
    fn default() -> Self {
        Self {
            nodes: 20,
            contacts: 400,
            messages: 100,
            seed: 42,
            duration: 3600.0,
            step: 1.0,
            buffer_capacity: 5_000_000,
            bandwidth: 250_000.0,
            contact_duration: (10.0, 120.0),
            message_size: (500_000, 1_000_000),
            ttl: 1800.0,
            dtn: DtnConfig::default(),
        }
    }
}

impl RandomScenario {
    /// Generate the scenario
    ///
    /// The same parameters always produce the same scenario. Event times
    /// fall on the step grid, and overlapping contacts between the same pair
    /// are merged into one.
    pub fn generate(&self) -> ScenarioResult<Scenario> {
        if self.nodes < 2 {
            return Err(ScenarioError::TooFewNodes(self.nodes));
        }
        positive("duration", self.duration)?;
        positive("step", self.step)?;
        let on_grid = |t: f64| (t / self.step).floor() * self.step;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let (min_len, max_len) = ordered(self.contact_duration.0, self.contact_duration.1);
        let (min_size, max_size) = ordered(self.message_size.0, self.message_size.1);

        let mut windows: BTreeMap<(SimNodeId, SimNodeId), Vec<(f64, f64)>> = BTreeMap::new();
        for _ in 0..self.contacts {
            let (a, b) = self.random_pair(&mut rng);
            let start = rng.random_range(0.0..self.duration);
            let length = if min_len < max_len {
                rng.random_range(min_len..=max_len)
            } else {
                min_len
            };
            let end = (start + length).min(self.duration);
            windows
                .entry((a, b))
                .or_default()
                .push((on_grid(start), on_grid(end)));
        }

        let mut contacts = Vec::new();
        for ((a, b), mut spans) in windows {
            spans.sort_by(|x, y| x.0.total_cmp(&y.0));
            let mut merged: Vec<(f64, f64)> = Vec::new();
            for (start, end) in spans {
                match merged.last_mut() {
                    Some(last) if start <= last.1 => last.1 = last.1.max(end),
                    _ => merged.push((start, end)),
                }
            }
            for (start, end) in merged {
                contacts.push(ContactEvent {
                    at: start,
                    a,
                    b,
                    kind: ContactKind::Up,
                });
                contacts.push(ContactEvent {
                    at: end,
                    a,
                    b,
                    kind: ContactKind::Down,
                });
            }
        }
        contacts.sort_by(|x, y| x.at.total_cmp(&y.at));

        let mut messages: Vec<MessageSpec> = (0..self.messages)
            .map(|i| {
                let (source, destination) = self.random_pair(&mut rng);
                let (source, destination) = if rng.random::<bool>() {
                    (source, destination)
                } else {
                    (destination, source)
                };
                MessageSpec {
                    id: format!("M{}", i),
                    at: on_grid(rng.random_range(0.0..self.duration)),
                    source,
                    destination,
                    size: rng.random_range(min_size..=max_size),
                    ttl: self.ttl,
                }
            })
            .collect();
        messages.sort_by(|x, y| x.at.total_cmp(&y.at));

        let scenario = Scenario {
            name: format!("random-{}", self.seed),
            nodes: self.nodes,
            buffer_capacity: self.buffer_capacity,
            bandwidth: self.bandwidth,
            duration: self.duration,
            step: self.step,
            contacts,
            messages,
            dtn: self.dtn,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// Two distinct nodes, lower index first
    fn random_pair(&self, rng: &mut StdRng) -> (SimNodeId, SimNodeId) {
        let a = rng.random_range(0..self.nodes);
        let mut b = rng.random_range(0..self.nodes - 1);
        if b >= a {
            b += 1;
        }
        (SimNodeId::new(a.min(b)), SimNodeId::new(a.max(b)))
    }
}

fn ordered<T: PartialOrd>(x: T, y: T) -> (T, T) {
    if x <= y { (x, y) } else { (y, x) }
}
