//! Run statistics

use std::fmt;

use serde::{Deserialize, Serialize};

use iql_core::SimNodeId;
use iql_dtn::CvSample;

use crate::world::PolicyKind;

/// Counters accumulated while a world runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Messages created at their source
    pub created: u64,
    /// Creations that found no room at the source
    pub rejected_at_source: u64,
    /// Distinct messages that reached their destination
    pub delivered: u64,
    /// Transfers started
    pub started: u64,
    /// Transfers completed and accepted by the receiver, deliveries included
    pub relayed: u64,
    /// Completed transfers the receiver had no room for
    pub rejected: u64,
    /// Transfers cut short by link-down or deletion
    pub aborted: u64,
    /// Copies removed because a receipt showed them delivered
    pub purged: u64,
    /// Copies removed after their TTL
    pub expired: u64,
    /// Sum of delivery latencies in seconds
    pub latency_sum: f64,
    /// Sum of hop counts of first deliveries
    pub hop_sum: u64,
}

/// Final state of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node: SimNodeId,
    /// Messages still buffered at the end
    pub buffered: usize,
    /// Messages evicted to make room
    pub dropped: usize,
    /// Congestion value, adaptive policy only
    pub cv: Option<f64>,
    /// Transfer limit, adaptive policy only
    pub limit: Option<u32>,
    /// CV after every link-down
    pub cv_history: Vec<CvSample>,
}

/// Summary of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub scenario: String,
    pub policy: PolicyKind,
    /// Simulated time in seconds
    pub duration: f64,
    pub stats: RunStats,
    /// Delivered over created
    pub delivery_ratio: f64,
    /// Relays beyond the first delivery, per delivery
    pub overhead_ratio: Option<f64>,
    /// Mean creation-to-delivery time in seconds
    pub mean_latency: Option<f64>,
    /// Mean hop count of delivered messages
    pub mean_hops: Option<f64>,
    /// Total evictions across all nodes
    pub dropped: u64,
    pub nodes: Vec<NodeReport>,
}

impl Report {
    /// Derive ratios from raw counters
    pub fn new(
        scenario: String,
        policy: PolicyKind,
        duration: f64,
        stats: RunStats,
        nodes: Vec<NodeReport>,
    ) -> Self {
        let delivery_ratio = if stats.created == 0 {
            0.0
        } else {
            stats.delivered as f64 / stats.created as f64
        };

        let (overhead_ratio, mean_latency, mean_hops) = if stats.delivered == 0 {
            (None, None, None)
        } else {
            let delivered = stats.delivered as f64;
            (
                Some((stats.relayed as f64 - delivered) / delivered),
                Some(stats.latency_sum / delivered),
                Some(stats.hop_sum as f64 / delivered),
            )
        };

        let dropped = nodes.iter().map(|n| n.dropped as u64).sum();

        Self {
            scenario,
            policy,
            duration,
            stats,
            delivery_ratio,
            overhead_ratio,
            mean_latency,
            mean_hops,
            dropped,
            nodes,
        }
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== {} ({}, {:.0}s) ===",
            self.scenario, self.policy, self.duration
        )?;
        writeln!(
            f,
            "created {:>6}  delivered {:>6}  ratio    {:.3}",
            self.stats.created, self.stats.delivered, self.delivery_ratio
        )?;
        writeln!(
            f,
            "started {:>6}  relayed   {:>6}  overhead {}",
            self.stats.started,
            self.stats.relayed,
            optional(self.overhead_ratio)
        )?;
        writeln!(
            f,
            "dropped {:>6}  aborted   {:>6}  purged   {}  expired {}",
            self.dropped, self.stats.aborted, self.stats.purged, self.stats.expired
        )?;
        writeln!(
            f,
            "latency {}s  hops {}",
            optional(self.mean_latency),
            optional(self.mean_hops)
        )?;

        if self.nodes.iter().any(|n| n.cv.is_some()) {
            writeln!(f, "node       cv  limit  drops  buffered")?;
            for node in &self.nodes {
                writeln!(
                    f,
                    "{:<5} {:>7}  {:>5}  {:>5}  {:>8}",
                    node.node.to_string(),
                    optional(node.cv),
                    node.limit.map_or_else(|| "-".to_string(), |l| l.to_string()),
                    node.dropped,
                    node.buffered
                )?;
            }
        }
        Ok(())
    }
}
