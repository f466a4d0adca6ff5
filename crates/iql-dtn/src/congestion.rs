//! Congestion estimation and AIMD quota control
//!
//! Each node keeps a smoothed congestion value (CV) built from the ratio of
//! drops to drops plus replications observed since the last contact ended.
//! The CV is only updated at link-down, using the counters of both
//! endpoints, and each update moves the per-link transfer limit:
//!
//! - CV did not rise: `limit += additive_increase`
//! - CV rose: `limit = ceil(limit * multiplicative_decrease)`

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use iql_core::SimTime;

/// Configuration for congestion control
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CongestionConfig {
    /// Weight of the newest ratio in the smoothed CV
    pub alpha: f64,
    /// Limit increase when congestion did not grow
    pub additive_increase: u32,
    /// Limit scale factor when congestion grew
    pub multiplicative_decrease: f64,
    /// Transfer limit before the first contact ends
    pub initial_limit: u32,
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            alpha: 0.9,
            additive_increase: 1,
            multiplicative_decrease: 0.2,
            initial_limit: 1,
        }
    }
}

/// Counter snapshot one endpoint hands the other at link-down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CongestionTelemetry {
    /// Messages evicted to make room
    pub drops: u64,
    /// Messages received from peers
    pub replications: u64,
}

/// What the peer reported at link-down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerTelemetry {
    /// Peer counters were read
    Reported(CongestionTelemetry),
    /// Exchange failed; the update assumes full congestion
    Unavailable,
}

impl From<CongestionTelemetry> for PeerTelemetry {
    fn from(telemetry: CongestionTelemetry) -> Self {
        PeerTelemetry::Reported(telemetry)
    }
}

/// One entry of the CV history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvSample {
    /// CV in effect before the update
    pub cv: f64,
    /// When the update happened
    pub at: SimTime,
}

/// Result of one link-down update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CongestionUpdate {
    /// Combined drops of both endpoints
    pub drops: u64,
    /// Combined replications of both endpoints, plus relay hops in our buffer
    pub replications: u64,
    /// Raw drop ratio for this contact
    pub ratio: f64,
    /// CV before the update
    pub previous_cv: f64,
    /// CV after the update
    pub cv: f64,
    /// Limit before the update
    pub previous_limit: u32,
    /// Limit after the update
    pub limit: u32,
}

/// Relay hops carried by buffered copies
///
/// Takes the hop counts of the buffer and sums `hop_count - 1` over messages
/// that have left their source.
pub fn extra_replications(hop_counts: impl IntoIterator<Item = u32>) -> u64 {
    hop_counts
        .into_iter()
        .filter(|hops| *hops > 0)
        .map(|hops| u64::from(hops - 1))
        .sum()
}

/// Per-node congestion state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionEstimator {
    config: CongestionConfig,
    cv: f64,
    limit: u32,
    drops: u64,
    replications: u64,
    history: Vec<CvSample>,
}

impl CongestionEstimator {
    /// Create an estimator with CV 0 and the configured initial limit
    pub fn new(config: CongestionConfig) -> Self {
        Self {
            cv: 0.0,
            limit: config.initial_limit,
            drops: 0,
            replications: 0,
            history: Vec::new(),
            config,
        }
    }

    /// Count one eviction
    pub fn record_drop(&mut self) {
        self.drops += 1;
    }

    /// Count one received message
    pub fn record_replication(&mut self) {
        self.replications += 1;
    }

    /// Counters to hand a peer at link-down
    pub fn telemetry(&self) -> CongestionTelemetry {
        CongestionTelemetry {
            drops: self.drops,
            replications: self.replications,
        }
    }

    /// Fold one finished contact into the CV and adjust the limit
    ///
    /// `extra_replications` is the relay-hop total of the local buffer (see
    /// [`extra_replications`]). Local counters are reset even when the peer
    /// telemetry is unavailable.
    pub fn on_link_down(
        &mut self,
        now: SimTime,
        peer: PeerTelemetry,
        extra_replications: u64,
    ) -> CongestionUpdate {
        let own = self.telemetry();
        self.drops = 0;
        self.replications = 0;

        let (drops, replications, ratio) = match peer {
            PeerTelemetry::Reported(peer) => {
                let drops = own.drops + peer.drops;
                let replications = own.replications + peer.replications + extra_replications;
                let total = drops + replications;
                let ratio = if total == 0 {
                    1.0
                } else {
                    drops as f64 / total as f64
                };
                (drops, replications, ratio)
            }
            PeerTelemetry::Unavailable => {
                warn!("Peer telemetry unavailable, assuming full congestion");
                (own.drops, own.replications + extra_replications, 1.0)
            }
        };

        let previous_cv = self.cv;
        let cv = self.config.alpha * ratio + (1.0 - self.config.alpha) * previous_cv;

        self.history.push(CvSample {
            cv: previous_cv,
            at: now,
        });

        let previous_limit = self.limit;
        self.limit = if cv <= previous_cv {
            previous_limit.saturating_add(self.config.additive_increase)
        } else {
            (f64::from(previous_limit) * self.config.multiplicative_decrease).ceil() as u32
        };
        self.cv = cv;

        debug!(
            drops,
            replications,
            ratio,
            previous_cv,
            cv,
            previous_limit,
            limit = self.limit,
            "Congestion updated"
        );

        CongestionUpdate {
            drops,
            replications,
            ratio,
            previous_cv,
            cv,
            previous_limit,
            limit: self.limit,
        }
    }

    /// Current congestion value
    pub fn cv(&self) -> f64 {
        self.cv
    }

    /// Permits granted to the next link that comes up
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// CV before each past update, with its time
    pub fn history(&self) -> &[CvSample] {
        &self.history
    }

    /// Drops since the last link-down
    pub fn drop_count(&self) -> u64 {
        self.drops
    }

    /// Replications since the last link-down
    pub fn replication_count(&self) -> u64 {
        self.replications
    }

    /// The configuration in use
    pub fn config(&self) -> &CongestionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iql_core::{DtnMessage, Message, SimNodeId};

    fn quiet_peer() -> PeerTelemetry {
        CongestionTelemetry::default().into()
    }

    #[test]
    fn test_initial_state() {
        let est = CongestionEstimator::new(CongestionConfig::default());
        assert_eq!(est.cv(), 0.0);
        assert_eq!(est.limit(), 1);
        assert!(est.history().is_empty());
    }

    #[test]
    fn test_half_ratio() {
        let mut est = CongestionEstimator::new(CongestionConfig::default());
        for _ in 0..5 {
            est.record_drop();
            est.record_replication();
        }
        let update = est.on_link_down(SimTime(10.0), quiet_peer(), 0);
        assert_eq!(update.ratio, 0.5);
        assert!((update.cv - 0.45).abs() < 1e-12);
        assert_eq!(est.drop_count(), 0);
        assert_eq!(est.replication_count(), 0);
    }

    #[test]
    fn test_empty_contact_counts_as_congested() {
        let mut est = CongestionEstimator::new(CongestionConfig::default());
        let update = est.on_link_down(SimTime(1.0), quiet_peer(), 0);
        assert_eq!(update.ratio, 1.0);
        assert!((est.cv() - 0.9).abs() < 1e-12);
        // CV rose: ceil(1 * 0.2) == 1
        assert_eq!(est.limit(), 1);
    }

    #[test]
    fn test_history_records_previous_cv() {
        let mut est = CongestionEstimator::new(CongestionConfig::default());
        est.on_link_down(SimTime(1.0), quiet_peer(), 0);
        est.record_replication();
        est.on_link_down(SimTime(2.0), quiet_peer(), 0);

        let history = est.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], CvSample { cv: 0.0, at: SimTime(1.0) });
        assert!((history[1].cv - 0.9).abs() < 1e-12);
        assert_eq!(history[1].at, SimTime(2.0));
    }

    #[test]
    fn test_additive_increase_without_drops() {
        let mut est = CongestionEstimator::new(CongestionConfig::default());
        for round in 0..10u32 {
            est.record_replication();
            let update = est.on_link_down(SimTime(round as f64), quiet_peer(), 0);
            assert_eq!(update.ratio, 0.0);
            assert_eq!(update.limit, update.previous_limit + 1);
        }
        assert_eq!(est.limit(), 11);
    }

    #[test]
    fn test_multiplicative_decrease() {
        let config = CongestionConfig {
            initial_limit: 12,
            ..Default::default()
        };
        let mut est = CongestionEstimator::new(config);
        est.record_drop();
        let update = est.on_link_down(SimTime(3.0), quiet_peer(), 0);
        assert!(update.cv > update.previous_cv);
        // ceil(12 * 0.2) == 3
        assert_eq!(est.limit(), 3);
    }

    #[test]
    fn test_peer_counters_and_extra_hops() {
        let mut est = CongestionEstimator::new(CongestionConfig::default());
        est.record_drop();
        let peer = CongestionTelemetry {
            drops: 1,
            replications: 3,
        };
        let update = est.on_link_down(SimTime(5.0), peer.into(), 4);
        assert_eq!(update.drops, 2);
        assert_eq!(update.replications, 7);
        assert!((update.ratio - 2.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_unavailable_peer_forces_full_ratio() {
        let mut est = CongestionEstimator::new(CongestionConfig::default());
        for _ in 0..8 {
            est.record_replication();
        }
        let update = est.on_link_down(SimTime(1.0), PeerTelemetry::Unavailable, 0);
        assert_eq!(update.ratio, 1.0);
        assert_eq!(est.replication_count(), 0);
    }

    #[test]
    fn test_extra_replications_from_buffer() {
        let a = SimNodeId(0);
        let b = SimNodeId(1);
        let fresh = Message::new("m0", a, b, 10, SimTime(100.0), SimTime::ZERO);
        let one_hop = fresh.relayed(SimTime(1.0));
        let three_hops = one_hop.relayed(SimTime(2.0)).relayed(SimTime(3.0));

        let buffer = [fresh, one_hop, three_hops];
        assert_eq!(extra_replications(buffer.iter().map(|m| m.hop_count())), 2);
    }
}
