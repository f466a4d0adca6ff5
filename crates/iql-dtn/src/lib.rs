//! # IQL DTN
//!
//! Congestion-aware epidemic routing for delay-tolerant networks.
//!
//! Epidemic routing copies every message to every node it meets. Under load
//! this fills buffers and forces drops, so this router caps how many
//! transfers it starts per contact and adapts that cap to the congestion it
//! observes.
//!
//! ## Features
//!
//! - **Per-link quotas**: each contact gets `limit` transfer permits when it
//!   comes up.
//!
//! - **AIMD congestion control**: at every contact teardown both endpoints'
//!   drop and replication counters are folded into a smoothed congestion
//!   value; the limit grows by one while congestion does not rise and is cut
//!   back hard when it does.
//!
//! - **Delivery receipts**: destinations issue receipts that spread on every
//!   contact and purge delivered copies from buffers.
//!
//! - **Drop-oldest eviction**: incoming messages evict the oldest messages
//!   not currently being sent.
//!
//! ## Quick Start
//!
//! ```rust
//! use iql_core::{LinkId, MemoryHost, Message, SimNodeId, SimTime};
//! use iql_dtn::{DtnConfig, EpidemicRouter, ReceiptCache};
//!
//! let a = SimNodeId::from_char('A').unwrap();
//! let b = SimNodeId::from_char('B').unwrap();
//!
//! let mut host = MemoryHost::new(a, 10_000);
//! host.insert(Message::new("M1", a, b, 100, SimTime(600.0), SimTime::ZERO)).unwrap();
//! host.connect(LinkId(1), b);
//!
//! let mut router = EpidemicRouter::new(DtnConfig::default());
//! router.link_up(&mut host, LinkId(1), &ReceiptCache::new());
//!
//! let started = router.tick(&mut host).unwrap();
//! assert!(started.deliverable);
//! assert_eq!(router.permits(LinkId(1)), 0);
//! ```
//!
//! ## Architecture
//!
//! - [`congestion`]: CV estimation and AIMD limit
//! - [`quota`]: Per-link permits
//! - [`receipt`]: Delivery receipts and their exchange
//! - [`policy`]: The [`TransferPolicy`] trait, drop-oldest eviction and the
//!   flooding baseline
//! - [`scheduler`]: The per-tick transfer driver
//! - [`router`]: The adaptive epidemic router
//! - [`error`]: DTN-specific error types

pub mod congestion;
pub mod error;
pub mod policy;
pub mod quota;
pub mod receipt;
pub mod router;
pub mod scheduler;

// Re-export main types
pub use congestion::{
    CongestionConfig, CongestionEstimator, CongestionTelemetry, CongestionUpdate, CvSample,
    PeerTelemetry, extra_replications,
};
pub use error::{BufferError, DtnError, DtnResult};
pub use policy::{FloodPolicy, TransferPolicy, evict_oldest};
pub use quota::LinkQuotas;
pub use receipt::{Receipt, ReceiptCache};
pub use router::{EpidemicRouter, RouterConfig};
pub use scheduler::{TransferStart, drive_tick};

use serde::{Deserialize, Serialize};

/// Configuration for the routing core
///
/// Combines configuration for all DTN components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtnConfig {
    /// Congestion control configuration
    pub congestion: CongestionConfig,
    /// Router behavior switches
    pub router: RouterConfig,
}

impl DtnConfig {
    /// Create a config that backs off hard and cleans up eagerly
    ///
    /// Suited to small buffers: congestion cuts the limit to a tenth, and
    /// delivered copies and stale receipts are deleted.
    pub fn conservative() -> Self {
        Self {
            congestion: CongestionConfig {
                alpha: 0.95,
                additive_increase: 1,
                multiplicative_decrease: 0.1,
                initial_limit: 1,
            },
            router: RouterConfig {
                delete_delivered: true,
                expire_receipts: true,
            },
        }
    }

    /// Create a config that starts wide and backs off gently
    ///
    /// Suited to large buffers and short contacts.
    pub fn aggressive() -> Self {
        Self {
            congestion: CongestionConfig {
                alpha: 0.7,
                additive_increase: 2,
                multiplicative_decrease: 0.5,
                initial_limit: 4,
            },
            router: RouterConfig {
                delete_delivered: true,
                expire_receipts: false,
            },
        }
    }

    /// Validate configuration invariants
    ///
    /// Returns a list of warnings if the configuration has potential issues.
    /// An empty list means the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let congestion = &self.congestion;

        if !(congestion.alpha > 0.0 && congestion.alpha <= 1.0) {
            warnings.push(ConfigWarning::AlphaOutOfRange);
        }

        if !(0.0..1.0).contains(&congestion.multiplicative_decrease) {
            warnings.push(ConfigWarning::DecreaseOutOfRange);
        }

        if congestion.additive_increase == 0 {
            warnings.push(ConfigWarning::NoAdditiveIncrease);
        }

        // A zero limit only recovers after a contact ends with CV not rising
        if congestion.initial_limit == 0 {
            warnings.push(ConfigWarning::ZeroInitialLimit);
        }

        warnings
    }

    /// Check if the configuration is valid (no warnings)
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Configuration warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigWarning {
    /// Smoothing weight outside `(0, 1]`
    AlphaOutOfRange,
    /// Decrease factor outside `[0, 1)`
    DecreaseOutOfRange,
    /// Limit can never grow
    NoAdditiveIncrease,
    /// First contacts admit no transfers
    ZeroInitialLimit,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::AlphaOutOfRange => write!(f, "alpha is outside (0, 1]"),
            ConfigWarning::DecreaseOutOfRange => {
                write!(f, "multiplicative_decrease is outside [0, 1)")
            }
            ConfigWarning::NoAdditiveIncrease => write!(f, "additive_increase is 0"),
            ConfigWarning::ZeroInitialLimit => write!(f, "initial_limit is 0"),
        }
    }
}
