//! Node identity abstractions
//!
//! [`NodeIdentity`] lets routing state be keyed by whatever the host uses
//! to name a node. Simulation and tests use [`SimNodeId`], a plain index
//! that renders as a letter for the first 26 nodes.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Trait for node identity abstraction
pub trait NodeIdentity:
    Clone + Eq + Hash + Send + Sync + Debug + Display + Serialize + DeserializeOwned + 'static
{
    /// Get a short display form (for logging)
    fn short_id(&self) -> String {
        format!("{}", self)
    }
}

/// Index-based node identity for simulation
///
/// Nodes `0..26` display as `A..Z`, larger indices as `n<index>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimNodeId(pub u32);

impl SimNodeId {
    /// Create an identity from a node index
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Create an identity from a capital letter (`'A'` is index 0)
    pub fn from_char(c: char) -> Option<Self> {
        if c.is_ascii_uppercase() {
            Some(Self(c as u32 - 'A' as u32))
        } else {
            None
        }
    }

    /// The first `count` identities
    pub fn range(count: u32) -> Vec<Self> {
        (0..count).map(Self).collect()
    }

    /// Get the node index
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl Display for SimNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 26 {
            write!(f, "{}", (b'A' + self.0 as u8) as char)
        } else {
            write!(f, "n{}", self.0)
        }
    }
}

impl NodeIdentity for SimNodeId {}
