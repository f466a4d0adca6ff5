//! Message types for store-carry-forward delivery

use std::borrow::Borrow;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::identity::NodeIdentity;
use crate::time::SimTime;

/// Unique identifier for a message
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new message ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for MessageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Read-only view of a host-owned message
///
/// The routing core inspects messages through this trait and never mutates
/// them; deletions go back through the host buffer.
pub trait DtnMessage<I: NodeIdentity> {
    /// Unique identifier
    fn id(&self) -> &MessageId;

    /// Final destination
    fn destination(&self) -> &I;

    /// Size in bytes
    fn size(&self) -> usize;

    /// Number of hops taken so far (0 at the source)
    fn hop_count(&self) -> u32;

    /// Lifetime, measured from creation
    fn ttl(&self) -> SimTime;
}

/// Message record kept by the in-memory host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "I: NodeIdentity")]
pub struct Message<I: NodeIdentity> {
    /// Unique message identifier
    pub id: MessageId,
    /// Node that created the message
    pub source: I,
    /// Final destination
    pub destination: I,
    /// Size in bytes
    pub size: usize,
    /// Hops taken so far
    pub hop_count: u32,
    /// Lifetime from creation
    pub ttl: SimTime,
    /// When the source created the message
    pub created_at: SimTime,
    /// When this copy arrived at the node holding it
    pub received_at: SimTime,
}

impl<I: NodeIdentity> Message<I> {
    /// Create a fresh message at its source
    pub fn new(
        id: impl Into<MessageId>,
        source: I,
        destination: I,
        size: usize,
        ttl: SimTime,
        created_at: SimTime,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            destination,
            size,
            hop_count: 0,
            ttl,
            created_at,
            received_at: created_at,
        }
    }

    /// The copy a peer stores after receiving this message
    pub fn relayed(&self, now: SimTime) -> Self {
        Self {
            hop_count: self.hop_count + 1,
            received_at: now,
            ..self.clone()
        }
    }

    /// Check if the message outlived its TTL
    pub fn is_expired(&self, now: SimTime) -> bool {
        now > self.created_at + self.ttl
    }
}

impl<I: NodeIdentity> DtnMessage<I> for Message<I> {
    fn id(&self) -> &MessageId {
        &self.id
    }

    fn destination(&self) -> &I {
        &self.destination
    }

    fn size(&self) -> usize {
        self.size
    }

    fn hop_count(&self) -> u32 {
        self.hop_count
    }

    fn ttl(&self) -> SimTime {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SimNodeId;

    fn make_message() -> Message<SimNodeId> {
        Message::new(
            "M1",
            SimNodeId(0),
            SimNodeId(2),
            1024,
            SimTime::from_mins(30.0),
            SimTime(5.0),
        )
    }

    #[test]
    fn test_new_message_starts_at_source() {
        let m = make_message();
        assert_eq!(m.hop_count(), 0);
        assert_eq!(m.received_at, m.created_at);
        assert_eq!(m.id().as_str(), "M1");
        assert_eq!(*m.destination(), SimNodeId(2));
    }

    #[test]
    fn test_relayed_copy() {
        let m = make_message();
        let copy = m.relayed(SimTime(42.0)).relayed(SimTime(50.0));
        assert_eq!(copy.hop_count, 2);
        assert_eq!(copy.received_at, SimTime(50.0));
        assert_eq!(copy.created_at, m.created_at);
        assert_eq!(copy.id, m.id);
    }

    #[test]
    fn test_expiry() {
        let m = make_message();
        assert!(!m.is_expired(SimTime(5.0 + 1800.0)));
        assert!(m.is_expired(SimTime(5.0 + 1800.5)));
    }

    #[test]
    fn test_message_id_display_and_borrow() {
        let id = MessageId::from("abc");
        assert_eq!(id.to_string(), "abc");

        let set: std::collections::HashSet<MessageId> = [id].into_iter().collect();
        assert!(set.contains("abc"));
    }
}
