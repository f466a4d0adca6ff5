//! In-memory host for testing
//!
//! Provides a single-node [`NodeHost`] with a FIFO message buffer, a byte
//! capacity and a set of links, so routing policies can be exercised
//! without a full simulator.
//!
//! ## Usage
//!
//! ```rust
//! use iql_core::{Contacts, LinkId, MemoryHost, Message, SimNodeId, SimTime, TransferOutcome};
//!
//! let a = SimNodeId::from_char('A').unwrap();
//! let b = SimNodeId::from_char('B').unwrap();
//!
//! let mut host = MemoryHost::new(a, 10_000);
//! host.insert(Message::new("M1", a, b, 100, SimTime(600.0), SimTime::ZERO)).unwrap();
//! host.connect(LinkId(1), b);
//!
//! assert_eq!(host.start_transfer(LinkId(1), &"M1".into()), TransferOutcome::Accepted);
//! let delivered = host.complete_transfer(LinkId(1)).unwrap();
//! assert_eq!(delivered.hop_count, 1);
//! ```

use std::collections::{BTreeMap, HashSet};

use crate::error::HostError;
use crate::host::{Clock, Contacts, LinkId, MessageBuffer, NodeHost, TransferOutcome};
use crate::identity::NodeIdentity;
use crate::message::{Message, MessageId};
use crate::time::SimTime;

/// One established link as seen from the local node
#[derive(Debug, Clone)]
pub struct MemoryLink<I> {
    /// Node on the other side
    pub peer: I,
    /// Message currently being sent
    pub in_flight: Option<MessageId>,
    /// Peer is currently sending to us over this link
    pub receiving: bool,
    /// Messages the peer is known to hold already
    pub peer_holds: HashSet<MessageId>,
}

/// A single-node in-memory host
#[derive(Debug, Clone)]
pub struct MemoryHost<I: NodeIdentity> {
    /// Our identity
    local_id: I,
    /// Current simulation time
    now: SimTime,
    /// Buffer size in bytes
    capacity: usize,
    /// Buffered messages in arrival order
    buffer: Vec<Message<I>>,
    /// Established links
    links: BTreeMap<LinkId, MemoryLink<I>>,
    /// Messages deleted as drops, in order
    dropped: Vec<MessageId>,
    /// Messages deleted for any other reason, in order
    removed: Vec<MessageId>,
}

impl<I: NodeIdentity> MemoryHost<I> {
    /// Create an empty host with the given buffer capacity in bytes
    pub fn new(local_id: I, capacity: usize) -> Self {
        Self {
            local_id,
            now: SimTime::ZERO,
            capacity,
            buffer: Vec::new(),
            links: BTreeMap::new(),
            dropped: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Set the clock
    pub fn set_time(&mut self, now: SimTime) {
        self.now = now;
    }

    /// Advance the clock
    pub fn advance(&mut self, delta: SimTime) {
        self.now += delta;
    }

    /// Bytes occupied by buffered messages
    pub fn used_space(&self) -> usize {
        self.buffer.iter().map(|m| m.size).sum()
    }

    /// Store a message
    ///
    /// The caller is expected to have made room first; the host itself never
    /// evicts.
    pub fn insert(&mut self, message: Message<I>) -> Result<(), HostError> {
        if self.buffer.iter().any(|m| m.id == message.id) {
            return Err(HostError::Duplicate(message.id.to_string()));
        }
        let free = self.free_space();
        if message.size > free {
            return Err(HostError::InsufficientSpace {
                id: message.id.to_string(),
                size: message.size,
                free,
            });
        }
        self.buffer.push(message);
        Ok(())
    }

    /// Bring up a link to a peer
    pub fn connect(&mut self, link: LinkId, peer: I) {
        self.links.insert(
            link,
            MemoryLink {
                peer,
                in_flight: None,
                receiving: false,
                peer_holds: HashSet::new(),
            },
        );
    }

    /// Tear down a link, returning whatever it was sending
    pub fn disconnect(&mut self, link: LinkId) -> Option<MessageId> {
        self.links.remove(&link).and_then(|l| l.in_flight)
    }

    /// Mark the link as occupied (or freed) by a transfer from the peer
    pub fn set_receiving(&mut self, link: LinkId, receiving: bool) {
        if let Some(l) = self.links.get_mut(&link) {
            l.receiving = receiving;
        }
    }

    /// Record that the peer on `link` already holds a message
    pub fn mark_held_by_peer(&mut self, link: LinkId, id: impl Into<MessageId>) {
        if let Some(l) = self.links.get_mut(&link) {
            l.peer_holds.insert(id.into());
        }
    }

    /// Replace what the peer on `link` is known to hold
    pub fn set_peer_inventory(&mut self, link: LinkId, ids: HashSet<MessageId>) {
        if let Some(l) = self.links.get_mut(&link) {
            l.peer_holds = ids;
        }
    }

    /// Finish the transfer running on `link`
    ///
    /// Returns the copy the peer receives (hop count incremented, received
    /// now), or `None` if nothing was in flight.
    pub fn complete_transfer(&mut self, link: LinkId) -> Option<Message<I>> {
        let now = self.now;
        let l = self.links.get_mut(&link)?;
        let id = l.in_flight.take()?;
        l.peer_holds.insert(id.clone());
        self.buffer
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.relayed(now))
    }

    /// Look up a link
    pub fn link(&self, link: LinkId) -> Option<&MemoryLink<I>> {
        self.links.get(&link)
    }

    /// Messages deleted as drops, in deletion order
    pub fn dropped_messages(&self) -> &[MessageId] {
        &self.dropped
    }

    /// Messages deleted for other reasons, in deletion order
    pub fn removed_messages(&self) -> &[MessageId] {
        &self.removed
    }

    /// Ids of all buffered messages
    pub fn message_ids(&self) -> HashSet<MessageId> {
        self.buffer.iter().map(|m| m.id.clone()).collect()
    }
}

impl<I: NodeIdentity> Clock for MemoryHost<I> {
    fn now(&self) -> SimTime {
        self.now
    }
}

impl<I: NodeIdentity> MessageBuffer<I> for MemoryHost<I> {
    type Message = Message<I>;

    fn messages(&self) -> Vec<&Message<I>> {
        self.buffer.iter().collect()
    }

    fn message(&self, id: &MessageId) -> Option<&Message<I>> {
        self.buffer.iter().find(|m| &m.id == id)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn free_space(&self) -> usize {
        self.capacity.saturating_sub(self.used_space())
    }

    fn oldest_not_transferring(&self) -> Option<&Message<I>> {
        let mut oldest: Option<&Message<I>> = None;
        for m in self.buffer.iter().filter(|m| !self.is_sending(&m.id)) {
            match oldest {
                Some(o) if o.received_at <= m.received_at => {}
                _ => oldest = Some(m),
            }
        }
        oldest
    }

    fn delete(&mut self, id: &MessageId, as_drop: bool) -> bool {
        let Some(pos) = self.buffer.iter().position(|m| &m.id == id) else {
            return false;
        };
        let message = self.buffer.remove(pos);
        if as_drop {
            self.dropped.push(message.id);
        } else {
            self.removed.push(message.id);
        }
        true
    }
}

impl<I: NodeIdentity> Contacts<I> for MemoryHost<I> {
    fn links(&self) -> Vec<LinkId> {
        self.links.keys().copied().collect()
    }

    fn link_peer(&self, link: LinkId) -> Option<&I> {
        self.links.get(&link).map(|l| &l.peer)
    }

    fn is_ready_for_transfer(&self, link: LinkId) -> bool {
        self.links
            .get(&link)
            .is_some_and(|l| l.in_flight.is_none() && !l.receiving)
    }

    fn start_transfer(&mut self, link: LinkId, message: &MessageId) -> TransferOutcome {
        let now = self.now;
        let expired = match self.buffer.iter().find(|m| &m.id == message) {
            Some(m) => m.is_expired(now),
            None => return TransferOutcome::DeniedUnspecified,
        };
        let Some(l) = self.links.get_mut(&link) else {
            return TransferOutcome::DeniedUnspecified;
        };
        if l.in_flight.is_some() || l.receiving {
            return TransferOutcome::TryLaterBusy;
        }
        if l.peer_holds.contains(message) {
            return TransferOutcome::DeniedOld;
        }
        if expired {
            return TransferOutcome::DeniedTtl;
        }
        l.in_flight = Some(message.clone());
        TransferOutcome::Accepted
    }

    fn abort_transfer(&mut self, link: LinkId) -> Option<MessageId> {
        self.links.get_mut(&link).and_then(|l| l.in_flight.take())
    }

    fn transferring_message(&self, link: LinkId) -> Option<&MessageId> {
        self.links.get(&link).and_then(|l| l.in_flight.as_ref())
    }

    fn is_transferring(&self) -> bool {
        self.links
            .values()
            .any(|l| l.in_flight.is_some() || l.receiving)
    }
}

impl<I: NodeIdentity> NodeHost<I> for MemoryHost<I> {
    fn local_id(&self) -> &I {
        &self.local_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SimNodeId;

    fn id(c: char) -> SimNodeId {
        SimNodeId::from_char(c).unwrap()
    }

    fn msg(name: &str, size: usize, at: f64) -> Message<SimNodeId> {
        let mut m = Message::new(name, id('A'), id('C'), size, SimTime(600.0), SimTime(at));
        m.received_at = SimTime(at);
        m
    }

    #[test]
    fn test_insert_respects_capacity() {
        let mut host = MemoryHost::new(id('A'), 300);
        host.insert(msg("M1", 200, 0.0)).unwrap();
        assert_eq!(host.free_space(), 100);

        let err = host.insert(msg("M2", 150, 1.0)).unwrap_err();
        assert!(matches!(err, HostError::InsufficientSpace { size: 150, free: 100, .. }));

        let err = host.insert(msg("M1", 10, 2.0)).unwrap_err();
        assert!(matches!(err, HostError::Duplicate(_)));
    }

    #[test]
    fn test_transfer_lifecycle() {
        let mut host = MemoryHost::new(id('A'), 1000);
        host.insert(msg("M1", 100, 0.0)).unwrap();
        host.insert(msg("M2", 100, 1.0)).unwrap();
        host.connect(LinkId(1), id('B'));

        assert!(host.can_start_transfer());
        assert_eq!(host.start_transfer(LinkId(1), &"M1".into()), TransferOutcome::Accepted);
        assert!(!host.is_ready_for_transfer(LinkId(1)));
        assert!(host.is_transferring());
        assert!(host.is_sending(&"M1".into()));
        assert_eq!(host.start_transfer(LinkId(1), &"M2".into()), TransferOutcome::TryLaterBusy);

        let copy = host.complete_transfer(LinkId(1)).unwrap();
        assert_eq!(copy.id.as_str(), "M1");
        assert_eq!(copy.hop_count, 1);
        assert!(host.is_ready_for_transfer(LinkId(1)));

        // Peer now holds M1
        assert_eq!(host.start_transfer(LinkId(1), &"M1".into()), TransferOutcome::DeniedOld);
    }

    #[test]
    fn test_expired_message_denied() {
        let mut host = MemoryHost::new(id('A'), 1000);
        host.insert(msg("M1", 100, 0.0)).unwrap();
        host.connect(LinkId(1), id('B'));
        host.set_time(SimTime(601.0));
        assert_eq!(host.start_transfer(LinkId(1), &"M1".into()), TransferOutcome::DeniedTtl);
    }

    #[test]
    fn test_oldest_skips_message_in_flight() {
        let mut host = MemoryHost::new(id('A'), 1000);
        host.insert(msg("M1", 100, 0.0)).unwrap();
        host.insert(msg("M2", 100, 5.0)).unwrap();
        host.connect(LinkId(1), id('B'));

        assert_eq!(host.oldest_not_transferring().unwrap().id.as_str(), "M1");
        host.start_transfer(LinkId(1), &"M1".into());
        assert_eq!(host.oldest_not_transferring().unwrap().id.as_str(), "M2");
    }

    #[test]
    fn test_delete_records_reason() {
        let mut host = MemoryHost::new(id('A'), 1000);
        host.insert(msg("M1", 100, 0.0)).unwrap();
        host.insert(msg("M2", 100, 1.0)).unwrap();

        assert!(host.delete(&"M1".into(), true));
        assert!(host.delete(&"M2".into(), false));
        assert!(!host.delete(&"M3".into(), false));

        assert_eq!(host.dropped_messages(), &[MessageId::from("M1")]);
        assert_eq!(host.removed_messages(), &[MessageId::from("M2")]);
        assert_eq!(host.message_count(), 0);
    }

    #[test]
    fn test_incoming_transfer_occupies_link() {
        let mut host = MemoryHost::new(id('A'), 1000);
        host.insert(msg("M1", 100, 0.0)).unwrap();
        host.connect(LinkId(2), id('B'));
        host.set_receiving(LinkId(2), true);

        assert!(host.is_transferring());
        assert!(!host.is_ready_for_transfer(LinkId(2)));
        assert!(!host.can_start_transfer());
        assert_eq!(host.start_transfer(LinkId(2), &"M1".into()), TransferOutcome::TryLaterBusy);

        host.set_receiving(LinkId(2), false);
        assert!(host.can_start_transfer());
    }

    #[test]
    fn test_disconnect_returns_in_flight() {
        let mut host = MemoryHost::new(id('A'), 1000);
        host.insert(msg("M1", 100, 0.0)).unwrap();
        host.connect(LinkId(7), id('B'));
        host.start_transfer(LinkId(7), &"M1".into());

        assert_eq!(host.disconnect(LinkId(7)), Some(MessageId::from("M1")));
        assert!(host.links().is_empty());
        assert!(!host.can_start_transfer());
    }
}
