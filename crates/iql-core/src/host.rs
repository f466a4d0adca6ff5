//! Host contracts
//!
//! A routing policy runs inside a host that owns the clock, the message
//! buffer and the set of active links. These traits are the only surface the
//! policy sees. All calls happen on the host's single scheduler thread, one
//! event at a time, so none of them take locks or block.
//!
//! ## Key Traits
//!
//! - [`Clock`]: Monotonic simulation time
//! - [`MessageBuffer`]: Buffered messages and capacity accounting
//! - [`Contacts`]: Active links and transfer control
//! - [`NodeHost`]: All of the above for one node

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::identity::NodeIdentity;
use crate::message::{DtnMessage, MessageId};
use crate::time::SimTime;

/// Identity of one active connection between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub u64);

impl Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Host answer to a transfer-start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferOutcome {
    /// Transfer started
    Accepted,
    /// Link is busy; the next tick will retry
    TryLaterBusy,
    /// Receiver already has (or has delivered) the message
    DeniedOld,
    /// Receiver has no room for the message
    DeniedNoSpace,
    /// Message outlived its TTL
    DeniedTtl,
    /// Refused without a more specific reason (also: no transfer quota)
    DeniedUnspecified,
}

impl TransferOutcome {
    /// Check if the transfer started
    pub fn is_accepted(&self) -> bool {
        matches!(self, TransferOutcome::Accepted)
    }

    /// Check if the link asked to be retried later
    ///
    /// A busy link stops the scan of further messages over that link.
    pub fn should_try_later(&self) -> bool {
        matches!(self, TransferOutcome::TryLaterBusy)
    }
}

/// Time abstraction
pub trait Clock {
    /// Current simulation time
    fn now(&self) -> SimTime;
}

/// Message buffer owned by the host
pub trait MessageBuffer<I: NodeIdentity> {
    /// Concrete message type stored by the host
    type Message: DtnMessage<I>;

    /// All buffered messages, in the host's queue order
    fn messages(&self) -> Vec<&Self::Message>;

    /// Look up a buffered message
    fn message(&self, id: &MessageId) -> Option<&Self::Message>;

    /// Total buffer size in bytes
    fn capacity(&self) -> usize;

    /// Unused buffer space in bytes
    fn free_space(&self) -> usize;

    /// Oldest buffered message that is not currently being sent
    fn oldest_not_transferring(&self) -> Option<&Self::Message>;

    /// Remove a message; `as_drop` marks it as a congestion drop for the
    /// host's own reporting. Returns whether the message was present.
    fn delete(&mut self, id: &MessageId, as_drop: bool) -> bool;

    /// Check if a message is buffered
    fn has_message(&self, id: &MessageId) -> bool {
        self.message(id).is_some()
    }

    /// Number of buffered messages
    fn message_count(&self) -> usize {
        self.messages().len()
    }
}

/// Active links of one node
pub trait Contacts<I: NodeIdentity> {
    /// Currently established links
    fn links(&self) -> Vec<LinkId>;

    /// The node on the other side of a link
    fn link_peer(&self, link: LinkId) -> Option<&I>;

    /// Link is up and no transfer occupies it
    fn is_ready_for_transfer(&self, link: LinkId) -> bool;

    /// Ask the link to start sending a buffered message
    fn start_transfer(&mut self, link: LinkId, message: &MessageId) -> TransferOutcome;

    /// Abort whatever the link is sending; returns the aborted message
    fn abort_transfer(&mut self, link: LinkId) -> Option<MessageId>;

    /// Message the link is currently sending
    fn transferring_message(&self, link: LinkId) -> Option<&MessageId>;

    /// Links that could start a transfer right now
    fn ready_links(&self) -> Vec<LinkId> {
        self.links()
            .into_iter()
            .filter(|link| self.is_ready_for_transfer(*link))
            .collect()
    }

    /// Check if any link is sending
    fn is_transferring(&self) -> bool {
        self.links()
            .into_iter()
            .any(|link| self.transferring_message(link).is_some())
    }

    /// Check if a message is being sent on any link
    fn is_sending(&self, id: &MessageId) -> bool {
        self.links()
            .into_iter()
            .any(|link| self.transferring_message(link) == Some(id))
    }
}

/// Everything a routing policy needs from the node it runs on
pub trait NodeHost<I: NodeIdentity>: Clock + MessageBuffer<I> + Contacts<I> {
    /// Identity of this node
    fn local_id(&self) -> &I;

    /// There is something to send and somewhere to send it
    fn can_start_transfer(&self) -> bool {
        self.message_count() > 0 && !self.ready_links().is_empty()
    }
}
