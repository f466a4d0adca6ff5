//! Transfer policies
//!
//! A [`TransferPolicy`] decides two things for the node it runs on: whether
//! a transfer may start over a link, and which messages to give up when an
//! incoming message needs space. The tick driver in
//! [`scheduler`](crate::scheduler) is generic over it.

use tracing::{trace, warn};

use iql_core::{DtnMessage, LinkId, MessageBuffer, MessageId, NodeHost, NodeIdentity, TransferOutcome};

use crate::error::{BufferError, DtnResult};

/// Admission and eviction decisions of one node
pub trait TransferPolicy<I: NodeIdentity> {
    /// Try to start sending `message` over `link`
    fn start_transfer<H: NodeHost<I>>(
        &mut self,
        host: &mut H,
        link: LinkId,
        message: &MessageId,
    ) -> TransferOutcome;

    /// Free at least `size` bytes in the host buffer
    fn make_room_for<H: NodeHost<I>>(&mut self, host: &mut H, size: usize) -> DtnResult<()>;
}

/// Drop-oldest eviction
///
/// Deletes the oldest message that is not being sent, as a drop, until
/// `size` bytes are free. `on_drop` sees every evicted id, including those
/// evicted before a failure. A message larger than the whole buffer fails
/// without touching it.
pub fn evict_oldest<I, H, F>(host: &mut H, size: usize, mut on_drop: F) -> DtnResult<()>
where
    I: NodeIdentity,
    H: MessageBuffer<I> + ?Sized,
    F: FnMut(&MessageId),
{
    let capacity = host.capacity();
    if size > capacity {
        return Err(BufferError::TooLarge { size, capacity }.into());
    }

    while host.free_space() < size {
        let Some(victim) = host.oldest_not_transferring().map(|m| m.id().clone()) else {
            let free = host.free_space();
            warn!(needed = size, free, "No evictable message left");
            return Err(BufferError::NoEvictableMessage { needed: size, free }.into());
        };
        if !host.delete(&victim, true) {
            let free = host.free_space();
            warn!(message = %victim, "Host refused to evict message");
            return Err(BufferError::NoEvictableMessage { needed: size, free }.into());
        }
        trace!(message = %victim, "Evicted oldest message");
        on_drop(&victim);
    }

    Ok(())
}

/// Plain epidemic flooding
///
/// Starts a transfer whenever the link is ready, with no quota and no
/// receipts. Evicts like the adaptive router.
#[derive(Debug, Clone, Default)]
pub struct FloodPolicy {
    drops: u64,
}

impl FloodPolicy {
    /// Create a flooding policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages evicted so far
    pub fn drop_count(&self) -> u64 {
        self.drops
    }
}

impl<I: NodeIdentity> TransferPolicy<I> for FloodPolicy {
    fn start_transfer<H: NodeHost<I>>(
        &mut self,
        host: &mut H,
        link: LinkId,
        message: &MessageId,
    ) -> TransferOutcome {
        if !host.is_ready_for_transfer(link) {
            return TransferOutcome::TryLaterBusy;
        }
        host.start_transfer(link, message)
    }

    fn make_room_for<H: NodeHost<I>>(&mut self, host: &mut H, size: usize) -> DtnResult<()> {
        evict_oldest::<I, H, _>(host, size, |_| self.drops += 1)
    }
}
