//! Congestion-aware epidemic router
//!
//! Floods messages to every contact, but only as many per contact as the
//! current transfer limit allows. The limit follows the node's congestion
//! value (see [`congestion`](crate::congestion)). Delivery receipts are
//! swapped on every link-up so delivered messages stop spreading.
//!
//! The host drives the router through four events:
//!
//! - [`EpidemicRouter::link_up`]: grant permits, merge peer receipts, purge
//!   delivered copies
//! - [`EpidemicRouter::link_down`]: fold the contact into the congestion
//!   value, discard permits
//! - [`EpidemicRouter::message_received`]: count the replication, issue a
//!   receipt at the destination
//! - [`EpidemicRouter::tick`]: start at most one transfer

use std::collections::HashSet;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use iql_core::{DtnMessage, LinkId, MessageId, NodeHost, NodeIdentity, SimTime, TransferOutcome};

use crate::DtnConfig;
use crate::congestion::{
    CongestionEstimator, CongestionTelemetry, CongestionUpdate, CvSample, PeerTelemetry,
    extra_replications,
};
use crate::error::DtnResult;
use crate::policy::{TransferPolicy, evict_oldest};
use crate::quota::LinkQuotas;
use crate::receipt::{Receipt, ReceiptCache};
use crate::scheduler::{TransferStart, drive_tick};

/// Router behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Delete a local copy when its destination reports it already has it
    pub delete_delivered: bool,
    /// Forget receipts once their TTL has passed
    pub expire_receipts: bool,
}

/// Congestion-aware epidemic router for one node
#[derive(Debug, Clone)]
pub struct EpidemicRouter<I: NodeIdentity> {
    /// Behavior switches
    config: RouterConfig,
    /// CV, limit and counters
    congestion: CongestionEstimator,
    /// Permits of active links
    quotas: LinkQuotas,
    /// Known deliveries
    receipts: ReceiptCache,
    /// Buffered messages found delivered, pending deletion
    delivered_copies: HashSet<MessageId>,
    /// Type marker
    _marker: PhantomData<I>,
}

impl<I: NodeIdentity> EpidemicRouter<I> {
    /// Create a router
    pub fn new(config: DtnConfig) -> Self {
        Self {
            config: config.router,
            congestion: CongestionEstimator::new(config.congestion),
            quotas: LinkQuotas::new(),
            receipts: ReceiptCache::new(),
            delivered_copies: HashSet::new(),
            _marker: PhantomData,
        }
    }

    /// A link came up
    ///
    /// Grants the link `limit` permits, learns the peer's receipts and
    /// deletes every buffered message that has a receipt. Returns how many
    /// messages were purged.
    pub fn link_up<H: NodeHost<I>>(
        &mut self,
        host: &mut H,
        link: LinkId,
        peer_receipts: &ReceiptCache,
    ) -> usize {
        let limit = self.congestion.limit();
        self.quotas.grant(link, limit);

        let learned = self.receipts.merge_from(peer_receipts);

        for message in host.messages() {
            if self.receipts.contains(message.id()) {
                self.delivered_copies.insert(message.id().clone());
            }
        }

        let mut purged = 0;
        for id in std::mem::take(&mut self.delivered_copies) {
            if self.delete_message(host, &id, false) {
                purged += 1;
            }
        }

        debug!(
            node = %host.local_id(),
            %link,
            permits = limit,
            learned,
            purged,
            "Link up"
        );
        purged
    }

    /// A link went down
    ///
    /// `peer` is the telemetry the other endpoint reported at teardown.
    pub fn link_down<H: NodeHost<I>>(
        &mut self,
        host: &H,
        link: LinkId,
        peer: PeerTelemetry,
    ) -> CongestionUpdate {
        let extra = extra_replications(host.messages().into_iter().map(|m| m.hop_count()));
        let update = self.congestion.on_link_down(host.now(), peer, extra);
        let unused = self.quotas.revoke(link);
        self.delivered_copies.clear();

        debug!(
            node = %host.local_id(),
            %link,
            unused_permits = unused.unwrap_or(0),
            cv = update.cv,
            limit = update.limit,
            "Link down"
        );
        update
    }

    /// A message finished arriving at this node
    ///
    /// Returns whether a new receipt was issued.
    pub fn message_received<H, M>(&mut self, host: &H, message: &M) -> bool
    where
        H: NodeHost<I>,
        M: DtnMessage<I>,
    {
        self.congestion.record_replication();

        if message.destination() != host.local_id() || self.receipts.contains(message.id()) {
            return false;
        }

        let receipt = Receipt::new(host.now(), message.ttl());
        let issued = self.receipts.insert_if_absent(message.id().clone(), receipt);
        if issued {
            debug!(node = %host.local_id(), message = %message.id(), "Delivered, receipt issued");
        }
        issued
    }

    /// Run one scheduling tick
    pub fn tick<H: NodeHost<I>>(&mut self, host: &mut H) -> Option<TransferStart> {
        drive_tick::<I, H, Self>(self, host)
    }

    /// Delete a buffered message, aborting any transfer of it first
    pub fn delete_message<H: NodeHost<I>>(
        &mut self,
        host: &mut H,
        id: &MessageId,
        as_drop: bool,
    ) -> bool {
        if host.is_sending(id) {
            for link in host.links() {
                if host.transferring_message(link) == Some(id) {
                    host.abort_transfer(link);
                    trace!(%link, message = %id, "Aborted transfer of deleted message");
                }
            }
        }
        host.delete(id, as_drop)
    }

    /// Forget receipts that outlived their TTL
    ///
    /// Does nothing unless `expire_receipts` is configured. Returns the
    /// number of receipts removed.
    pub fn sweep_expired_receipts(&mut self, now: SimTime) -> usize {
        if !self.config.expire_receipts {
            return 0;
        }
        let removed = self.receipts.sweep_expired(now).len();
        if removed > 0 {
            debug!(removed, remaining = self.receipts.len(), "Swept expired receipts");
        }
        removed
    }

    /// Current congestion value
    pub fn cv(&self) -> f64 {
        self.congestion.cv()
    }

    /// Permits the next link will get
    pub fn limit(&self) -> u32 {
        self.congestion.limit()
    }

    /// CV history, one sample per link-down
    pub fn cv_history(&self) -> &[CvSample] {
        self.congestion.history()
    }

    /// Remaining permits on a link
    pub fn permits(&self, link: LinkId) -> u32 {
        self.quotas.permits(link)
    }

    /// Known receipts, for exchange with a peer
    pub fn receipts(&self) -> &ReceiptCache {
        &self.receipts
    }

    /// Counters to hand a peer at link-down
    pub fn telemetry(&self) -> CongestionTelemetry {
        self.congestion.telemetry()
    }

    /// Drops since the last link-down
    pub fn drop_count(&self) -> u64 {
        self.congestion.drop_count()
    }

    /// Replications since the last link-down
    pub fn replication_count(&self) -> u64 {
        self.congestion.replication_count()
    }

    /// Congestion state
    pub fn congestion(&self) -> &CongestionEstimator {
        &self.congestion
    }

    /// Behavior switches
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

impl<I: NodeIdentity> TransferPolicy<I> for EpidemicRouter<I> {
    fn start_transfer<H: NodeHost<I>>(
        &mut self,
        host: &mut H,
        link: LinkId,
        message: &MessageId,
    ) -> TransferOutcome {
        if !host.is_ready_for_transfer(link) {
            return TransferOutcome::TryLaterBusy;
        }

        if !self.quotas.has_permit(link) {
            trace!(%link, message = %message, "No permits left");
            return TransferOutcome::DeniedUnspecified;
        }

        let outcome = host.start_transfer(link, message);
        match outcome {
            TransferOutcome::Accepted => {
                let left = self.quotas.consume(link).unwrap_or(0);
                trace!(%link, message = %message, permits_left = left, "Transfer started");
            }
            TransferOutcome::DeniedOld if self.config.delete_delivered => {
                let to_peer = match (host.message(message), host.link_peer(link)) {
                    (Some(m), Some(peer)) => m.destination() == peer,
                    _ => false,
                };
                if to_peer {
                    debug!(%link, message = %message, "Destination already has message, deleting copy");
                    self.delete_message(host, message, false);
                }
            }
            _ => {}
        }
        outcome
    }

    fn make_room_for<H: NodeHost<I>>(&mut self, host: &mut H, size: usize) -> DtnResult<()> {
        let congestion = &mut self.congestion;
        evict_oldest::<I, H, _>(host, size, |_| congestion.record_drop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iql_core::{Contacts, MemoryHost, Message, MessageBuffer, SimNodeId};

    fn node(c: char) -> SimNodeId {
        SimNodeId::from_char(c).unwrap()
    }

    fn message(name: &str, to: char, size: usize) -> Message<SimNodeId> {
        Message::new(name, node('A'), node(to), size, SimTime(600.0), SimTime::ZERO)
    }

    fn router() -> EpidemicRouter<SimNodeId> {
        EpidemicRouter::new(DtnConfig::default())
    }

    #[test]
    fn test_link_up_grants_limit() {
        let mut host = MemoryHost::new(node('A'), 1000);
        host.connect(LinkId(1), node('B'));
        let mut r = router();

        r.link_up(&mut host, LinkId(1), &ReceiptCache::new());
        assert_eq!(r.permits(LinkId(1)), 1);
    }

    #[test]
    fn test_busy_link_checked_before_quota() {
        let mut host = MemoryHost::new(node('A'), 1000);
        host.insert(message("M1", 'C', 10)).unwrap();
        host.insert(message("M2", 'C', 10)).unwrap();
        host.connect(LinkId(1), node('B'));
        let mut r = router();
        r.link_up(&mut host, LinkId(1), &ReceiptCache::new());

        assert_eq!(
            r.start_transfer(&mut host, LinkId(1), &"M1".into()),
            TransferOutcome::Accepted
        );
        assert_eq!(
            r.start_transfer(&mut host, LinkId(1), &"M2".into()),
            TransferOutcome::TryLaterBusy
        );

        host.complete_transfer(LinkId(1));
        assert_eq!(
            r.start_transfer(&mut host, LinkId(1), &"M2".into()),
            TransferOutcome::DeniedUnspecified
        );
    }

    #[test]
    fn test_unknown_link_has_no_quota() {
        let mut host = MemoryHost::new(node('A'), 1000);
        host.insert(message("M1", 'C', 10)).unwrap();
        host.connect(LinkId(9), node('B'));
        let mut r = router();

        assert_eq!(
            r.start_transfer(&mut host, LinkId(9), &"M1".into()),
            TransferOutcome::DeniedUnspecified
        );
    }

    #[test]
    fn test_receipt_issued_only_at_destination() {
        let host_b = MemoryHost::new(node('B'), 1000);
        let host_c = MemoryHost::new(node('C'), 1000);
        let mut at_b = router();
        let mut at_c = router();

        let m = message("M1", 'C', 10).relayed(SimTime(5.0));
        assert!(!at_b.message_received(&host_b, &m));
        assert!(at_c.message_received(&host_c, &m));
        assert!(!at_c.message_received(&host_c, &m));

        assert_eq!(at_b.replication_count(), 1);
        assert_eq!(at_c.replication_count(), 2);
        assert!(at_b.receipts().is_empty());
        assert_eq!(at_c.receipts().get(&"M1".into()).unwrap().ttl, SimTime(600.0));
    }

    #[test]
    fn test_delete_delivered_on_denied_old() {
        let config = DtnConfig {
            router: RouterConfig {
                delete_delivered: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut r: EpidemicRouter<SimNodeId> = EpidemicRouter::new(config);

        let mut host = MemoryHost::new(node('A'), 1000);
        host.insert(message("to-b", 'B', 10)).unwrap();
        host.insert(message("to-c", 'C', 10)).unwrap();
        host.connect(LinkId(1), node('B'));
        host.mark_held_by_peer(LinkId(1), "to-b");
        host.mark_held_by_peer(LinkId(1), "to-c");
        r.link_up(&mut host, LinkId(1), &ReceiptCache::new());

        assert_eq!(
            r.start_transfer(&mut host, LinkId(1), &"to-b".into()),
            TransferOutcome::DeniedOld
        );
        assert!(!host.has_message(&"to-b".into()));

        // peer is not the destination: copy stays
        assert_eq!(
            r.start_transfer(&mut host, LinkId(1), &"to-c".into()),
            TransferOutcome::DeniedOld
        );
        assert!(host.has_message(&"to-c".into()));
        assert_eq!(r.permits(LinkId(1)), 1);
    }

    #[test]
    fn test_delete_aborts_transfer() {
        let mut host = MemoryHost::new(node('A'), 1000);
        host.insert(message("M1", 'C', 10)).unwrap();
        host.connect(LinkId(1), node('B'));
        let mut r = router();
        r.link_up(&mut host, LinkId(1), &ReceiptCache::new());
        r.start_transfer(&mut host, LinkId(1), &"M1".into());
        assert!(host.is_sending(&"M1".into()));

        assert!(r.delete_message(&mut host, &"M1".into(), false));
        assert!(!host.is_transferring());
        assert_eq!(host.message_count(), 0);
    }

    #[test]
    fn test_make_room_counts_drops() {
        let mut host = MemoryHost::new(node('A'), 100);
        host.insert(message("M1", 'C', 60)).unwrap();
        let mut r = router();

        r.make_room_for(&mut host, 50).unwrap();
        assert_eq!(r.drop_count(), 1);
        assert_eq!(host.dropped_messages(), &[MessageId::from("M1")]);
    }

    #[test]
    fn test_receipt_sweep_is_opt_in() {
        let host_c = MemoryHost::new(node('C'), 1000);
        let mut r = router();
        r.message_received(&host_c, &message("M1", 'C', 10));
        assert_eq!(r.sweep_expired_receipts(SimTime(10_000.0)), 0);
        assert_eq!(r.receipts().len(), 1);

        let config = DtnConfig {
            router: RouterConfig {
                expire_receipts: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut r: EpidemicRouter<SimNodeId> = EpidemicRouter::new(config);
        r.message_received(&host_c, &message("M1", 'C', 10));
        assert_eq!(r.sweep_expired_receipts(SimTime(599.0)), 0);
        assert_eq!(r.sweep_expired_receipts(SimTime(601.0)), 1);
        assert!(r.receipts().is_empty());
    }
}
