//! Tick driver
//!
//! On every scheduler tick a node starts at most one transfer. Messages
//! whose destination is the peer on a ready link are tried first; only if
//! none of them starts are all messages offered over all ready links.
//!
//! Within one link, messages are tried in the host's queue order. An
//! accepted transfer ends the tick; a busy link moves the scan on to the
//! next link; any denial moves on to the next message.

use tracing::trace;

use iql_core::{DtnMessage, LinkId, MessageId, NodeHost, NodeIdentity};

use crate::policy::TransferPolicy;

/// A transfer started by a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStart {
    /// Link carrying the transfer
    pub link: LinkId,
    /// Message being sent
    pub message: MessageId,
    /// The peer is the message's final destination
    pub deliverable: bool,
}

/// Run one scheduling tick for `policy` on `host`
pub fn drive_tick<I, H, P>(policy: &mut P, host: &mut H) -> Option<TransferStart>
where
    I: NodeIdentity,
    H: NodeHost<I>,
    P: TransferPolicy<I>,
{
    if host.is_transferring() || !host.can_start_transfer() {
        return None;
    }

    if let Some(start) = offer_to_ready_links::<I, H, P>(policy, host, true) {
        return Some(start);
    }

    offer_to_ready_links::<I, H, P>(policy, host, false)
}

fn offer_to_ready_links<I, H, P>(
    policy: &mut P,
    host: &mut H,
    deliverable_only: bool,
) -> Option<TransferStart>
where
    I: NodeIdentity,
    H: NodeHost<I>,
    P: TransferPolicy<I>,
{
    for link in host.ready_links() {
        let Some(peer) = host.link_peer(link).cloned() else {
            continue;
        };

        let candidates: Vec<(MessageId, bool)> = host
            .messages()
            .into_iter()
            .map(|m| (m.id().clone(), m.destination() == &peer))
            .filter(|(_, deliverable)| *deliverable || !deliverable_only)
            .collect();

        for (id, deliverable) in candidates {
            // an earlier denial may have purged it
            if !host.has_message(&id) {
                continue;
            }

            let outcome = policy.start_transfer(host, link, &id);
            trace!(%link, message = %id, ?outcome, deliverable, "Transfer attempt");

            if outcome.is_accepted() {
                return Some(TransferStart {
                    link,
                    message: id,
                    deliverable,
                });
            }
            if outcome.should_try_later() {
                break;
            }
        }
    }

    None
}
