//! Delivery receipts
//!
//! A receipt records that a message reached its final destination. Nodes
//! swap receipt caches on every link-up so that copies of delivered messages
//! can be purged across the network.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};

use iql_core::{MessageId, SimTime};

/// Proof of delivery for one message
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// When the destination received the message
    pub created_at: SimTime,
    /// Lifetime of the delivered message
    pub ttl: SimTime,
}

impl Receipt {
    /// Create a receipt
    pub fn new(created_at: SimTime, ttl: SimTime) -> Self {
        Self { created_at, ttl }
    }

    /// Time after which the receipt may be forgotten
    pub fn expires_at(&self) -> SimTime {
        self.created_at + self.ttl
    }

    /// Check if the receipt outlived its TTL
    pub fn is_expired(&self, now: SimTime) -> bool {
        self.expires_at() < now
    }
}

/// Receipts known to one node, keyed by message
///
/// Entries are never overwritten: the first receipt recorded for a message
/// wins, whether created locally or learned from a peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptCache {
    receipts: HashMap<MessageId, Receipt>,
}

impl ReceiptCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a receipt unless one already exists; returns whether it was added
    pub fn insert_if_absent(&mut self, id: MessageId, receipt: Receipt) -> bool {
        match self.receipts.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(receipt);
                true
            }
        }
    }

    /// Copy every receipt from `other` that this cache lacks
    ///
    /// Returns the number of receipts learned.
    pub fn merge_from(&mut self, other: &ReceiptCache) -> usize {
        other
            .receipts
            .iter()
            .filter(|(id, receipt)| self.insert_if_absent((*id).clone(), **receipt))
            .count()
    }

    /// Drop receipts whose TTL ran out before `now`; returns the removed ids
    pub fn sweep_expired(&mut self, now: SimTime) -> Vec<MessageId> {
        let expired: Vec<MessageId> = self
            .receipts
            .iter()
            .filter(|(_, receipt)| receipt.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.receipts.remove(id);
        }
        expired
    }

    /// Check if a message is known to be delivered
    pub fn contains(&self, id: &MessageId) -> bool {
        self.receipts.contains_key(id)
    }

    /// Look up a receipt
    pub fn get(&self, id: &MessageId) -> Option<&Receipt> {
        self.receipts.get(id)
    }

    /// Number of receipts
    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    /// Iterate over all receipts
    pub fn iter(&self) -> impl Iterator<Item = (&MessageId, &Receipt)> {
        self.receipts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(at: f64) -> Receipt {
        Receipt::new(SimTime(at), SimTime(100.0))
    }

    #[test]
    fn test_first_writer_wins() {
        let mut cache = ReceiptCache::new();
        assert!(cache.insert_if_absent("m1".into(), receipt(1.0)));
        assert!(!cache.insert_if_absent("m1".into(), receipt(50.0)));
        assert_eq!(cache.get(&"m1".into()).unwrap().created_at, SimTime(1.0));
    }

    #[test]
    fn test_merge_is_union() {
        let mut a = ReceiptCache::new();
        a.insert_if_absent("m1".into(), receipt(1.0));
        a.insert_if_absent("shared".into(), receipt(2.0));

        let mut b = ReceiptCache::new();
        b.insert_if_absent("m2".into(), receipt(3.0));
        b.insert_if_absent("shared".into(), receipt(9.0));

        assert_eq!(a.merge_from(&b), 1);
        assert_eq!(a.len(), 3);
        assert!(a.contains(&"m2".into()));
        // existing entry kept
        assert_eq!(a.get(&"shared".into()).unwrap().created_at, SimTime(2.0));
    }

    #[test]
    fn test_sweep_expired() {
        let mut cache = ReceiptCache::new();
        cache.insert_if_absent("old".into(), receipt(0.0));
        cache.insert_if_absent("new".into(), receipt(50.0));

        // old expires at 100, still valid at exactly 100
        assert!(cache.sweep_expired(SimTime(100.0)).is_empty());

        let removed = cache.sweep_expired(SimTime(120.0));
        assert_eq!(removed, vec![MessageId::from("old")]);
        assert!(cache.contains(&"new".into()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_serializes() {
        let mut cache = ReceiptCache::new();
        cache.insert_if_absent("m1".into(), receipt(4.0));
        let json = serde_json::to_string(&cache).unwrap();
        let back: ReceiptCache = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cache);
    }
}
