//! Per-link transfer quotas
//!
//! Every link gets a number of permits when it comes up. Each transfer this
//! node starts over the link consumes one; a link without permits admits
//! nothing until it is torn down and brought up again.

use std::collections::HashMap;

use iql_core::LinkId;

/// Remaining transfer permits per active link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkQuotas {
    permits: HashMap<LinkId, u32>,
}

impl LinkQuotas {
    /// Create an empty quota table
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `limit` permits to a link that just came up
    pub fn grant(&mut self, link: LinkId, limit: u32) {
        self.permits.insert(link, limit);
    }

    /// Remaining permits; absent links have none
    pub fn permits(&self, link: LinkId) -> u32 {
        self.permits.get(&link).copied().unwrap_or(0)
    }

    /// Check if the link may start another transfer
    pub fn has_permit(&self, link: LinkId) -> bool {
        self.permits(link) > 0
    }

    /// Spend one permit after a transfer started
    ///
    /// The entry is removed once it reaches zero. Returns the permits left,
    /// or `None` if the link had none to spend.
    pub fn consume(&mut self, link: LinkId) -> Option<u32> {
        let remaining = self.permits.get_mut(&link)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        let left = *remaining;
        if left == 0 {
            self.permits.remove(&link);
        }
        Some(left)
    }

    /// Forget a link that went down; returns its unused permits
    pub fn revoke(&mut self, link: LinkId) -> Option<u32> {
        self.permits.remove(&link)
    }

    /// Number of links holding an entry
    pub fn len(&self) -> usize {
        self.permits.len()
    }

    /// Check if no link holds an entry
    pub fn is_empty(&self) -> bool {
        self.permits.is_empty()
    }
}
