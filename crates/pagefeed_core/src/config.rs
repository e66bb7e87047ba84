//! Feed configuration.

use crate::error::{CoreError, CoreResult};
use crate::store::PendingEntry;
use pagefeed_protocol::FeedMeta;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Comparator over pending entries used by [`AllocationOrder::Custom`].
pub type PendingComparator = Arc<dyn Fn(&PendingEntry, &PendingEntry) -> Ordering + Send + Sync>;

/// Order in which pending entries receive positions within one round.
///
/// Whatever the primary order, ties are broken by [`EntryId`](pagefeed_protocol::EntryId)
/// so the result is deterministic.
#[derive(Clone, Default)]
pub enum AllocationOrder {
    /// Order in which entries were pushed.
    #[default]
    Insertion,
    /// Entry creation timestamp.
    CreatedAt,
    /// Caller-supplied comparator.
    Custom(PendingComparator),
}

impl AllocationOrder {
    /// Creates a custom order from a comparator.
    pub fn custom(
        compare: impl Fn(&PendingEntry, &PendingEntry) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        Self::Custom(Arc::new(compare))
    }

    /// Compares two pending entries, falling back to their ids.
    pub fn compare(&self, a: &PendingEntry, b: &PendingEntry) -> Ordering {
        let primary = match self {
            AllocationOrder::Insertion => a.insertion.cmp(&b.insertion),
            AllocationOrder::CreatedAt => a.created.cmp(&b.created),
            AllocationOrder::Custom(compare) => compare(a, b),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

impl fmt::Debug for AllocationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationOrder::Insertion => f.write_str("Insertion"),
            AllocationOrder::CreatedAt => f.write_str("CreatedAt"),
            AllocationOrder::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Configuration for the order-key allocator.
#[derive(Debug, Clone)]
pub struct AllocationConfig {
    /// Rounds attempted before giving up on repeated conflicts.
    pub max_attempts: u32,
    /// Order of assignment within a round.
    pub order: AllocationOrder,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            order: AllocationOrder::Insertion,
        }
    }
}

impl AllocationConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the assignment order.
    #[must_use]
    pub fn with_order(mut self, order: AllocationOrder) -> Self {
        self.order = order;
        self
    }
}

/// Configuration of one feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Entries per page. Fixed for the lifetime of the feed.
    pub page_size: usize,
    /// Metadata stamped on every page.
    pub meta: FeedMeta,
    /// Allocator settings.
    pub allocation: AllocationConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            meta: FeedMeta::default(),
            allocation: AllocationConfig::default(),
        }
    }
}

impl FeedConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the feed metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: FeedMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Sets the allocator settings.
    #[must_use]
    pub fn with_allocation(mut self, allocation: AllocationConfig) -> Self {
        self.allocation = allocation;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero page size or a zero
    /// attempt budget.
    pub fn validate(&self) -> CoreResult<()> {
        if self.page_size == 0 {
            return Err(CoreError::invalid_config("page_size must be positive"));
        }
        if self.allocation.max_attempts == 0 {
            return Err(CoreError::invalid_config(
                "allocation.max_attempts must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pagefeed_protocol::EntryId;

    fn pending(id: u128, insertion: u64, second: u32) -> PendingEntry {
        PendingEntry {
            id: EntryId::from_u128(id),
            insertion,
            created: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap(),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(FeedConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let config = FeedConfig::new().with_page_size(0);
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn created_at_order_breaks_ties_by_id() {
        let order = AllocationOrder::CreatedAt;
        let a = pending(2, 0, 5);
        let b = pending(1, 1, 5);
        let c = pending(0, 2, 9);

        assert_eq!(order.compare(&b, &a), Ordering::Less);
        assert_eq!(order.compare(&a, &c), Ordering::Less);
    }

    #[test]
    fn custom_order_reverses_insertion() {
        let order = AllocationOrder::custom(|a, b| b.insertion.cmp(&a.insertion));
        let first = pending(1, 0, 0);
        let second = pending(2, 1, 0);
        assert_eq!(order.compare(&second, &first), Ordering::Less);
        assert_eq!(format!("{order:?}"), "Custom(..)");
    }
}
