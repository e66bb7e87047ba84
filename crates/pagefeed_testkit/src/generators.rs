//! Property-based test generators using proptest.

use crate::fixtures::TestEvent;
use proptest::prelude::*;

/// Strategy for generating test events.
pub fn test_event_strategy() -> impl Strategy<Value = TestEvent> {
    (
        any::<i64>(),
        prop::string::string_regex("[a-z ]{0,24}").expect("Invalid regex"),
        prop::option::of(0u32..8),
    )
        .prop_map(|(value, description, version)| TestEvent {
            value,
            description,
            version,
        })
}

/// Strategy for page sizes, kept small so feeds span many pages.
pub fn page_size_strategy() -> impl Strategy<Value = usize> {
    1usize..=8
}

/// Strategy for feed lengths.
pub fn feed_length_strategy() -> impl Strategy<Value = u64> {
    0u64..=120
}

/// One step of a producer/consumer scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOperation {
    /// Push events without sequencing them
    Push {
        /// Number of events
        count: usize,
    },
    /// Run one allocation round
    Allocate,
    /// Run one consumer poll
    Poll,
}

/// Strategy for a single feed operation.
pub fn feed_operation_strategy() -> impl Strategy<Value = FeedOperation> {
    prop_oneof![
        3 => (1usize..12).prop_map(|count| FeedOperation::Push { count }),
        2 => Just(FeedOperation::Allocate),
        3 => Just(FeedOperation::Poll),
    ]
}

/// Strategy for a sequence of feed operations.
pub fn feed_operations_strategy(max_len: usize) -> impl Strategy<Value = Vec<FeedOperation>> {
    prop::collection::vec(feed_operation_strategy(), 1..max_len.max(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_operations_are_bounded(ops in feed_operations_strategy(20)) {
            prop_assert!(!ops.is_empty());
            prop_assert!(ops.len() < 20);
            for op in ops {
                if let FeedOperation::Push { count } = op {
                    prop_assert!((1..12).contains(&count));
                }
            }
        }

        #[test]
        fn test_page_sizes_are_positive(size in page_size_strategy()) {
            prop_assert!(size > 0);
        }
    }
}
