//! Page sources.

use crate::error::{ConsumerError, ConsumerResult};
use pagefeed_protocol::{FeedPage, PageRef};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Fetches pages of a remote feed.
///
/// Implementations must report a missing page as
/// [`ConsumerError::NotFound`], distinct from transport failures, so the
/// consumer can tell "end of archive" from "try again".
pub trait FeedSource: Send + Sync {
    /// Fetches one page with raw entry payloads.
    ///
    /// # Errors
    ///
    /// - [`ConsumerError::NotFound`] if the page does not exist
    /// - a transport error otherwise
    fn fetch_page(&self, page: PageRef) -> ConsumerResult<FeedPage<Vec<u8>>>;
}

impl<S: FeedSource + ?Sized> FeedSource for Arc<S> {
    fn fetch_page(&self, page: PageRef) -> ConsumerResult<FeedPage<Vec<u8>>> {
        (**self).fetch_page(page)
    }
}

/// In-memory page source for testing.
///
/// Serves pages by index, records every fetch, and can be told to fail the
/// next fetches.
#[derive(Default)]
pub struct MockFeedSource {
    pages: Mutex<HashMap<u64, FeedPage<Vec<u8>>>>,
    failures: Mutex<VecDeque<ConsumerError>>,
    fetched: Mutex<Vec<PageRef>>,
}

impl MockFeedSource {
    /// Creates a source with no pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `page` under its own index, replacing any previous page.
    pub fn insert_page(&self, page: FeedPage<Vec<u8>>) {
        self.pages.lock().insert(page.page.index, page);
    }

    /// Replaces every served page.
    pub fn set_pages(&self, pages: impl IntoIterator<Item = FeedPage<Vec<u8>>>) {
        let mut served = self.pages.lock();
        served.clear();
        served.extend(pages.into_iter().map(|p| (p.page.index, p)));
    }

    /// Makes the next fetch fail with `error`. Failures queue up in order.
    pub fn fail_next(&self, error: ConsumerError) {
        self.failures.lock().push_back(error);
    }

    /// Makes the next `count` fetches fail with a retryable transport error.
    pub fn fail_next_n(&self, count: usize) {
        let mut failures = self.failures.lock();
        for i in 0..count {
            failures.push_back(ConsumerError::transport_retryable(format!(
                "injected failure {}",
                i + 1
            )));
        }
    }

    /// Every page requested so far, in order.
    pub fn fetched(&self) -> Vec<PageRef> {
        self.fetched.lock().clone()
    }

    /// Forgets recorded fetches.
    pub fn clear_fetched(&self) {
        self.fetched.lock().clear();
    }
}

impl FeedSource for MockFeedSource {
    fn fetch_page(&self, page: PageRef) -> ConsumerResult<FeedPage<Vec<u8>>> {
        self.fetched.lock().push(page);

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }

        self.pages
            .lock()
            .get(&page.index)
            .cloned()
            .ok_or(ConsumerError::NotFound(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagefeed_protocol::{FeedMeta, Link, LinkRel};

    fn empty_page(index: u64) -> FeedPage<Vec<u8>> {
        let page = PageRef::new(index, 2);
        FeedPage {
            meta: FeedMeta::default(),
            page,
            updated: Default::default(),
            links: vec![Link::to_page(LinkRel::SelfLink, page)],
            entries: Vec::new(),
        }
    }

    #[test]
    fn serves_inserted_pages_and_records_fetches() {
        let source = MockFeedSource::new();
        source.insert_page(empty_page(0));

        assert!(source.fetch_page(PageRef::new(0, 2)).is_ok());
        assert!(matches!(
            source.fetch_page(PageRef::new(1, 2)),
            Err(ConsumerError::NotFound(_))
        ));
        assert_eq!(
            source.fetched(),
            vec![PageRef::new(0, 2), PageRef::new(1, 2)]
        );
    }

    #[test]
    fn injected_failures_come_first() {
        let source = MockFeedSource::new();
        source.insert_page(empty_page(0));
        source.fail_next_n(2);

        let page = PageRef::new(0, 2);
        assert!(source.fetch_page(page).unwrap_err().is_retryable());
        assert!(source.fetch_page(page).unwrap_err().is_retryable());
        assert!(source.fetch_page(page).is_ok());
    }
}
