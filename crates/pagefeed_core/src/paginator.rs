//! Archive pagination.
//!
//! Pages are anchored at the newest entry. With `N` sequenced entries and
//! page size `s`, page `p` holds positions `[N-(p+1)s, N-ps)` clipped at
//! zero, newest first. The oldest page has index `(N-1)/s`.
//!
//! ```text
//! s = 2, N = 5
//!
//!   positions:  0 | 1 2 | 3 4
//!   page:       2 |  1  |  0
//! ```

use crate::config::FeedConfig;
use crate::error::{CoreError, CoreResult};
use crate::store::EntryStore;
use chrono::{DateTime, Utc};
use pagefeed_protocol::{Entry, FeedMeta, FeedPage, Link, LinkRel, PageRef, Position};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Index of the oldest page of a feed with `total` entries.
///
/// An empty feed still has page 0.
pub fn last_page_index(total: u64, page_size: usize) -> u64 {
    if total == 0 || page_size == 0 {
        0
    } else {
        (total - 1) / page_size as u64
    }
}

/// Builds one page from a window of entries.
///
/// The window is given oldest first and may contain one entry older than
/// the page itself; its presence is what produces the `previous` link.
#[derive(Debug, Clone)]
pub struct FeedPageBuilder {
    meta: FeedMeta,
    page: PageRef,
    last: u64,
}

impl FeedPageBuilder {
    /// Creates a builder for the given page.
    pub fn new(meta: FeedMeta, page: PageRef) -> Self {
        Self {
            meta,
            page,
            last: page.index,
        }
    }

    /// Sets the index of the oldest page, used for the `last` link.
    #[must_use]
    pub fn with_last_index(mut self, last: u64) -> Self {
        self.last = last;
        self
    }

    /// Builds the page, using the current time for an empty page.
    pub fn build<T>(self, window: Vec<Entry<T>>) -> FeedPage<T> {
        self.build_at(window, Utc::now())
    }

    /// Builds the page, using `now` as `updated` for an empty page.
    pub fn build_at<T>(self, mut window: Vec<Entry<T>>, now: DateTime<Utc>) -> FeedPage<T> {
        window.reverse();

        let has_previous = window.len() > self.page.size;
        window.truncate(self.page.size);

        let updated = window.first().map_or(now, |e| e.updated);
        let links = self.links(has_previous);

        FeedPage {
            meta: self.meta,
            page: self.page,
            updated,
            links,
            entries: window,
        }
    }

    fn links(&self, has_previous: bool) -> Vec<Link> {
        let size = self.page.size;
        let mut links = vec![
            Link::to_page(LinkRel::SelfLink, self.page),
            Link::to_page(LinkRel::Last, PageRef::new(self.last, size)),
        ];
        if self.page.index > 0 {
            links.push(Link::to_page(
                LinkRel::Next,
                PageRef::new(self.page.index - 1, size),
            ));
        }
        if has_previous {
            links.push(Link::to_page(
                LinkRel::Previous,
                PageRef::new(self.page.index + 1, size),
            ));
        }
        links
    }
}

/// Builds feed pages from an entry store.
///
/// Building is read-only; any number of threads may build pages from the
/// same paginator concurrently.
pub struct Paginator<T, S> {
    store: Arc<S>,
    config: FeedConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S: EntryStore<T>> Paginator<T, S> {
    /// Creates a paginator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(store: Arc<S>, config: FeedConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            _marker: PhantomData,
        })
    }

    /// Entries per page.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Index of the oldest page.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn last_page_index(&self) -> CoreResult<u64> {
        Ok(last_page_index(self.store.total_count()?, self.config.page_size))
    }

    /// Builds the page with the given index.
    ///
    /// # Errors
    ///
    /// - [`CoreError::PageNotFound`] if `index` is past the oldest page
    /// - any store error
    pub fn build_page(&self, index: u64) -> CoreResult<FeedPage<T>> {
        let size = self.config.page_size as u64;
        let total = self.store.total_count()?;
        let last = last_page_index(total, self.config.page_size);

        if index > last {
            return Err(CoreError::PageNotFound { index, last });
        }

        let end = total - index * size;
        let start = end.saturating_sub(size + 1);
        let window: Vec<_> = self
            .store
            .get_entries(Position(start), (end - start) as usize)?
            .collect();

        debug!(index, last, total, window = window.len(), "building page");

        let page = PageRef::new(index, self.config.page_size);
        Ok(FeedPageBuilder::new(self.config.meta.clone(), page)
            .with_last_index(last)
            .build(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEntryStore;
    use chrono::TimeZone;

    fn feed(count: u64, page_size: usize) -> Paginator<u64, MemoryEntryStore<u64>> {
        let store = Arc::new(MemoryEntryStore::new());
        let entries = (0..count)
            .map(|p| Entry::new(p).with_position(Position(p)))
            .collect();
        store.push(entries).unwrap();
        Paginator::new(store, FeedConfig::new().with_page_size(page_size)).unwrap()
    }

    fn positions(page: &FeedPage<u64>) -> Vec<u64> {
        page.entries.iter().map(|e| e.content).collect()
    }

    #[test]
    fn last_index_formula() {
        assert_eq!(last_page_index(0, 2), 0);
        assert_eq!(last_page_index(1, 2), 0);
        assert_eq!(last_page_index(2, 2), 0);
        assert_eq!(last_page_index(3, 2), 1);
        assert_eq!(last_page_index(5, 2), 2);
    }

    #[test]
    fn empty_feed_has_a_head_page() {
        let paginator = feed(0, 2);
        let page = paginator.build_page(0).unwrap();

        assert!(page.entries.is_empty());
        assert_eq!(page.link(LinkRel::SelfLink).unwrap().href, "/0/2");
        assert_eq!(page.link(LinkRel::Last).unwrap().href, "/0/2");
        assert!(!page.has_link(LinkRel::Next));
        assert!(!page.has_link(LinkRel::Previous));
    }

    #[test]
    fn partial_head_page() {
        let paginator = feed(1, 3);
        let page = paginator.build_page(0).unwrap();
        assert_eq!(positions(&page), vec![0]);
        assert!(!page.has_link(LinkRel::Previous));
    }

    #[test]
    fn index_past_last_is_not_found() {
        let paginator = feed(5, 2);
        assert!(matches!(
            paginator.build_page(3),
            Err(CoreError::PageNotFound { index: 3, last: 2 })
        ));
    }

    #[test]
    fn exact_multiple_of_page_size() {
        let paginator = feed(4, 2);
        assert_eq!(paginator.last_page_index().unwrap(), 1);

        let head = paginator.build_page(0).unwrap();
        assert_eq!(positions(&head), vec![3, 2]);
        assert!(head.has_link(LinkRel::Previous));

        let oldest = paginator.build_page(1).unwrap();
        assert_eq!(positions(&oldest), vec![1, 0]);
        assert!(!oldest.has_link(LinkRel::Previous));
        assert_eq!(oldest.page_ref(LinkRel::Next), Some(PageRef::new(0, 2)));
    }

    #[test]
    fn updated_is_newest_entry_or_now() {
        let stamp = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let builder = FeedPageBuilder::new(FeedMeta::default(), PageRef::head(2));

        let older = Entry::new(0u64).with_created(stamp - chrono::Duration::hours(1));
        let newer = Entry::new(1u64).with_created(stamp);
        let page = builder.clone().build_at(vec![older, newer], now);
        assert_eq!(page.updated, stamp);

        let empty: FeedPage<u64> = builder.build_at(Vec::new(), now);
        assert_eq!(empty.updated, now);
    }

    #[test]
    fn builder_drops_oldest_of_window() {
        let window = (0..4u64)
            .map(|p| Entry::new(p).with_position(Position(p)))
            .collect();
        let page = FeedPageBuilder::new(FeedMeta::default(), PageRef::new(1, 3))
            .with_last_index(1)
            .build(window);

        assert_eq!(positions(&page), vec![3, 2, 1]);
        assert!(page.has_link(LinkRel::Previous));
        assert!(page.has_link(LinkRel::Next));
    }
}
