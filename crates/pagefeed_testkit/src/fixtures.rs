//! Feed fixtures.
//!
//! Provides a feed server over a memory or temporary log-backed store, a
//! loopback source serving its pages to consumers, and a callback that
//! records what it was given.

use pagefeed_codec::{CborCodec, Codec};
use pagefeed_consumer::{
    CallbackError, ConsumerConfig, CursorStore, EntryConsumer, FeedConsumer, HttpFeedSource,
    HttpResponse, LoopbackClient, LoopbackServer, RetryConfig,
};
use pagefeed_core::{
    AllocationReport, FeedConfig, LogEntryStore, MemoryEntryStore, SequencedStore,
};
use pagefeed_protocol::Entry;
use pagefeed_server::{FeedServer, ServerConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Base URL under which test feeds are served.
pub const TEST_BASE_URL: &str = "http://feed.test";

/// Payload used across pagefeed tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEvent {
    /// Ordering value; fixtures push values in increasing order.
    pub value: i64,
    /// Free text.
    pub description: String,
    /// Schema version.
    pub version: Option<u32>,
}

impl TestEvent {
    /// Creates an event for `value`.
    pub fn new(value: i64) -> Self {
        Self {
            value,
            description: format!("event {value}"),
            version: Some(1),
        }
    }
}

/// Codec for [`TestEvent`].
pub type TestCodec = CborCodec<TestEvent>;

/// In-memory store of test events.
pub type MemoryStore = MemoryEntryStore<TestEvent>;

/// Log-backed store of test events.
pub type LogStore = LogEntryStore<TestEvent, TestCodec>;

/// Feed server over test events.
pub type TestServer<S> = FeedServer<TestEvent, S, TestCodec>;

/// Serves a feed server's pages to a [`LoopbackClient`].
pub struct ServerLoopback<T, S, C>(pub Arc<FeedServer<T, S, C>>);

impl<T, S, C> LoopbackServer for ServerLoopback<T, S, C>
where
    S: SequencedStore<T>,
    C: Codec<T>,
    FeedServer<T, S, C>: Send + Sync,
{
    fn handle_get(&self, path: &str) -> HttpResponse {
        let response = self.0.handle_get(path);
        HttpResponse::new(response.status, response.body)
    }
}

/// Page source reading a test feed through the loopback client.
pub type TestSource<S> = HttpFeedSource<LoopbackClient<ServerLoopback<TestEvent, S, TestCodec>>>;

/// Consumer configuration with short delays for tests.
pub fn fast_consumer_config(consumer_id: &str, page_size: usize) -> ConsumerConfig {
    ConsumerConfig::new(consumer_id, page_size)
        .with_retry(
            RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(5))
                .with_jitter(false),
        )
        .with_poll_interval(Duration::from_millis(2))
}

/// A test feed with automatic cleanup.
pub struct TestFeed<S> {
    server: Arc<TestServer<S>>,
    /// Kept alive to prevent cleanup.
    temp_dir: Option<TempDir>,
}

impl TestFeed<MemoryStore> {
    /// Creates an empty in-memory feed.
    pub fn memory(page_size: usize) -> Self {
        Self::with_store(page_size, MemoryEntryStore::new(), None)
    }
}

impl TestFeed<LogStore> {
    /// Creates an empty feed in a temporary directory.
    pub fn file(page_size: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = LogEntryStore::open_dir(temp_dir.path(), CborCodec::new())
            .expect("Failed to open log store");
        Self::with_store(page_size, store, Some(temp_dir))
    }

    /// Closes the store and opens it again from its directory.
    ///
    /// Panics if consumers created from this feed are still alive, since
    /// they keep the store, and its directory lock, open.
    pub fn reopen(self) -> Self {
        let page_size = self.page_size();
        let Self { server, temp_dir } = self;
        drop(server);

        let temp_dir = temp_dir.expect("File feed should have a directory");
        let store = LogEntryStore::open_dir(temp_dir.path(), CborCodec::new())
            .expect("Failed to reopen log store");
        Self::with_store(page_size, store, Some(temp_dir))
    }

    /// Directory holding the feed.
    pub fn path(&self) -> &Path {
        self.temp_dir
            .as_ref()
            .map(|d| d.path())
            .expect("File feed should have a directory")
    }
}

impl<S: SequencedStore<TestEvent>> TestFeed<S> {
    fn with_store(page_size: usize, store: S, temp_dir: Option<TempDir>) -> Self {
        let config = ServerConfig::new(FeedConfig::new().with_page_size(page_size));
        let server = FeedServer::new(config, Arc::new(store), CborCodec::new())
            .expect("Invalid feed configuration");
        Self {
            server: Arc::new(server),
            temp_dir,
        }
    }

    /// The feed server.
    pub fn server(&self) -> &Arc<TestServer<S>> {
        &self.server
    }

    /// Entries per page.
    pub fn page_size(&self) -> usize {
        self.server.config().feed.page_size
    }

    /// Pushes one event per value without assigning positions.
    pub fn push(&self, values: Range<i64>) {
        let events: Vec<_> = values.map(TestEvent::new).collect();
        for batch in events.chunks(self.server.config().max_push_batch.max(1)) {
            self.server.push(batch.to_vec()).expect("Failed to push events");
        }
    }

    /// Pushes one event per value and sequences everything pending.
    pub fn publish(&self, values: Range<i64>) -> AllocationReport {
        self.push(values);
        self.server.allocate().expect("Failed to allocate positions")
    }

    /// A page source reading this feed through the loopback client.
    pub fn source(&self) -> TestSource<S> {
        HttpFeedSource::new(
            TEST_BASE_URL,
            LoopbackClient::new(ServerLoopback(Arc::clone(&self.server))),
        )
    }

    /// A consumer of this feed that records into `delivered`.
    pub fn consumer<K: CursorStore>(
        &self,
        consumer_id: &str,
        cursors: K,
        delivered: &Delivered,
    ) -> FeedConsumer<TestEvent, TestSource<S>, K, TestCodec, impl EntryConsumer<TestEvent>> {
        FeedConsumer::new(
            fast_consumer_config(consumer_id, self.page_size()),
            self.source(),
            cursors,
            CborCodec::new(),
            delivered.callback(),
        )
    }
}

impl<S> std::ops::Deref for TestFeed<S> {
    type Target = TestServer<S>;

    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

/// Records the entries a consumer delivered.
#[derive(Clone, Default)]
pub struct Delivered {
    entries: Arc<Mutex<Vec<Entry<TestEvent>>>>,
    reject: Arc<Mutex<Option<i64>>>,
}

impl Delivered {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback appending to this record.
    pub fn callback(&self) -> impl EntryConsumer<TestEvent> {
        let record = self.clone();
        move |entry: Entry<TestEvent>| -> Result<(), CallbackError> {
            if *record.reject.lock() == Some(entry.content.value) {
                return Err(format!("event {} rejected", entry.content.value).into());
            }
            record.entries.lock().push(entry);
            Ok(())
        }
    }

    /// Makes the callback fail for the event with `value`, or for none.
    pub fn reject(&self, value: Option<i64>) {
        *self.reject.lock() = value;
    }

    /// Number of entries delivered.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was delivered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivered event values, in delivery order.
    pub fn values(&self) -> Vec<i64> {
        self.entries.lock().iter().map(|e| e.content.value).collect()
    }

    /// Delivered positions, in delivery order.
    pub fn positions(&self) -> Vec<u64> {
        self.entries
            .lock()
            .iter()
            .filter_map(|e| e.position.map(|p| p.value()))
            .collect()
    }
}

/// Runs a test with a temporary in-memory feed.
pub fn with_memory_feed<F, R>(page_size: usize, f: F) -> R
where
    F: FnOnce(&TestFeed<MemoryStore>) -> R,
{
    let feed = TestFeed::memory(page_size);
    f(&feed)
}

/// Runs a test with a feed in a temporary directory.
pub fn with_file_feed<F, R>(page_size: usize, f: F) -> R
where
    F: FnOnce(&TestFeed<LogStore>) -> R,
{
    let feed = TestFeed::file(page_size);
    f(&feed)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A memory feed holding `count` sequenced events with values `0..count`.
    pub fn populated_feed(count: i64, page_size: usize) -> TestFeed<MemoryStore> {
        let feed = TestFeed::memory(page_size);
        feed.publish(0..count);
        feed
    }

    /// The five-entry, two-per-page feed used throughout the docs.
    pub fn five_by_two() -> TestFeed<MemoryStore> {
        populated_feed(5, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagefeed_consumer::MemoryCursorStore;
    use pagefeed_protocol::LinkRel;

    #[test]
    fn test_memory_feed_pages() {
        let feed = scenarios::five_by_two();
        let head = feed.page(0).unwrap();
        assert_eq!(
            head.entries.iter().map(|e| e.content.value).collect::<Vec<_>>(),
            vec![4, 3]
        );
        assert_eq!(head.page_ref(LinkRel::Last).unwrap().index, 2);
    }

    #[test]
    fn test_file_feed_survives_reopen() {
        let feed = TestFeed::file(3);
        feed.publish(0..4);
        feed.push(4..6);

        let feed = feed.reopen();
        let stats = feed.stats().unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.pending, 2);
    }

    #[test]
    fn test_consumer_fixture() {
        with_memory_feed(2, |feed| {
            feed.publish(0..7);
            let delivered = Delivered::new();
            let consumer = feed.consumer("fixture", MemoryCursorStore::new(), &delivered);

            consumer.run_until_caught_up().unwrap();
            assert_eq!(delivered.values(), (0..7).collect::<Vec<_>>());
            assert_eq!(delivered.positions(), (0..7).collect::<Vec<_>>());
        });
    }

    #[test]
    fn test_rejected_value() {
        let delivered = Delivered::new();
        delivered.reject(Some(3));
        let callback = delivered.callback();

        assert!(callback.apply(Entry::new(TestEvent::new(2))).is_ok());
        assert!(callback.apply(Entry::new(TestEvent::new(3))).is_err());
        assert_eq!(delivered.values(), vec![2]);
    }
}
