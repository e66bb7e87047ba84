//! Feed server implementation.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{cache_control, parse_page_path, ServerResponse};
use pagefeed_codec::Codec;
use pagefeed_core::{AllocationReport, EntryStore, OrderKeyAllocator, Paginator, SequencedStore};
use pagefeed_protocol::{Entry, FeedPage};
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters describing a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    /// Sequenced entries.
    pub total: u64,
    /// Entries waiting for a position.
    pub pending: usize,
    /// Entries per page.
    pub page_size: usize,
    /// Index of the oldest page.
    pub last_page_index: u64,
}

/// Producer-side facade over one feed.
///
/// Ties a store to its allocator and paginator and answers page requests.
/// The server does not listen on a socket; a transport hands it request
/// paths through [`handle_get`](Self::handle_get).
///
/// # Example
///
/// ```rust
/// use pagefeed_codec::JsonCodec;
/// use pagefeed_core::{FeedConfig, MemoryEntryStore};
/// use pagefeed_server::{FeedServer, ServerConfig};
/// use std::sync::Arc;
///
/// let config = ServerConfig::new(FeedConfig::new().with_page_size(2));
/// let server = FeedServer::new(config, Arc::new(MemoryEntryStore::new()), JsonCodec::<u32>::new()).unwrap();
///
/// server.push(vec![1, 2, 3]).unwrap();
/// server.allocate().unwrap();
///
/// let response = server.handle_get("/0/2");
/// assert_eq!(response.status, 200);
/// ```
pub struct FeedServer<T, S, C> {
    config: ServerConfig,
    store: Arc<S>,
    allocator: OrderKeyAllocator<T, S>,
    paginator: Paginator<T, S>,
    codec: C,
}

impl<T, S, C> FeedServer<T, S, C>
where
    S: SequencedStore<T>,
    C: Codec<T>,
{
    /// Creates a server for a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed configuration is invalid.
    pub fn new(config: ServerConfig, store: Arc<S>, codec: C) -> ServerResult<Self> {
        let allocator = OrderKeyAllocator::new(Arc::clone(&store), config.feed.allocation.clone());
        let paginator = Paginator::new(Arc::clone(&store), config.feed.clone())?;
        Ok(Self {
            config,
            store,
            allocator,
            paginator,
            codec,
        })
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the payload codec.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Pushes payloads as new unsequenced entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch is too large or the store rejects it.
    pub fn push(&self, contents: Vec<T>) -> ServerResult<usize> {
        self.push_entries(contents.into_iter().map(Entry::new).collect())
    }

    /// Pushes prepared entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch is too large or the store rejects it.
    pub fn push_entries(&self, entries: Vec<Entry<T>>) -> ServerResult<usize> {
        if entries.len() > self.config.max_push_batch {
            return Err(ServerError::InvalidRequest(format!(
                "batch of {} exceeds maximum of {}",
                entries.len(),
                self.config.max_push_batch
            )));
        }
        Ok(self.store.push(entries)?)
    }

    /// Runs one allocation round.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails; no entry changes in that case.
    pub fn allocate(&self) -> ServerResult<AllocationReport> {
        Ok(self.allocator.assign_pending_positions()?)
    }

    /// Builds a page with decoded payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist or the store fails.
    pub fn page(&self, index: u64) -> ServerResult<FeedPage<T>> {
        Ok(self.paginator.build_page(index)?)
    }

    /// Builds a page with payloads encoded by the codec.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist, the store fails, or a
    /// payload cannot be encoded.
    pub fn encoded_page(&self, index: u64) -> ServerResult<FeedPage<Vec<u8>>> {
        let page = self.page(index)?;
        Ok(page.try_map_content(|content| self.codec.encode(&content))?)
    }

    /// Returns feed counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn stats(&self) -> ServerResult<FeedStats> {
        let total = self.store.total_count()?;
        Ok(FeedStats {
            total,
            pending: self.store.pending_count()?,
            page_size: self.paginator.page_size(),
            last_page_index: pagefeed_core::last_page_index(total, self.paginator.page_size()),
        })
    }

    /// Answers a GET request for `{base_path}/{pageIndex}/{pageSize}`.
    ///
    /// Never fails; errors become 4xx or 5xx responses.
    pub fn handle_get(&self, path: &str) -> ServerResponse {
        match self.try_handle_get(path) {
            Ok(response) => response,
            Err(err) => {
                if err.is_server_error() {
                    warn!(path, error = %err, "page request failed");
                } else {
                    debug!(path, error = %err, "page request rejected");
                }
                ServerResponse::error(&err)
            }
        }
    }

    fn try_handle_get(&self, path: &str) -> ServerResult<ServerResponse> {
        let page_ref = parse_page_path(&self.config.base_path, path)?;
        if page_ref.size != self.config.feed.page_size {
            return Err(ServerError::PageSizeMismatch {
                requested: page_ref.size,
                configured: self.config.feed.page_size,
            });
        }

        let page = self.encoded_page(page_ref.index)?;
        let body = page.to_wire()?;
        debug!(path, entries = page.len(), bytes = body.len(), "serving page");

        Ok(ServerResponse::page(
            body,
            cache_control(&self.config),
            self.codec.content_type(),
        ))
    }
}
