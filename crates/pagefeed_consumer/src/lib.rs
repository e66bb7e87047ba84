//! # pagefeed consumer
//!
//! Reads a paginated event feed and delivers every entry, in position order,
//! to an application callback.
//!
//! A [`FeedConsumer`] keeps a durable [`Cursor`] per consumer id. On first
//! start it walks the archive from the oldest page toward the head; after
//! that it polls the head page. Delivery is at-least-once: the cursor is
//! saved after entries were delivered, so a crash in between redelivers
//! those entries on restart.
//!
//! ## Usage
//!
//! ```
//! use pagefeed_codec::JsonCodec;
//! use pagefeed_consumer::{
//!     CallbackError, ConsumerConfig, FeedConsumer, MemoryCursorStore, MockFeedSource,
//! };
//! use pagefeed_protocol::Entry;
//!
//! let consumer = FeedConsumer::new(
//!     ConsumerConfig::new("indexer", 20),
//!     MockFeedSource::new(),
//!     MemoryCursorStore::new(),
//!     JsonCodec::<String>::new(),
//!     |entry: Entry<String>| -> Result<(), CallbackError> {
//!         println!("{}", entry.content);
//!         Ok(())
//!     },
//! );
//!
//! // The mock source serves no pages, so the feed looks empty.
//! let outcome = consumer.poll_once().unwrap();
//! assert!(outcome.caught_up);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod callback;
mod config;
mod cursor;
mod error;
mod http;
mod source;
mod state;

pub use callback::EntryConsumer;
pub use config::{ConsumerConfig, EntryErrorPolicy, RetryConfig};
pub use cursor::{Cursor, CursorStore, FileCursorStore, MemoryCursorStore};
pub use error::{CallbackError, ConsumerError, ConsumerResult};
pub use http::{HttpClient, HttpFeedSource, HttpResponse, LoopbackClient, LoopbackServer};
pub use source::{FeedSource, MockFeedSource};
pub use state::{ConsumerState, ConsumerStats, FeedConsumer, PollOutcome};
