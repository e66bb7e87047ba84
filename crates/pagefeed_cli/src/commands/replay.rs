//! Replay command implementation.
//!
//! Runs a consumer against the local feed through the loopback client, so
//! replay exercises the same page requests a remote consumer would make.

use super::feed::{self, DirServer, Payload};
use pagefeed_codec::JsonCodec;
use pagefeed_consumer::{
    CallbackError, ConsumerConfig, FeedConsumer, FileCursorStore, HttpFeedSource, HttpResponse,
    LoopbackClient, LoopbackServer, RetryConfig,
};
use pagefeed_protocol::Entry;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const LOCAL_BASE_URL: &str = "pagefeed://local";

struct Loopback(Arc<DirServer>);

impl LoopbackServer for Loopback {
    fn handle_get(&self, path: &str) -> HttpResponse {
        let response = self.0.handle_get(path);
        HttpResponse::new(response.status, response.body)
    }
}

/// Runs the replay command.
pub fn run(
    path: &Path,
    page_size: usize,
    consumer_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(feed::open(path, page_size, false)?);
    let source = HttpFeedSource::new(LOCAL_BASE_URL, LoopbackClient::new(Loopback(server)));
    let cursors = FileCursorStore::open(&feed::cursor_dir(path))?;

    let consumer = FeedConsumer::new(
        ConsumerConfig::new(consumer_id, page_size).with_retry(RetryConfig::no_retry()),
        source,
        cursors,
        JsonCodec::<Payload>::new(),
        |entry: Entry<Payload>| -> Result<(), CallbackError> {
            println!("{}", serde_json::to_string(&entry)?);
            Ok(())
        },
    );

    let delivered = consumer.run_until_caught_up()?;
    let stats = consumer.stats();
    info!(
        consumer = consumer_id,
        delivered,
        pages = stats.pages_visited,
        "replay complete"
    );

    Ok(())
}
