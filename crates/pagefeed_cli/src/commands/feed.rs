//! Opening a feed directory.
//!
//! ```text
//! <feed_dir>/
//! ├─ LOCK
//! ├─ feed.log
//! └─ cursors/    # one JSON file per consumer
//! ```

use pagefeed_codec::JsonCodec;
use pagefeed_core::{FeedConfig, LogEntryStore};
use pagefeed_protocol::FeedMeta;
use pagefeed_server::{FeedServer, ServerConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Entry payload type used by the CLI.
pub type Payload = Value;

/// Store of a feed directory.
pub type DirStore = LogEntryStore<Payload, JsonCodec<Payload>>;

/// Server over a feed directory.
pub type DirServer = FeedServer<Payload, DirStore, JsonCodec<Payload>>;

const CURSOR_DIR: &str = "cursors";

/// Opens the feed in `path`, creating the directory if `create` is set.
pub fn open(
    path: &Path,
    page_size: usize,
    create: bool,
) -> Result<DirServer, Box<dyn std::error::Error>> {
    if !create && !path.is_dir() {
        return Err(format!("No feed found at {:?}", path).into());
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "feed".to_string());
    let meta = FeedMeta::new(format!("urn:pagefeed:{name}"), name);

    let store = LogEntryStore::open_dir(path, JsonCodec::new())?;
    let config = ServerConfig::new(FeedConfig::new().with_page_size(page_size).with_meta(meta));
    Ok(FeedServer::new(config, Arc::new(store), JsonCodec::new())?)
}

/// Directory holding consumer cursors.
pub fn cursor_dir(path: &Path) -> PathBuf {
    path.join(CURSOR_DIR)
}

/// Parses a command-line payload as JSON, falling back to a plain string.
pub fn parse_content(raw: &str) -> Payload {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_parsing() {
        assert_eq!(parse_content("42"), Value::from(42));
        assert_eq!(parse_content(r#"{"a":1}"#)["a"], Value::from(1));
        assert_eq!(parse_content("hello world"), Value::from("hello world"));
    }

    #[test]
    fn open_requires_existing_dir_unless_creating() {
        let dir = tempfile::tempdir().unwrap();
        let feed = dir.path().join("orders");

        assert!(open(&feed, 20, false).is_err());

        let server = open(&feed, 20, true).unwrap();
        assert_eq!(server.config().feed.meta.id, "urn:pagefeed:orders");
        drop(server);

        assert!(open(&feed, 20, false).is_ok());
    }

    #[test]
    fn second_open_is_locked_out() {
        let dir = tempfile::tempdir().unwrap();
        let _first = open(dir.path(), 20, true).unwrap();
        assert!(open(dir.path(), 20, false).is_err());
    }
}
