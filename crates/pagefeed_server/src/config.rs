//! Server configuration.

use pagefeed_core::FeedConfig;
use std::time::Duration;

/// Configuration for a feed server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Feed settings: page size, metadata, allocation.
    pub feed: FeedConfig,
    /// Path prefix under which pages are served, e.g. `/feed`.
    pub base_path: String,
    /// Cache lifetime advertised for every page.
    ///
    /// Page indices count back from the newest entry, so the entries behind
    /// any `/{index}/{size}` change as the feed grows. Keep this short.
    pub max_age: Duration,
    /// Largest batch accepted by a single push.
    pub max_push_batch: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(FeedConfig::default())
    }
}

impl ServerConfig {
    /// Creates a server configuration for a feed.
    pub fn new(feed: FeedConfig) -> Self {
        Self {
            feed,
            base_path: String::new(),
            max_age: Duration::from_secs(5),
            max_push_batch: 1000,
        }
    }

    /// Sets the path prefix.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Sets the page cache lifetime.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Sets the maximum push batch size.
    pub fn with_max_push_batch(mut self, size: usize) -> Self {
        self.max_push_batch = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_pattern() {
        let config = ServerConfig::new(FeedConfig::new().with_page_size(10))
            .with_base_path("/events")
            .with_max_age(Duration::from_secs(1))
            .with_max_push_batch(50);

        assert_eq!(config.feed.page_size, 10);
        assert_eq!(config.base_path, "/events");
        assert_eq!(config.max_age, Duration::from_secs(1));
        assert_eq!(config.max_push_batch, 50);
    }
}
