//! HTTP page source.
//!
//! The HTTP client itself is abstracted behind [`HttpClient`] so any HTTP
//! library can be plugged in. [`LoopbackClient`] routes requests straight to
//! an in-process handler, which is how tests and embedded setups wire a
//! consumer to a server without a socket.

use crate::error::{ConsumerError, ConsumerResult};
use crate::source::FeedSource;
use pagefeed_protocol::{FeedPage, PageRef};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }
}

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns a message if no response was received at all.
    fn get(&self, url: &str) -> Result<HttpResponse, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// Page source fetching CBOR pages over HTTP.
pub struct HttpFeedSource<C: HttpClient> {
    /// Base URL of the feed, e.g. `https://events.example.com/feed`.
    base_url: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpFeedSource<C> {
    /// Creates a source for the feed at `base_url`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Full URL of a page.
    pub fn page_url(&self, page: PageRef) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), page.href())
    }

    fn fetch(&self, page: PageRef) -> ConsumerResult<FeedPage<Vec<u8>>> {
        if !self.client.is_healthy() {
            return Err(ConsumerError::transport_retryable("client is not healthy"));
        }

        let url = self.page_url(page);
        let response = self
            .client
            .get(&url)
            .map_err(ConsumerError::transport_retryable)?;
        debug!(%url, status = response.status, bytes = response.body.len(), "fetched page");

        match response.status {
            200 => FeedPage::from_wire(&response.body)
                .map_err(|e| ConsumerError::InvalidPage(e.to_string())),
            404 => Err(ConsumerError::NotFound(page)),
            status => Err(ConsumerError::RemoteStatus {
                status,
                message: String::from_utf8_lossy(&response.body).into_owned(),
            }),
        }
    }
}

impl<C: HttpClient> FeedSource for HttpFeedSource<C> {
    fn fetch_page(&self, page: PageRef) -> ConsumerResult<FeedPage<Vec<u8>>> {
        let result = self.fetch(page);
        match &result {
            Ok(_) => *self.last_error.write() = None,
            Err(e) => *self.last_error.write() = Some(e.to_string()),
        }
        result
    }
}

/// Handler answering GET requests for a loopback client.
pub trait LoopbackServer: Send + Sync {
    /// Handles a GET request for `path`.
    fn handle_get(&self, path: &str) -> HttpResponse;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for std::sync::Arc<S> {
    fn handle_get(&self, path: &str) -> HttpResponse {
        (**self).handle_get(path)
    }
}

/// HTTP client that calls an in-process [`LoopbackServer`].
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
    healthy: AtomicBool,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a client for a handler.
    pub fn new(server: S) -> Self {
        Self {
            server,
            healthy: AtomicBool::new(true),
        }
    }

    /// Marks the client healthy or not; an unhealthy client refuses requests.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

/// Strips scheme and authority from a URL, leaving the path and query.
fn request_path(url: &str) -> &str {
    match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => url,
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        if !self.is_healthy() {
            return Err("loopback client is disconnected".into());
        }
        Ok(self.server.handle_get(request_path(url)))
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagefeed_protocol::{FeedMeta, Link, LinkRel};
    use parking_lot::Mutex;

    struct StaticServer {
        requests: Mutex<Vec<String>>,
        status: u16,
    }

    impl LoopbackServer for StaticServer {
        fn handle_get(&self, path: &str) -> HttpResponse {
            self.requests.lock().push(path.to_string());
            if self.status != 200 {
                return HttpResponse::new(self.status, b"nope".to_vec());
            }
            let page = PageRef::new(0, 3);
            let body = FeedPage::<Vec<u8>> {
                meta: FeedMeta::default(),
                page,
                updated: Default::default(),
                links: vec![Link::to_page(LinkRel::SelfLink, page)],
                entries: Vec::new(),
            }
            .to_wire()
            .unwrap();
            HttpResponse::new(200, body)
        }
    }

    fn source(status: u16) -> HttpFeedSource<LoopbackClient<StaticServer>> {
        HttpFeedSource::new(
            "http://events.local/feed/",
            LoopbackClient::new(StaticServer {
                requests: Mutex::new(Vec::new()),
                status,
            }),
        )
    }

    #[test]
    fn request_path_strips_authority() {
        assert_eq!(request_path("http://host:8080/feed/0/2"), "/feed/0/2");
        assert_eq!(request_path("https://host"), "/");
        assert_eq!(request_path("/0/2"), "/0/2");
    }

    #[test]
    fn fetches_and_decodes_pages() {
        let source = source(200);
        assert_eq!(source.page_url(PageRef::new(0, 3)), "http://events.local/feed/0/3");

        let page = source.fetch_page(PageRef::new(0, 3)).unwrap();
        assert_eq!(page.page, PageRef::new(0, 3));
        assert_eq!(
            source.client.server.requests.lock().as_slice(),
            ["/feed/0/3".to_string()]
        );
        assert!(source.last_error().is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            source(404).fetch_page(PageRef::new(5, 3)),
            Err(ConsumerError::NotFound(p)) if p.index == 5
        ));

        let err = source(503).fetch_page(PageRef::new(0, 3)).unwrap_err();
        assert!(err.is_retryable());

        let err = source(400).fetch_page(PageRef::new(0, 3)).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn unhealthy_client_is_retryable() {
        let source = source(200);
        source.client.set_healthy(false);

        let err = source.fetch_page(PageRef::new(0, 3)).unwrap_err();
        assert!(err.is_retryable());
        assert!(source.last_error().is_some());
    }
}
