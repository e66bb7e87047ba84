//! Request routing and responses for page requests.
//!
//! Pages are served at `{base_path}/{pageIndex}/{pageSize}` as CBOR-encoded
//! [`FeedPage`](pagefeed_protocol::FeedPage)s whose entry payloads were
//! pre-encoded by the feed's codec.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use pagefeed_protocol::PageRef;

/// Content type of page bodies.
pub const PAGE_CONTENT_TYPE: &str = "application/cbor";

/// Header naming the media type of entry payloads inside a page.
pub const ENTRY_CONTENT_TYPE_HEADER: &str = "x-feed-entry-content-type";

/// Response to a page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, lowercase names.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl ServerResponse {
    pub(crate) fn page(body: Vec<u8>, cache_control: String, entry_content_type: &str) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("content-type".to_string(), PAGE_CONTENT_TYPE.to_string()),
                ("cache-control".to_string(), cache_control),
                (
                    ENTRY_CONTENT_TYPE_HEADER.to_string(),
                    entry_content_type.to_string(),
                ),
            ],
            body,
        }
    }

    pub(crate) fn error(err: &ServerError) -> Self {
        Self {
            status: err.status_code(),
            headers: vec![
                ("content-type".to_string(), "text/plain".to_string()),
                ("cache-control".to_string(), "no-store".to_string()),
            ],
            body: err.to_string().into_bytes(),
        }
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Extracts the page reference from a request path.
///
/// # Errors
///
/// Returns [`ServerError::InvalidRequest`] if the path is outside
/// `base_path` or does not have exactly two numeric segments after it.
pub fn parse_page_path(base_path: &str, path: &str) -> ServerResult<PageRef> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let base = base_path.trim_end_matches('/');

    let rest = path
        .strip_prefix(base)
        .filter(|rest| rest.starts_with('/'))
        .ok_or_else(|| ServerError::InvalidRequest(format!("path '{path}' is outside the feed")))?;

    let segments = rest.trim_matches('/').split('/').count();
    if segments != 2 {
        return Err(ServerError::InvalidRequest(format!(
            "expected /{{pageIndex}}/{{pageSize}}, got '{rest}'"
        )));
    }

    PageRef::parse(rest).map_err(|e| ServerError::InvalidRequest(e.to_string()))
}

/// Cache-Control value for a page.
///
/// Every index shifts onto newer entries when the feed grows, archive pages
/// included, so all pages share the same short lifetime.
pub fn cache_control(config: &ServerConfig) -> String {
    format!("public, max-age={}", config.max_age.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_plain_paths() {
        assert_eq!(parse_page_path("", "/3/20").unwrap(), PageRef::new(3, 20));
        assert_eq!(parse_page_path("/", "/0/5/").unwrap(), PageRef::new(0, 5));
    }

    #[test]
    fn parse_with_base_path() {
        assert_eq!(
            parse_page_path("/feed", "/feed/1/2?x=y").unwrap(),
            PageRef::new(1, 2)
        );
        assert_eq!(
            parse_page_path("/feed/", "/feed/1/2").unwrap(),
            PageRef::new(1, 2)
        );
    }

    #[test]
    fn reject_bad_paths() {
        for (base, path) in [
            ("/feed", "/other/1/2"),
            ("/feed", "/feedx/1/2"),
            ("", "/1"),
            ("", "/1/2/3"),
            ("", "/a/2"),
            ("", "/1/0"),
        ] {
            let err = parse_page_path(base, path).unwrap_err();
            assert_eq!(err.status_code(), 400, "{base} {path}");
        }
    }

    #[test]
    fn cache_lifetime_comes_from_config() {
        assert_eq!(cache_control(&ServerConfig::default()), "public, max-age=5");

        let config = ServerConfig::default().with_max_age(Duration::from_secs(30));
        assert_eq!(cache_control(&config), "public, max-age=30");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let response = ServerResponse::page(vec![], "no-cache".into(), "application/json");
        assert_eq!(response.header("Content-Type"), Some(PAGE_CONTENT_TYPE));
        assert_eq!(
            response.header("X-Feed-Entry-Content-Type"),
            Some("application/json")
        );
        assert!(response.is_success());
    }
}
