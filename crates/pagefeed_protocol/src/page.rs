//! Feed pages.

use crate::entry::{Entry, Position};
use crate::error::ProtocolResult;
use crate::link::{Link, LinkRel, PageRef};
use chrono::{DateTime, Utc};
use pagefeed_codec::{from_cbor, to_cbor};
use serde::{Deserialize, Serialize};

/// Descriptive metadata carried by every page of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedMeta {
    /// Stable feed identifier.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Base URL under which page targets are served.
    pub base_url: String,
    /// Name of the software producing the feed.
    pub generator: String,
}

impl FeedMeta {
    /// Creates metadata with the given id and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the generator name.
    #[must_use]
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }

    /// Resolves a page-relative target against the base URL.
    pub fn resolve(&self, href: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), href)
    }
}

impl Default for FeedMeta {
    fn default() -> Self {
        Self {
            id: "urn:pagefeed:feed".to_string(),
            title: "pagefeed".to_string(),
            base_url: String::new(),
            generator: concat!("pagefeed ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// One page of a feed, built on demand and never stored.
///
/// Entries are ordered newest first. `updated` is the `updated` time of
/// the newest entry, or the build time for an empty page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage<T> {
    /// Feed metadata.
    pub meta: FeedMeta,
    /// Which page this is.
    pub page: PageRef,
    /// Timestamp of the newest entry.
    pub updated: DateTime<Utc>,
    /// Navigation links.
    pub links: Vec<Link>,
    /// Entries, newest first.
    pub entries: Vec<Entry<T>>,
}

impl<T> FeedPage<T> {
    /// Returns the link with the given relation.
    pub fn link(&self, rel: LinkRel) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }

    /// Returns true if the page carries a link with the given relation.
    pub fn has_link(&self, rel: LinkRel) -> bool {
        self.link(rel).is_some()
    }

    /// Follows a link to its page reference.
    ///
    /// Returns `None` if the link is absent or its target is malformed.
    pub fn page_ref(&self, rel: LinkRel) -> Option<PageRef> {
        self.link(rel).and_then(|l| l.page_ref().ok())
    }

    /// Index of the oldest page, taken from the `last` link.
    pub fn last_index(&self) -> Option<u64> {
        self.page_ref(LinkRel::Last).map(|p| p.index)
    }

    /// Position of the newest entry on the page.
    pub fn newest_position(&self) -> Option<Position> {
        self.entries.iter().find_map(|e| e.position)
    }

    /// Position of the oldest entry on the page.
    pub fn oldest_position(&self) -> Option<Position> {
        self.entries.iter().rev().find_map(|e| e.position)
    }

    /// Returns true for the head page.
    pub fn is_head(&self) -> bool {
        self.page.is_head()
    }

    /// Number of entries on the page.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the page has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts every entry payload, keeping links and metadata.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error from `f`.
    pub fn try_map_content<U, E>(
        self,
        mut f: impl FnMut(T) -> Result<U, E>,
    ) -> Result<FeedPage<U>, E> {
        let entries = self
            .entries
            .into_iter()
            .map(|e| e.try_map_content(&mut f))
            .collect::<Result<Vec<_>, E>>()?;

        Ok(FeedPage {
            meta: self.meta,
            page: self.page,
            updated: self.updated,
            links: self.links,
            entries,
        })
    }
}

impl FeedPage<Vec<u8>> {
    /// Encodes a page of raw entry payloads as CBOR for transport.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_wire(&self) -> ProtocolResult<Vec<u8>> {
        Ok(to_cbor(self)?)
    }

    /// Decodes a page received from a transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoded page.
    pub fn from_wire(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(from_cbor(bytes)?)
    }
}
