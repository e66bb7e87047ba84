//! Navigation links between archive pages.
//!
//! Links follow the archived-feed convention, which is the reverse of
//! typical web pagination:
//!
//! | rel        | target                                   |
//! |------------|------------------------------------------|
//! | `self`     | this page                                |
//! | `last`     | the oldest page                          |
//! | `next`     | one page toward newer data (`index - 1`) |
//! | `previous` | one page toward older data (`index + 1`) |
//!
//! Targets use the `/{pageIndex}/{pageSize}` scheme and are derivable
//! from the page reference alone.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relation of a link to the page carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRel {
    /// The page itself.
    #[serde(rename = "self")]
    SelfLink,
    /// The oldest page.
    Last,
    /// Toward more recent data.
    Next,
    /// Toward older data.
    Previous,
}

impl LinkRel {
    /// Returns the relation name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkRel::SelfLink => "self",
            LinkRel::Last => "last",
            LinkRel::Next => "next",
            LinkRel::Previous => "previous",
        }
    }
}

impl fmt::Display for LinkRel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one page of a feed: its index and the feed's page size.
///
/// Index 0 is the newest (head) page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRef {
    /// Page index, 0 = head.
    pub index: u64,
    /// Entries per page.
    pub size: usize,
}

impl PageRef {
    /// Creates a page reference.
    #[must_use]
    pub const fn new(index: u64, size: usize) -> Self {
        Self { index, size }
    }

    /// The head page for a given page size.
    #[must_use]
    pub const fn head(size: usize) -> Self {
        Self { index: 0, size }
    }

    /// Returns true for the head page.
    pub fn is_head(&self) -> bool {
        self.index == 0
    }

    /// Renders the link target, `/{index}/{size}`.
    pub fn href(&self) -> String {
        format!("/{}/{}", self.index, self.size)
    }

    /// Parses a link target.
    ///
    /// The last two path segments are read as index and size, so a target
    /// with a base path (`/feed/3/20`) or an absolute URL parses too.
    /// A trailing slash and a query string are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidPageRef`] if either segment is missing
    /// or not a number, or the size is zero.
    pub fn parse(href: &str) -> ProtocolResult<Self> {
        let path = href.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.trim_end_matches('/').rsplit('/');

        let size = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProtocolError::invalid_page_ref(href, "missing page size"))?;
        let index = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProtocolError::invalid_page_ref(href, "missing page index"))?;

        let size: usize = size
            .parse()
            .map_err(|_| ProtocolError::invalid_page_ref(href, "page size is not a number"))?;
        let index: u64 = index
            .parse()
            .map_err(|_| ProtocolError::invalid_page_ref(href, "page index is not a number"))?;

        if size == 0 {
            return Err(ProtocolError::invalid_page_ref(href, "page size must be positive"));
        }

        Ok(Self { index, size })
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.index, self.size)
    }
}

/// A typed link to another page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Relation to the carrying page.
    pub rel: LinkRel,
    /// Target, `/{pageIndex}/{pageSize}`.
    pub href: String,
}

impl Link {
    /// Creates a link to a page.
    pub fn to_page(rel: LinkRel, page: PageRef) -> Self {
        Self {
            rel,
            href: page.href(),
        }
    }

    /// Parses the target as a page reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not follow the page scheme.
    pub fn page_ref(&self) -> ProtocolResult<PageRef> {
        PageRef::parse(&self.href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn href_scheme() {
        assert_eq!(PageRef::new(2, 20).href(), "/2/20");
        assert_eq!(PageRef::head(5).to_string(), "/0/5");
    }

    #[test]
    fn parse_with_base_path_and_query() {
        assert_eq!(PageRef::parse("/1/2").unwrap(), PageRef::new(1, 2));
        assert_eq!(PageRef::parse("/feed/events/7/25/").unwrap(), PageRef::new(7, 25));
        assert_eq!(
            PageRef::parse("http://host/feed/3/10?format=cbor").unwrap(),
            PageRef::new(3, 10)
        );
    }

    #[test]
    fn parse_rejects_malformed_targets() {
        for bad in ["", "/", "/5", "/a/2", "/1/b", "/1/0", "/-1/2"] {
            assert!(
                matches!(PageRef::parse(bad), Err(ProtocolError::InvalidPageRef { .. })),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn link_rel_wire_names() {
        assert_eq!(LinkRel::SelfLink.as_str(), "self");
        assert_eq!(LinkRel::Previous.to_string(), "previous");
    }

    #[test]
    fn link_targets_parse_back() {
        let link = Link::to_page(LinkRel::Last, PageRef::new(9, 3));
        assert_eq!(link.page_ref().unwrap(), PageRef::new(9, 3));
    }

    proptest! {
        #[test]
        fn any_page_ref_parses_from_its_href(index in 0u64..1_000_000, size in 1usize..10_000) {
            let page = PageRef::new(index, size);
            prop_assert_eq!(PageRef::parse(&page.href()).unwrap(), page);
        }
    }
}
