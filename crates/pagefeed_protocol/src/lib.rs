//! # pagefeed protocol
//!
//! Data model shared by feed producers and consumers.
//!
//! This crate provides:
//! - [`Position`] and [`EntryId`] for entry identity and total order
//! - [`Entry`] for payloads with feed metadata
//! - [`Link`], [`LinkRel`] and [`PageRef`] for the page link topology
//! - [`FeedPage`] and [`FeedMeta`] for pages, with a CBOR wire form
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entry;
mod error;
mod link;
mod page;

pub use entry::{Entry, EntryId, Position};
pub use error::{ProtocolError, ProtocolResult};
pub use link::{Link, LinkRel, PageRef};
pub use page::{FeedMeta, FeedPage};
