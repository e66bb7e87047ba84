//! # pagefeed server
//!
//! Producer side of a paginated event feed.
//!
//! This crate provides:
//! - [`FeedServer`], which pushes entries, runs allocation rounds and builds pages
//! - Page request handling for the `/{pageIndex}/{pageSize}` scheme with
//!   cache headers that let archive pages be cached for long periods
//!
//! The server is transport-agnostic. Any HTTP stack can route GET requests
//! to [`FeedServer::handle_get`] and copy the [`ServerResponse`] back out.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{
    cache_control, parse_page_path, ServerResponse, ENTRY_CONTENT_TYPE_HEADER, PAGE_CONTENT_TYPE,
};
pub use server::{FeedServer, FeedStats};
