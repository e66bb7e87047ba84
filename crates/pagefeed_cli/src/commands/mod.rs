//! CLI command implementations.

pub mod allocate;
pub mod cursor;
pub mod feed;
pub mod page;
pub mod push;
pub mod replay;
pub mod stats;
