//! Application callbacks receiving entries.

use crate::error::CallbackError;
use pagefeed_protocol::Entry;

/// Receives feed entries, one at a time, in ascending position order.
///
/// `apply` is called once per entry per delivery attempt. An entry whose
/// `apply` failed, or whose success was not yet recorded in the cursor when
/// the process died, is delivered again, so implementations should be
/// idempotent per position.
pub trait EntryConsumer<T>: Send + Sync {
    /// Processes one entry.
    ///
    /// # Errors
    ///
    /// Any error stops delivery of the current page. The entry is not
    /// marked processed.
    fn apply(&self, entry: Entry<T>) -> Result<(), CallbackError>;
}

impl<T, F> EntryConsumer<T> for F
where
    F: Fn(Entry<T>) -> Result<(), CallbackError> + Send + Sync,
{
    fn apply(&self, entry: Entry<T>) -> Result<(), CallbackError> {
        self(entry)
    }
}
