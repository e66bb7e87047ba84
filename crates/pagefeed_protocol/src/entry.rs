//! Entries and their identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Permanent total-order position of an entry in its feed.
///
/// Positions start at zero and are assigned without gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub u64);

impl Position {
    /// The first position of every feed.
    pub const ZERO: Position = Position(0);

    /// Creates a position.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the position immediately after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Position {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Stable identifier of an entry, independent of its position.
///
/// Used as the secondary sort key when ordering unsequenced entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Generates a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from a raw value. Useful for deterministic tests.
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntryId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// An application payload plus feed metadata.
///
/// An entry is pushed without a position. Once the allocator assigns one,
/// the entry never changes again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<T> {
    /// Stable identifier.
    pub id: EntryId,
    /// Assigned position, `None` until sequenced.
    pub position: Option<Position>,
    /// When the entry was pushed.
    pub created: DateTime<Utc>,
    /// When the entry was last changed; set to the assignment time.
    pub updated: DateTime<Utc>,
    /// Application payload.
    pub content: T,
}

impl<T> Entry<T> {
    /// Creates an unsequenced entry stamped with the current time.
    pub fn new(content: T) -> Self {
        let now = Utc::now();
        Self {
            id: EntryId::new(),
            position: None,
            created: now,
            updated: now,
            content,
        }
    }

    /// Sets the identifier.
    #[must_use]
    pub fn with_id(mut self, id: EntryId) -> Self {
        self.id = id;
        self
    }

    /// Sets both timestamps.
    #[must_use]
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self.updated = created;
        self
    }

    /// Sets a caller-assigned position.
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Returns true once a position has been assigned.
    pub fn is_sequenced(&self) -> bool {
        self.position.is_some()
    }

    /// Assigns a position, stamping `updated` with the assignment time.
    pub fn assign(&mut self, position: Position, at: DateTime<Utc>) {
        self.position = Some(position);
        self.updated = at;
    }

    /// Converts the payload, keeping all metadata.
    pub fn map_content<U>(self, f: impl FnOnce(T) -> U) -> Entry<U> {
        Entry {
            id: self.id,
            position: self.position,
            created: self.created,
            updated: self.updated,
            content: f(self.content),
        }
    }

    /// Converts the payload with a fallible function.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn try_map_content<U, E>(
        self,
        f: impl FnOnce(T) -> Result<U, E>,
    ) -> Result<Entry<U>, E> {
        Ok(Entry {
            id: self.id,
            position: self.position,
            created: self.created,
            updated: self.updated,
            content: f(self.content)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn position_ordering() {
        assert!(Position(1) < Position(2));
        assert_eq!(Position::ZERO.next(), Position(1));
        assert_eq!(Position(41).to_string(), "41");
    }

    #[test]
    fn entry_ids_are_unique() {
        assert_ne!(EntryId::new(), EntryId::new());
        assert!(EntryId::from_u128(1) < EntryId::from_u128(2));
    }

    #[test]
    fn assign_stamps_updated_only() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let assigned = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        let mut entry = Entry::new("payload").with_created(created);
        assert!(!entry.is_sequenced());

        entry.assign(Position(7), assigned);
        assert_eq!(entry.position, Some(Position(7)));
        assert_eq!(entry.created, created);
        assert_eq!(entry.updated, assigned);
    }

    #[test]
    fn map_keeps_metadata() {
        let entry = Entry::new(21u32).with_position(Position(3));
        let id = entry.id;

        let mapped = entry.map_content(|v| v * 2);
        assert_eq!(mapped.content, 42);
        assert_eq!(mapped.id, id);
        assert_eq!(mapped.position, Some(Position(3)));

        let failed: Result<Entry<u32>, &str> = mapped.try_map_content(|_| Err("bad"));
        assert_eq!(failed.unwrap_err(), "bad");
    }
}
