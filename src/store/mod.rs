//! Persistence contract for review states.
//!
//! The scheduler owns no data; everything it knows about a learner lives
//! behind [`ReviewStore`]. Implementations:
//! - [`MemoryStore`]: in-process maps, for tests and embedding
//! - [`SqliteStore`]: durable SQLite database that also holds the card catalog

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::NaiveDate;

use crate::error::PersistenceError;
use crate::models::{CardId, DueCard, ReviewRecord, ReviewState, UserId};

/// Store contract consumed by the scheduler.
///
/// Implementations must keep exactly one record per `(user, card)` pair and
/// make every write all-or-nothing:
/// - `get` reports a card that was never rated as [`ReviewState::Unreviewed`]
/// - `get_due` returns unreviewed cards as well as those due on or before `as_of`
/// - `compare_and_swap` serializes writers of the same key
pub trait ReviewStore: Send + Sync {
    /// Every catalog card of `user` that is unreviewed or due by `as_of`,
    /// in the store's natural order.
    fn get_due(&self, user: UserId, as_of: NaiveDate) -> Result<Vec<DueCard>, PersistenceError>;

    fn get(&self, user: UserId, card: CardId) -> Result<ReviewState, PersistenceError>;

    /// Replaces the record for `(user, card)`, creating it if needed.
    fn upsert(
        &self,
        user: UserId,
        card: CardId,
        record: &ReviewRecord,
    ) -> Result<(), PersistenceError>;

    /// Upserts every `(card, record)` pair as one unit: either all of them
    /// are written or, on error, none are.
    fn upsert_all(
        &self,
        user: UserId,
        records: &[(CardId, ReviewRecord)],
    ) -> Result<(), PersistenceError>;

    /// Writes `new` only if the stored state still equals `expected`.
    /// Returns `Ok(false)` without writing when another writer got there first.
    fn compare_and_swap(
        &self,
        user: UserId,
        card: CardId,
        expected: &ReviewState,
        new: &ReviewRecord,
    ) -> Result<bool, PersistenceError>;

    /// Always equal to `get_due(user, as_of)?.len()`.
    fn count_due(&self, user: UserId, as_of: NaiveDate) -> Result<usize, PersistenceError> {
        Ok(self.get_due(user, as_of)?.len())
    }

    /// All stored records of `user`, ordered by card id.
    fn review_records(&self, user: UserId) -> Result<Vec<(CardId, ReviewRecord)>, PersistenceError>;
}
