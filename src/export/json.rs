//! JSON import/export for decks and review states.
//! Decks feed the catalog; review snapshots back up and restore a learner's
//! scheduling state.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use crate::error::PersistenceError;
use crate::models::review_state::MIN_EASE_FACTOR;
use crate::models::{CardId, Deck, ReviewRecord, UserId};
use crate::store::ReviewStore;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub card: CardId,
    #[serde(flatten)]
    pub record: ReviewRecord,
}

/// Every stored review record of one learner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewSnapshot {
    pub user: UserId,
    pub states: Vec<SnapshotEntry>,
}

impl ReviewSnapshot {
    pub fn capture<S: ReviewStore + ?Sized>(store: &S, user: UserId) -> Result<Self, PersistenceError> {
        let states = store
            .review_records(user)?
            .into_iter()
            .map(|(card, record)| SnapshotEntry { card, record })
            .collect();
        Ok(Self { user, states })
    }

    /// Rejects records that break the review state invariants.
    fn validate(&self) -> Result<(), PersistenceError> {
        for entry in &self.states {
            let record = &entry.record;
            if record.interval_days < 1
                || record.ease_factor.is_nan()
                || record.ease_factor < MIN_EASE_FACTOR
            {
                return Err(PersistenceError::Corrupt(format!(
                    "card {} has interval {} and ease factor {}",
                    entry.card, record.interval_days, record.ease_factor
                )));
            }
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), PersistenceError> {
    let json_string = serde_json::to_string_pretty(value)?;
    let mut file = File::create(path)?;
    file.write_all(json_string.as_bytes())?;
    Ok(())
}

/// Exports a deck to a JSON file at the specified path.
pub fn export_deck_to_path(deck: &Deck, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    write_json(deck, path.as_ref())
}

/// Imports a deck from a JSON file.
/// Fails if the file doesn't exist or contains invalid JSON.
pub fn import_deck(path: impl AsRef<Path>) -> Result<Deck, PersistenceError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let deck: Deck = serde_json::from_reader(BufReader::new(file))?;

    tracing::info!(deck = %deck.name, path = %path.display(), "deck loaded");
    Ok(deck)
}

/// Writes every review record of `user` to `path`, returning how many were written.
pub fn export_review_states<S: ReviewStore + ?Sized>(
    store: &S,
    user: UserId,
    path: impl AsRef<Path>,
) -> Result<usize, PersistenceError> {
    let snapshot = ReviewSnapshot::capture(store, user)?;
    write_json(&snapshot, path.as_ref())?;
    Ok(snapshot.states.len())
}

/// Writes every record of a snapshot taken for `user` back into `store`.
///
/// The whole file is validated before the first write, and the records land
/// in one [`ReviewStore::upsert_all`] call, so a failure leaves the store as it was.
pub fn restore_review_states<S: ReviewStore + ?Sized>(
    store: &S,
    user: UserId,
    path: impl AsRef<Path>,
) -> Result<ReviewSnapshot, PersistenceError> {
    let file = File::open(path.as_ref())?;
    let snapshot: ReviewSnapshot = serde_json::from_reader(BufReader::new(file))?;
    if snapshot.user != user {
        return Err(PersistenceError::UserMismatch {
            expected: user,
            found: snapshot.user,
        });
    }
    snapshot.validate()?;

    let records: Vec<(CardId, ReviewRecord)> = snapshot
        .states
        .iter()
        .map(|entry| (entry.card, entry.record.clone()))
        .collect();
    store.upsert_all(user, &records)?;

    tracing::info!(user = %user, states = records.len(), "review states restored");
    Ok(snapshot)
}
