//! In-process review store.
//!
//! Catalog and review states are kept in separate locks. Readers that need
//! both always take the catalog first.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use chrono::NaiveDate;

use super::ReviewStore;
use crate::error::PersistenceError;
use crate::models::{Card, CardId, DueCard, ReviewRecord, ReviewState, UserId};

#[derive(Default)]
pub struct MemoryStore {
    catalog: RwLock<HashMap<UserId, Vec<Card>>>,
    states: Mutex<HashMap<(UserId, CardId), ReviewRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `card` to the deck set of `user`. Re-adding a known id is a no-op.
    pub fn add_card(&self, user: UserId, card: Card) -> Result<(), PersistenceError> {
        let mut catalog = self.catalog.write()?;
        let cards = catalog.entry(user).or_default();
        if !cards.iter().any(|c| c.id == card.id) {
            cards.push(card);
        }
        Ok(())
    }

    pub fn add_cards<I>(&self, user: UserId, cards: I) -> Result<(), PersistenceError>
    where
        I: IntoIterator<Item = Card>,
    {
        for card in cards {
            self.add_card(user, card)?;
        }
        Ok(())
    }
}

impl ReviewStore for MemoryStore {
    fn get_due(&self, user: UserId, as_of: NaiveDate) -> Result<Vec<DueCard>, PersistenceError> {
        let catalog = self.catalog.read()?;
        let states = self.states.lock()?;

        let Some(cards) = catalog.get(&user) else {
            return Ok(Vec::new());
        };

        let due = cards
            .iter()
            .filter_map(|card| {
                let state = ReviewState::from(states.get(&(user, card.id)).cloned());
                state.is_due(as_of).then(|| DueCard {
                    card: card.clone(),
                    state,
                })
            })
            .collect();
        Ok(due)
    }

    fn get(&self, user: UserId, card: CardId) -> Result<ReviewState, PersistenceError> {
        let states = self.states.lock()?;
        Ok(states.get(&(user, card)).cloned().into())
    }

    fn upsert(
        &self,
        user: UserId,
        card: CardId,
        record: &ReviewRecord,
    ) -> Result<(), PersistenceError> {
        let mut states = self.states.lock()?;
        states.insert((user, card), record.clone());
        Ok(())
    }

    fn upsert_all(
        &self,
        user: UserId,
        records: &[(CardId, ReviewRecord)],
    ) -> Result<(), PersistenceError> {
        let mut states = self.states.lock()?;
        states.extend(
            records
                .iter()
                .map(|(card, record)| ((user, *card), record.clone())),
        );
        Ok(())
    }

    fn compare_and_swap(
        &self,
        user: UserId,
        card: CardId,
        expected: &ReviewState,
        new: &ReviewRecord,
    ) -> Result<bool, PersistenceError> {
        let mut states = self.states.lock()?;
        let current = ReviewState::from(states.get(&(user, card)).cloned());
        if current != *expected {
            return Ok(false);
        }
        states.insert((user, card), new.clone());
        Ok(true)
    }

    fn count_due(&self, user: UserId, as_of: NaiveDate) -> Result<usize, PersistenceError> {
        let catalog = self.catalog.read()?;
        let states = self.states.lock()?;

        let count = catalog.get(&user).map_or(0, |cards| {
            cards
                .iter()
                .filter(|card| match states.get(&(user, card.id)) {
                    None => true,
                    Some(record) => record.due_date <= as_of,
                })
                .count()
        });
        Ok(count)
    }

    fn review_records(&self, user: UserId) -> Result<Vec<(CardId, ReviewRecord)>, PersistenceError> {
        let states = self.states.lock()?;
        let mut records: Vec<_> = states
            .iter()
            .filter(|((owner, _), _)| *owner == user)
            .map(|((_, card), record)| (*card, record.clone()))
            .collect();
        records.sort_by_key(|(card, _)| *card);
        Ok(records)
    }
}
