//! Review scheduling on top of a [`ReviewStore`].
//!
//! The scheduler keeps no mutable state of its own, so one instance can be
//! shared across any number of threads. Ratings of the same card are kept
//! consistent by the store's compare-and-swap: if another rating lands between
//! our read and our write, the rating is recomputed from the fresh state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::models::sm2::{self, PreviewEntry, ReviewTime};
use crate::models::{CardId, DueCard, Quality, ReviewState, UserId};
use crate::store::ReviewStore;

/// Extra attempts after a compare-and-swap conflict.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerOptions {
    pub max_conflict_retries: u32,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

/// Outcome of a rating, shown to the learner as "review again in N days".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingResult {
    pub new_interval_days: u32,
    pub new_ease_factor: f64,
    pub repetitions: u32,
    pub due_date: NaiveDate,
    /// The rating was below 3.
    pub lapsed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub cards_due_today: usize,
}

pub struct Scheduler<S> {
    store: S,
    options: SchedulerOptions,
}

impl<S: ReviewStore> Scheduler<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, SchedulerOptions::default())
    }

    pub fn with_options(store: S, options: SchedulerOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> SchedulerOptions {
        self.options
    }

    /// Applies a 0-5 rating to a card and persists the new state.
    ///
    /// An out-of-range `quality` fails with [`SchedulerError::InvalidQuality`]
    /// before anything is read or written. Store failures are returned as they
    /// are; nothing is retried except a lost compare-and-swap race.
    pub fn rate(
        &self,
        user: UserId,
        card: CardId,
        quality: i32,
        at: ReviewTime,
    ) -> Result<RatingResult, SchedulerError> {
        let quality = Quality::new(quality)?;
        let attempts = self.options.max_conflict_retries.saturating_add(1);

        for _ in 0..attempts {
            let current = self.store.get(user, card)?;
            let next = sm2::next_review(&current, quality, at);

            if self.store.compare_and_swap(user, card, &current, &next)? {
                tracing::debug!(
                    user = %user,
                    card = %card,
                    quality = %quality,
                    interval_days = next.interval_days,
                    ease_factor = next.ease_factor,
                    repetitions = next.repetitions,
                    "rated card"
                );
                return Ok(RatingResult {
                    new_interval_days: next.interval_days,
                    new_ease_factor: next.ease_factor,
                    repetitions: next.repetitions,
                    due_date: next.due_date,
                    lapsed: quality.is_lapse(),
                });
            }
        }

        Err(SchedulerError::Conflict {
            user,
            card,
            attempts,
        })
    }

    /// Current state of a card; never-rated cards are [`ReviewState::Unreviewed`].
    pub fn get(&self, user: UserId, card: CardId) -> Result<ReviewState, SchedulerError> {
        Ok(self.store.get(user, card)?)
    }

    /// Snapshot of the cards due by `as_of`, in the store's order.
    ///
    /// The list is not refreshed; fetch again to see ratings applied since.
    pub fn fetch_due(&self, user: UserId, as_of: NaiveDate) -> Result<Vec<DueCard>, SchedulerError> {
        let due = self.store.get_due(user, as_of)?;
        tracing::debug!(user = %user, %as_of, due = due.len(), "fetched due cards");
        Ok(due)
    }

    pub fn stats(&self, user: UserId, as_of: NaiveDate) -> Result<ReviewStats, SchedulerError> {
        Ok(ReviewStats {
            cards_due_today: self.store.count_due(user, as_of)?,
        })
    }

    /// What each of the six ratings would do to this card right now.
    pub fn preview(&self, user: UserId, card: CardId) -> Result<[PreviewEntry; 6], SchedulerError> {
        let state = self.store.get(user, card)?;
        Ok(sm2::preview_intervals(&state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use crate::models::{Card, ReviewRecord};
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn at(d: u32) -> ReviewTime {
        ReviewTime::at(Utc.with_ymd_and_hms(2024, 9, d, 18, 0, 0).unwrap())
    }

    fn scheduler_with_cards(n: i64) -> Scheduler<MemoryStore> {
        let store = MemoryStore::new();
        store
            .add_cards(UserId(1), (1..=n).map(|i| Card::new(CardId(i), format!("q{i}"), format!("a{i}"))))
            .unwrap();
        Scheduler::new(store)
    }

    #[test]
    fn test_rate_persists_new_state() {
        let scheduler = scheduler_with_cards(1);
        let result = scheduler.rate(UserId(1), CardId(1), 5, at(1)).unwrap();

        assert_eq!(result.new_interval_days, 1);
        assert_eq!(result.repetitions, 1);
        assert!(!result.lapsed);

        let state = scheduler.get(UserId(1), CardId(1)).unwrap();
        assert_eq!(state.interval_days(), 1);
        assert_eq!(state.due_date(), Some(result.due_date));
    }

    #[test]
    fn test_invalid_quality_touches_nothing() {
        let scheduler = scheduler_with_cards(1);
        let err = scheduler.rate(UserId(1), CardId(1), -1, at(1)).unwrap_err();

        assert!(err.is_invalid_input());
        assert!(scheduler.get(UserId(1), CardId(1)).unwrap().is_unreviewed());
    }

    #[test]
    fn test_lapse_is_flagged() {
        let scheduler = scheduler_with_cards(1);
        scheduler.rate(UserId(1), CardId(1), 4, at(1)).unwrap();
        let result = scheduler.rate(UserId(1), CardId(1), 0, at(2)).unwrap();

        assert!(result.lapsed);
        assert_eq!(result.repetitions, 0);
        assert_eq!(result.new_interval_days, 1);
    }

    #[test]
    fn test_rated_card_leaves_due_list() {
        let scheduler = scheduler_with_cards(3);
        let today = at(1).today;
        assert_eq!(scheduler.stats(UserId(1), today).unwrap().cards_due_today, 3);

        scheduler.rate(UserId(1), CardId(2), 3, at(1)).unwrap();

        let ids: Vec<i64> = scheduler
            .fetch_due(UserId(1), today)
            .unwrap()
            .iter()
            .map(|d| d.card.id.0)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(scheduler.stats(UserId(1), today).unwrap().cards_due_today, 2);
    }

    #[test]
    fn test_preview_does_not_persist() {
        let scheduler = scheduler_with_cards(1);
        let preview = scheduler.preview(UserId(1), CardId(1)).unwrap();

        assert!(preview.iter().all(|p| p.interval_days == 1));
        assert!(scheduler.get(UserId(1), CardId(1)).unwrap().is_unreviewed());
    }

    /// Store whose compare-and-swap loses a fixed number of races first.
    struct RacingStore {
        inner: MemoryStore,
        losses: AtomicU32,
    }

    impl ReviewStore for RacingStore {
        fn get_due(&self, user: UserId, as_of: NaiveDate) -> Result<Vec<DueCard>, PersistenceError> {
            self.inner.get_due(user, as_of)
        }

        fn get(&self, user: UserId, card: CardId) -> Result<ReviewState, PersistenceError> {
            self.inner.get(user, card)
        }

        fn upsert(&self, user: UserId, card: CardId, record: &ReviewRecord) -> Result<(), PersistenceError> {
            self.inner.upsert(user, card, record)
        }

        fn upsert_all(&self, user: UserId, records: &[(CardId, ReviewRecord)]) -> Result<(), PersistenceError> {
            self.inner.upsert_all(user, records)
        }

        fn compare_and_swap(
            &self,
            user: UserId,
            card: CardId,
            expected: &ReviewState,
            new: &ReviewRecord,
        ) -> Result<bool, PersistenceError> {
            let remaining = self.losses.load(Ordering::SeqCst);
            if remaining > 0 {
                self.losses.store(remaining - 1, Ordering::SeqCst);
                return Ok(false);
            }
            self.inner.compare_and_swap(user, card, expected, new)
        }

        fn review_records(&self, user: UserId) -> Result<Vec<(CardId, ReviewRecord)>, PersistenceError> {
            self.inner.review_records(user)
        }
    }

    fn racing(losses: u32, retries: u32) -> Scheduler<RacingStore> {
        let store = RacingStore {
            inner: MemoryStore::new(),
            losses: AtomicU32::new(losses),
        };
        Scheduler::with_options(store, SchedulerOptions { max_conflict_retries: retries })
    }

    #[test]
    fn test_conflict_is_retried() {
        let scheduler = racing(2, 3);
        let result = scheduler.rate(UserId(1), CardId(1), 4, at(1)).unwrap();

        assert_eq!(result.repetitions, 1);
        assert_eq!(scheduler.get(UserId(1), CardId(1)).unwrap().repetitions(), 1);
    }

    #[test]
    fn test_conflict_gives_up_after_retries() {
        let scheduler = racing(10, 2);
        let err = scheduler.rate(UserId(1), CardId(1), 4, at(1)).unwrap_err();

        assert!(matches!(err, SchedulerError::Conflict { attempts: 3, .. }));
        assert!(scheduler.get(UserId(1), CardId(1)).unwrap().is_unreviewed());
    }
}
