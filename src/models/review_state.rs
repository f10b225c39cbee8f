//! Per-(user, card) review state owned by the store.
//!
//! A card that has never been rated has no stored record at all. That case is
//! modelled as [`ReviewState::Unreviewed`] so that every consumer has to handle
//! it explicitly instead of probing for a missing row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::card::Card;

/// Ease factor given to a card on its first rating.
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// Lower bound for the ease factor after any update.
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Stored scheduling values of a card that has been rated at least once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub interval_days: u32,
    pub ease_factor: f64,
    /// Consecutive successful ratings since the last lapse.
    pub repetitions: u32,
    pub due_date: NaiveDate,
    /// Audit only, never used by the interval formula.
    pub last_reviewed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewState {
    #[default]
    Unreviewed,
    Reviewed(ReviewRecord),
}

impl ReviewState {
    pub fn ease_factor(&self) -> f64 {
        match self {
            Self::Unreviewed => INITIAL_EASE_FACTOR,
            Self::Reviewed(record) => record.ease_factor,
        }
    }

    pub fn repetitions(&self) -> u32 {
        match self {
            Self::Unreviewed => 0,
            Self::Reviewed(record) => record.repetitions,
        }
    }

    /// Zero before the first review.
    pub fn interval_days(&self) -> u32 {
        match self {
            Self::Unreviewed => 0,
            Self::Reviewed(record) => record.interval_days,
        }
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Unreviewed => None,
            Self::Reviewed(record) => Some(record.due_date),
        }
    }

    /// Unreviewed cards are always due.
    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        match self {
            Self::Unreviewed => true,
            Self::Reviewed(record) => record.due_date <= as_of,
        }
    }

    pub fn is_unreviewed(&self) -> bool {
        matches!(self, Self::Unreviewed)
    }

    pub fn record(&self) -> Option<&ReviewRecord> {
        match self {
            Self::Unreviewed => None,
            Self::Reviewed(record) => Some(record),
        }
    }
}

impl From<ReviewRecord> for ReviewState {
    fn from(record: ReviewRecord) -> Self {
        Self::Reviewed(record)
    }
}

impl From<Option<ReviewRecord>> for ReviewState {
    fn from(record: Option<ReviewRecord>) -> Self {
        record.map_or(Self::Unreviewed, Self::Reviewed)
    }
}

/// A catalog card that is due, paired with its current state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DueCard {
    pub card: Card,
    pub state: ReviewState,
}
