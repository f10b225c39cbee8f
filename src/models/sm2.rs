//! SM-2 (SuperMemo 2) spaced repetition algorithm implementation.
//!
//! The SM-2 algorithm calculates review intervals from recall quality:
//! - Each card has an ease factor (EF) that adjusts after every rating
//! - Quality grades 0-2 are lapses: the streak resets and the card comes back tomorrow
//! - Quality grades 3-5 grow the interval (1 day → 6 days → previous interval × EF)
//! - EF has a minimum value of 1.3
//!
//! Everything here is a pure function of its inputs. The current date and
//! time always come in through [`ReviewTime`]; nothing reads a clock.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::quality::Quality;
use super::review_state::{MIN_EASE_FACTOR, ReviewRecord, ReviewState};

/// Upper bound for a single interval (about a century).
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Interval of the first successful repetition.
const FIRST_INTERVAL_DAYS: u32 = 1;
/// Interval of the second successful repetition.
const SECOND_INTERVAL_DAYS: u32 = 6;
/// Interval after a lapse.
const LAPSE_INTERVAL_DAYS: u32 = 1;

/// Caller-supplied point in time for a rating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewTime {
    /// Calendar day the interval is counted from.
    pub today: NaiveDate,
    /// Recorded as `last_reviewed_at`.
    pub now: DateTime<Utc>,
}

impl ReviewTime {
    pub fn new(today: NaiveDate, now: DateTime<Utc>) -> Self {
        Self { today, now }
    }

    /// Uses the UTC calendar date of `now` as today.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            today: now.date_naive(),
            now,
        }
    }
}

/// EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)), floored at 1.3.
pub fn next_ease_factor(ease_factor: f64, quality: Quality) -> f64 {
    let distance = 5.0 - f64::from(quality.value());
    let updated = ease_factor + (0.1 - distance * (0.08 + distance * 0.02));
    updated.max(MIN_EASE_FACTOR)
}

/// Interval and repetition count after a rating, as `(interval_days, repetitions)`.
///
/// On success the interval is picked from the streak length before it is
/// incremented, and grows with the ease factor held before this rating.
pub fn next_interval(state: &ReviewState, quality: Quality) -> (u32, u32) {
    if quality.is_lapse() {
        return (LAPSE_INTERVAL_DAYS, 0);
    }

    let interval = match state.repetitions() {
        0 => FIRST_INTERVAL_DAYS,
        1 => SECOND_INTERVAL_DAYS,
        _ => scaled_interval(state.interval_days(), state.ease_factor()),
    };
    (interval, state.repetitions().saturating_add(1))
}

/// round(previous × EF), kept within `1..=MAX_INTERVAL_DAYS`.
fn scaled_interval(previous_days: u32, ease_factor: f64) -> u32 {
    // f64::round goes half away from zero, which is half up for positive values
    let scaled = (f64::from(previous_days) * ease_factor).round();
    if scaled >= f64::from(MAX_INTERVAL_DAYS) {
        MAX_INTERVAL_DAYS
    } else if scaled < 1.0 {
        1
    } else {
        scaled as u32
    }
}

/// Calculates the record that replaces `state` after a rating of `quality`.
pub fn next_review(state: &ReviewState, quality: Quality, at: ReviewTime) -> ReviewRecord {
    let (interval_days, repetitions) = next_interval(state, quality);
    let ease_factor = next_ease_factor(state.ease_factor(), quality);

    let due_date = at
        .today
        .checked_add_days(Days::new(u64::from(interval_days)))
        .unwrap_or(NaiveDate::MAX);

    ReviewRecord {
        interval_days,
        ease_factor,
        repetitions,
        due_date,
        last_reviewed_at: at.now,
    }
}

/// Interval that a given rating would produce, without committing to it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreviewEntry {
    pub quality: Quality,
    pub interval_days: u32,
    pub ease_factor: f64,
}

/// Preview of every rating on the scale, lowest quality first.
pub fn preview_intervals(state: &ReviewState) -> [PreviewEntry; 6] {
    Quality::ALL.map(|quality| PreviewEntry {
        quality,
        interval_days: next_interval(state, quality).0,
        ease_factor: next_ease_factor(state.ease_factor(), quality),
    })
}

/// Format an interval in days as a short human-readable string.
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{days}d"),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}
