//! Property-based tests for the SM-2 scheduler.

use chrono::{Days, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use review_scheduler::models::review_state::MIN_EASE_FACTOR;
use review_scheduler::models::sm2::{MAX_INTERVAL_DAYS, next_review};
use review_scheduler::{
    Card, CardId, MemoryStore, Quality, ReviewRecord, ReviewState, ReviewStore, ReviewTime,
    Scheduler, UserId,
};

const USER: UserId = UserId(1);

// =============================================================================
// Test helpers
// =============================================================================

fn review_time(offset_days: u64) -> ReviewTime {
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
    ReviewTime::at(start + Days::new(offset_days))
}

fn arbitrary_quality() -> impl Strategy<Value = i32> {
    0..=5i32
}

fn arbitrary_reviewed_state() -> impl Strategy<Value = ReviewState> {
    (1..=MAX_INTERVAL_DAYS, 1.3..4.0f64, 1..50u32, 0..3650u64).prop_map(
        |(interval_days, ease_factor, repetitions, due_offset)| {
            ReviewState::Reviewed(ReviewRecord {
                interval_days,
                ease_factor,
                repetitions,
                due_date: review_time(due_offset).today,
                last_reviewed_at: review_time(0).now,
            })
        },
    )
}

fn single_card_scheduler() -> Scheduler<MemoryStore> {
    let store = MemoryStore::new();
    store.add_card(USER, Card::new(CardId(1), "front", "back")).unwrap();
    Scheduler::new(store)
}

// =============================================================================
// Rating properties
// =============================================================================

proptest! {
    #[test]
    fn ease_factor_never_below_floor(qualities in prop::collection::vec(arbitrary_quality(), 1..60)) {
        let scheduler = single_card_scheduler();
        for (day, quality) in qualities.iter().enumerate() {
            let result = scheduler.rate(USER, CardId(1), *quality, review_time(day as u64)).unwrap();
            prop_assert!(result.new_ease_factor >= MIN_EASE_FACTOR);
        }
    }

    #[test]
    fn repeated_blackouts_stay_at_floor(n in 1..40usize) {
        let scheduler = single_card_scheduler();
        let mut last = None;
        for day in 0..n {
            last = Some(scheduler.rate(USER, CardId(1), 0, review_time(day as u64)).unwrap());
        }
        let last = last.unwrap();
        prop_assert!(last.new_ease_factor >= MIN_EASE_FACTOR);
        prop_assert_eq!(last.new_interval_days, 1);
    }

    #[test]
    fn lapse_resets_streak(state in arbitrary_reviewed_state(), quality in 0..=2i32, day in 0..3650u64) {
        let next = next_review(&state, Quality::new(quality).unwrap(), review_time(day));
        prop_assert_eq!(next.repetitions, 0);
        prop_assert_eq!(next.interval_days, 1);
    }

    #[test]
    fn success_extends_streak(state in arbitrary_reviewed_state(), quality in 3..=5i32) {
        let next = next_review(&state, Quality::new(quality).unwrap(), review_time(0));
        prop_assert_eq!(next.repetitions, state.repetitions() + 1);
        prop_assert!(next.interval_days >= 1);
    }

    #[test]
    fn first_two_successes_are_fixed(q1 in 3..=5i32, q2 in 3..=5i32) {
        let scheduler = single_card_scheduler();
        let first = scheduler.rate(USER, CardId(1), q1, review_time(0)).unwrap();
        let second = scheduler.rate(USER, CardId(1), q2, review_time(1)).unwrap();
        prop_assert_eq!(first.new_interval_days, 1);
        prop_assert_eq!(second.new_interval_days, 6);
    }

    #[test]
    fn rating_is_deterministic(
        qualities in prop::collection::vec(arbitrary_quality(), 0..20),
        last in arbitrary_quality(),
    ) {
        let a = single_card_scheduler();
        let b = single_card_scheduler();
        for (day, quality) in qualities.iter().enumerate() {
            a.rate(USER, CardId(1), *quality, review_time(day as u64)).unwrap();
            b.rate(USER, CardId(1), *quality, review_time(day as u64)).unwrap();
        }

        let at = review_time(qualities.len() as u64);
        let ra = a.rate(USER, CardId(1), last, at).unwrap();
        let rb = b.rate(USER, CardId(1), last, at).unwrap();
        prop_assert_eq!(ra.new_ease_factor.to_bits(), rb.new_ease_factor.to_bits());
        prop_assert_eq!(ra, rb);
    }

    #[test]
    fn due_date_is_after_today(state in arbitrary_reviewed_state(), quality in arbitrary_quality(), day in 0..20_000u64) {
        let at = review_time(day);
        let next = next_review(&state, Quality::new(quality).unwrap(), at);
        prop_assert!(next.due_date > at.today);
        prop_assert_eq!(next.due_date, at.today + Days::new(u64::from(next.interval_days)));
    }

    #[test]
    fn out_of_range_quality_is_rejected(quality in prop_oneof![i32::MIN..0, 6..=i32::MAX]) {
        let scheduler = single_card_scheduler();
        prop_assert!(scheduler.rate(USER, CardId(1), quality, review_time(0)).is_err());
        prop_assert!(scheduler.get(USER, CardId(1)).unwrap().is_unreviewed());
    }
}

// =============================================================================
// Due selection properties
// =============================================================================

proptest! {
    #[test]
    fn count_due_matches_due_list(
        ratings in prop::collection::vec((1..=12i64, arbitrary_quality(), 0..30u64), 0..40),
        as_of in 0..60u64,
    ) {
        let store = MemoryStore::new();
        store
            .add_cards(USER, (1..=12).map(|i| Card::new(CardId(i), "f", "b")))
            .unwrap();
        let scheduler = Scheduler::new(store);
        for (card, quality, day) in ratings {
            scheduler.rate(USER, CardId(card), quality, review_time(day)).unwrap();
        }

        let as_of: NaiveDate = review_time(as_of).today;
        let due = scheduler.fetch_due(USER, as_of).unwrap();
        prop_assert_eq!(scheduler.stats(USER, as_of).unwrap().cards_due_today, due.len());
        prop_assert_eq!(scheduler.store().count_due(USER, as_of).unwrap(), due.len());
        for entry in &due {
            prop_assert!(entry.state.is_due(as_of));
        }
    }

    #[test]
    fn never_reviewed_catalog_is_fully_due(n in 0..50i64, as_of in 0..20_000u64) {
        let store = MemoryStore::new();
        store
            .add_cards(USER, (1..=n).map(|i| Card::new(CardId(i), "f", "b")))
            .unwrap();
        let scheduler = Scheduler::new(store);

        let due = scheduler.fetch_due(USER, review_time(as_of).today).unwrap();
        prop_assert_eq!(due.len() as i64, n);
        prop_assert!(due.iter().all(|d| d.state.is_unreviewed()));
    }
}
