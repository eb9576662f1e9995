//! Property tests for the range partitioner.
//!
//! Uses proptest to verify:
//! 1. Coverage: ranges are contiguous and their union is exactly the span
//! 2. Size: no range exceeds the chunk limit; only the last may be shorter
//! 3. Determinism: identical inputs give an identical sequence

use chrono::{Duration, NaiveDate};
use histfetch_core::range::{partition, DateRange, RangeError};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    // 2000-01-01 plus up to ~30 years.
    (0i64..11_000).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap() + Duration::days(offset)
    })
}

fn arb_span() -> impl Strategy<Value = (NaiveDate, NaiveDate)> {
    (arb_date(), 0i64..4_000).prop_map(|(start, len)| (start, start + Duration::days(len)))
}

fn arb_chunk() -> impl Strategy<Value = u32> {
    prop_oneof![1u32..5, 5u32..400, Just(100u32)]
}

// ── 1. Coverage ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ranges_cover_span_exactly((start, end) in arb_span(), chunk in arb_chunk()) {
        let ranges = partition(start, end, chunk).unwrap();

        prop_assert!(!ranges.is_empty());
        prop_assert_eq!(ranges.first().unwrap().start(), start);
        prop_assert_eq!(ranges.last().unwrap().end(), end);

        for pair in ranges.windows(2) {
            prop_assert_eq!(pair[0].end() + Duration::days(1), pair[1].start());
        }

        let covered: i64 = ranges.iter().map(DateRange::days).sum();
        prop_assert_eq!(covered, (end - start).num_days() + 1);
    }
}

// ── 2. Size ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ranges_respect_chunk_limit((start, end) in arb_span(), chunk in arb_chunk()) {
        let ranges = partition(start, end, chunk).unwrap();
        let (last, full) = ranges.split_last().unwrap();

        for range in full {
            prop_assert_eq!(range.days(), i64::from(chunk));
        }
        prop_assert!(last.days() >= 1);
        prop_assert!(last.days() <= i64::from(chunk));
        prop_assert!(ranges.iter().all(|r| r.start() <= r.end()));
    }

    #[test]
    fn range_count_matches_ceiling((start, end) in arb_span(), chunk in arb_chunk()) {
        let ranges = partition(start, end, chunk).unwrap();
        let days = (end - start).num_days() + 1;
        let chunk = i64::from(chunk);
        prop_assert_eq!(ranges.len() as i64, (days + chunk - 1) / chunk);
    }
}

// ── 3. Determinism and preconditions ─────────────────────────────────

proptest! {
    #[test]
    fn partition_is_deterministic((start, end) in arb_span(), chunk in arb_chunk()) {
        prop_assert_eq!(partition(start, end, chunk), partition(start, end, chunk));
    }

    #[test]
    fn single_day_is_one_range(day in arb_date(), chunk in arb_chunk()) {
        let ranges = partition(day, day, chunk).unwrap();
        prop_assert_eq!(ranges, vec![DateRange::single(day)]);
    }

    #[test]
    fn inverted_span_is_rejected((start, end) in arb_span(), chunk in arb_chunk()) {
        prop_assume!(start < end);
        let inverted = matches!(partition(end, start, chunk), Err(RangeError::Inverted { .. }));
        prop_assert!(inverted);
    }
}
