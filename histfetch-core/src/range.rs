//! Calendar date ranges and the fixed-size chunk partitioner.
//!
//! The history endpoint caps how many days a single request may span, so a
//! long span is split into contiguous windows of at most `chunk_limit` days
//! (both endpoints inclusive).

use chrono::{Days, Months, NaiveDate};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Precondition violations raised before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("range start {start} is after range end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },

    #[error("chunk limit must be at least 1 day")]
    ZeroChunkLimit,

    #[error("cannot step {years} years back from {from}")]
    OutOfCalendar { from: NaiveDate, years: u32 },
}

/// Inclusive span of calendar days. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one day.
    pub const fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, counting both endpoints.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Split `[start, end]` into contiguous, non-overlapping ranges of at most
/// `chunk_limit` days each, in ascending order.
///
/// The union of the returned ranges is exactly `[start, end]`; only the last
/// range may be shorter than `chunk_limit`.
pub fn partition(
    start: NaiveDate,
    end: NaiveDate,
    chunk_limit: u32,
) -> Result<Vec<DateRange>, RangeError> {
    if chunk_limit == 0 {
        return Err(RangeError::ZeroChunkLimit);
    }
    let span = DateRange::new(start, end)?;

    let step = Days::new(u64::from(chunk_limit) - 1);
    let expected = span.days() as usize / chunk_limit as usize + 1;
    let mut ranges = Vec::with_capacity(expected);
    let mut cursor = span.start;

    loop {
        // Saturate at the span end when the step would leave the calendar.
        let chunk_end = cursor
            .checked_add_days(step)
            .map_or(span.end, |d| d.min(span.end));
        ranges.push(DateRange {
            start: cursor,
            end: chunk_end,
        });

        match chunk_end.succ_opt() {
            Some(next) if next <= span.end => cursor = next,
            _ => break,
        }
    }

    Ok(ranges)
}

/// The default span: ends yesterday (today's data is still partial) and
/// starts `years` calendar years before that. Feb 29 clamps to Feb 28.
pub fn trailing_span(today: NaiveDate, years: u32) -> Result<DateRange, RangeError> {
    let end = today.pred_opt().ok_or(RangeError::OutOfCalendar {
        from: today,
        years: 0,
    })?;
    let start = years
        .checked_mul(12)
        .and_then(|months| end.checked_sub_months(Months::new(months)))
        .ok_or(RangeError::OutOfCalendar { from: end, years })?;
    DateRange::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn short_span_is_one_range() {
        let ranges = partition(date(2014, 1, 1), date(2014, 1, 5), 100).unwrap();
        assert_eq!(
            ranges,
            vec![DateRange::new(date(2014, 1, 1), date(2014, 1, 5)).unwrap()]
        );
    }

    #[test]
    fn splits_at_chunk_limit() {
        let ranges = partition(date(2014, 1, 1), date(2014, 4, 20), 100).unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].start(), date(2014, 1, 1));
        assert_eq!(ranges[0].end(), date(2014, 4, 10));
        assert_eq!(ranges[0].days(), 100);
        assert_eq!(ranges[1].start(), date(2014, 4, 11));
        assert_eq!(ranges[1].end(), date(2014, 4, 20));
    }

    #[test]
    fn single_day_span() {
        let ranges = partition(date(2020, 2, 29), date(2020, 2, 29), 100).unwrap();
        assert_eq!(ranges, vec![DateRange::single(date(2020, 2, 29))]);
        assert_eq!(ranges[0].days(), 1);
    }

    #[test]
    fn chunk_limit_of_one_gives_one_range_per_day() {
        let ranges = partition(date(2024, 12, 30), date(2025, 1, 2), 1).unwrap();
        assert_eq!(ranges.len(), 4);
        assert!(ranges.iter().all(|r| r.days() == 1));
    }

    #[test]
    fn exact_multiple_has_no_trailing_stub() {
        let ranges = partition(date(2014, 1, 1), date(2014, 1, 20), 10).unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].end(), date(2014, 1, 20));
        assert_eq!(ranges[1].days(), 10);
    }

    #[test]
    fn rejects_zero_chunk_limit() {
        assert_eq!(
            partition(date(2014, 1, 1), date(2014, 1, 5), 0),
            Err(RangeError::ZeroChunkLimit)
        );
    }

    #[test]
    fn rejects_inverted_span() {
        let err = partition(date(2014, 1, 5), date(2014, 1, 1), 100).unwrap_err();
        assert!(matches!(err, RangeError::Inverted { .. }));
    }

    #[test]
    fn end_of_calendar_does_not_overflow() {
        let end = NaiveDate::MAX;
        let start = end - chrono::Duration::days(3);
        let ranges = partition(start, end, u32::MAX).unwrap();
        assert_eq!(ranges, vec![DateRange::new(start, end).unwrap()]);
    }

    #[test]
    fn trailing_span_ends_yesterday() {
        let span = trailing_span(date(2024, 6, 15), 10).unwrap();
        assert_eq!(span.end(), date(2024, 6, 14));
        assert_eq!(span.start(), date(2014, 6, 14));
    }

    #[test]
    fn trailing_span_clamps_leap_day() {
        let span = trailing_span(date(2024, 3, 1), 1).unwrap();
        assert_eq!(span.end(), date(2024, 2, 29));
        assert_eq!(span.start(), date(2023, 2, 28));
    }

    #[test]
    fn display_uses_iso_dates() {
        let range = DateRange::new(date(2014, 1, 1), date(2014, 4, 10)).unwrap();
        assert_eq!(range.to_string(), "2014-01-01 to 2014-04-10");
    }
}
