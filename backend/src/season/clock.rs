//! Week arithmetic for seasons.
//!
//! Weeks are fixed 7×24h windows measured from the season start. There is
//! no calendar alignment and no timezone adjustment.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

pub const WEEK_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;
pub const DEFAULT_SEASON_WEEKS: u32 = 14;
pub const MIN_SEASON_WEEKS: u32 = 4;
pub const MAX_SEASON_WEEKS: u32 = 52;

/// Unclamped 1-based week index. A start in the future counts as week 1.
pub fn raw_week(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed = now.signed_duration_since(start).num_milliseconds();
    if elapsed <= 0 {
        return 1;
    }
    elapsed / WEEK_MILLIS + 1
}

/// Week index clamped to `1..=length_weeks`.
pub fn current_week(start: DateTime<Utc>, length_weeks: u32, now: DateTime<Utc>) -> u32 {
    let length = i64::from(length_weeks.max(1));
    raw_week(start, now).clamp(1, length) as u32
}

/// True once elapsed time has run past the last week.
pub fn has_expired(start: DateTime<Utc>, length_weeks: u32, now: DateTime<Utc>) -> bool {
    raw_week(start, now) > i64::from(length_weeks)
}

pub fn weeks_remaining(start: DateTime<Utc>, length_weeks: u32, now: DateTime<Utc>) -> u32 {
    length_weeks.saturating_sub(current_week(start, length_weeks, now))
}

/// When the season is scheduled to run out.
pub fn projected_end(start: DateTime<Utc>, length_weeks: u32) -> DateTime<Utc> {
    start + Duration::milliseconds(WEEK_MILLIS * i64::from(length_weeks))
}

pub fn clamp_season_length(weeks: u32) -> u32 {
    weeks.clamp(MIN_SEASON_WEEKS, MAX_SEASON_WEEKS)
}

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = *now + by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_days_in_is_week_two() {
        let now = Utc::now();
        let start = now - Duration::days(10);
        assert_eq!(current_week(start, 14, now), 2);
        assert!(!has_expired(start, 14, now));
        assert_eq!(weeks_remaining(start, 14, now), 12);
    }

    #[test]
    fn week_boundaries_are_exact() {
        let start = Utc::now();
        assert_eq!(raw_week(start, start), 1);
        assert_eq!(raw_week(start, start + Duration::days(7) - Duration::milliseconds(1)), 1);
        assert_eq!(raw_week(start, start + Duration::days(7)), 2);
    }

    #[test]
    fn future_start_is_week_one() {
        let now = Utc::now();
        assert_eq!(raw_week(now + Duration::days(3), now), 1);
        assert_eq!(current_week(now + Duration::days(30), 4, now), 1);
    }

    #[test]
    fn current_week_is_monotonic_and_clamped() {
        let start = Utc::now();
        let mut previous = 0;
        for day in 0..200 {
            let week = current_week(start, 14, start + Duration::days(day));
            assert!(week >= previous, "week went backwards on day {}", day);
            assert!(week <= 14);
            previous = week;
        }
        assert_eq!(previous, 14);
    }

    #[test]
    fn forty_days_exceeds_four_weeks() {
        let now = Utc::now();
        let start = now - Duration::days(40);
        assert!(has_expired(start, 4, now));
        assert_eq!(current_week(start, 4, now), 4);
        assert_eq!(weeks_remaining(start, 4, now), 0);
    }

    #[test]
    fn last_week_is_still_active() {
        let start = Utc::now();
        let in_last_week = start + Duration::days(4 * 7 - 1);
        assert!(!has_expired(start, 4, in_last_week));
        assert!(has_expired(start, 4, start + Duration::days(4 * 7)));
    }

    #[test]
    fn projected_end_spans_whole_season() {
        let start = Utc::now();
        assert_eq!(projected_end(start, 14), start + Duration::days(98));
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::days(8));
        assert_eq!(clock.now(), start + Duration::days(8));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn season_length_is_clamped() {
        assert_eq!(clamp_season_length(1), MIN_SEASON_WEEKS);
        assert_eq!(clamp_season_length(100), MAX_SEASON_WEEKS);
        assert_eq!(clamp_season_length(14), 14);
    }
}
