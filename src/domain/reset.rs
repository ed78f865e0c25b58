//! Calendar rollover for usage counters.
//!
//! Daily counters roll over at UTC midnight and monthly counters on the first
//! of the month, not on a rolling 24h / 30d window.

use super::usage::UsageCounters;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

pub fn daily_reset_due(daily_reset_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    daily_reset_at.date_naive() != now.date_naive()
}

pub fn monthly_reset_due(monthly_reset_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (monthly_reset_at.year(), monthly_reset_at.month()) != (now.year(), now.month())
}

pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(chrono::NaiveTime::MIN))
}

pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or(now.date_naive());
    Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN))
}

pub fn next_daily_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(now) + Duration::days(1)
}

pub fn next_monthly_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(now.date_naive());
    Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN))
}

/// Which counters a reset must zero, evaluated at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPlan {
    pub reset_daily: bool,
    pub reset_monthly: bool,
    pub now: DateTime<Utc>,
}

impl ResetPlan {
    pub fn for_counters(counters: &UsageCounters, now: DateTime<Utc>) -> Self {
        Self {
            reset_daily: daily_reset_due(counters.daily_reset_at, now),
            reset_monthly: monthly_reset_due(counters.monthly_reset_at, now),
            now,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.reset_daily && !self.reset_monthly
    }

    /// Apply the plan to a counter snapshot.
    pub fn apply(&self, counters: &UsageCounters) -> UsageCounters {
        let mut next = counters.clone();
        if self.reset_daily {
            next.daily_generation_count = 0;
            next.daily_reset_at = start_of_day(self.now);
        }
        if self.reset_monthly {
            next.monthly_word_count = 0;
            next.monthly_reset_at = start_of_month(self.now);
        }
        next
    }
}

/// Zero whichever counters have crossed a calendar boundary.
pub fn apply_reset(counters: &UsageCounters, now: DateTime<Utc>) -> UsageCounters {
    ResetPlan::for_counters(counters, now).apply(counters)
}

/// Counters after a plan change: everything zeroed and stamped at `now`,
/// whether or not a natural reset was due.
pub fn tier_change_reset(now: DateTime<Utc>) -> UsageCounters {
    UsageCounters::new(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn daily_boundary_is_calendar_not_rolling() {
        assert!(daily_reset_due(at(2024, 3, 9, 23, 59), at(2024, 3, 10, 0, 1)));
        assert!(!daily_reset_due(at(2024, 3, 10, 0, 0), at(2024, 3, 10, 23, 59)));
    }

    #[test]
    fn monthly_boundary_checks_year_too() {
        assert!(monthly_reset_due(at(2023, 3, 15, 0, 0), at(2024, 3, 15, 0, 0)));
        assert!(monthly_reset_due(at(2024, 2, 29, 23, 0), at(2024, 3, 1, 0, 0)));
        assert!(!monthly_reset_due(at(2024, 3, 1, 0, 0), at(2024, 3, 31, 23, 59)));
    }

    #[test]
    fn yesterday_daily_counter_is_zeroed_and_restamped() {
        let now = at(2024, 5, 20, 14, 30);
        let counters = UsageCounters {
            daily_generation_count: 4,
            daily_reset_at: at(2024, 5, 19, 8, 0),
            monthly_word_count: 1_200,
            monthly_reset_at: at(2024, 5, 1, 0, 0),
        };

        assert!(daily_reset_due(counters.daily_reset_at, now));
        let reset = apply_reset(&counters, now);

        assert_eq!(reset.daily_generation_count, 0);
        assert_eq!(reset.daily_reset_at, at(2024, 5, 20, 0, 0));
        assert_eq!(reset.monthly_word_count, 1_200);
        assert_eq!(reset.monthly_reset_at, counters.monthly_reset_at);
    }

    #[test]
    fn apply_reset_is_idempotent_within_period() {
        let now = at(2024, 6, 2, 9, 0);
        let counters = UsageCounters {
            daily_generation_count: 3,
            daily_reset_at: at(2024, 5, 31, 9, 0),
            monthly_word_count: 900,
            monthly_reset_at: at(2024, 5, 1, 0, 0),
        };

        let once = apply_reset(&counters, now);
        assert_eq!(once.monthly_reset_at, at(2024, 6, 1, 0, 0));

        let mut used = once.clone();
        used.daily_generation_count = 2;
        used.monthly_word_count = 40;

        let twice = apply_reset(&used, at(2024, 6, 2, 21, 0));
        assert_eq!(twice, used);
        assert!(ResetPlan::for_counters(&once, now).is_empty());
    }

    #[test]
    fn tier_change_restamps_both_to_now() {
        let now = at(2024, 7, 15, 12, 0);
        let counters = tier_change_reset(now);
        assert_eq!(counters.daily_generation_count, 0);
        assert_eq!(counters.monthly_word_count, 0);
        assert_eq!(counters.daily_reset_at, now);
        assert_eq!(counters.monthly_reset_at, now);
        assert!(ResetPlan::for_counters(&counters, at(2024, 7, 15, 23, 0)).is_empty());
    }

    #[test]
    fn next_reset_instants() {
        assert_eq!(next_daily_reset(at(2024, 2, 28, 13, 0)), at(2024, 2, 29, 0, 0));
        assert_eq!(next_monthly_reset(at(2024, 12, 31, 13, 0)), at(2025, 1, 1, 0, 0));
        assert_eq!(next_monthly_reset(at(2024, 1, 31, 0, 0)), at(2024, 2, 1, 0, 0));
    }
}
