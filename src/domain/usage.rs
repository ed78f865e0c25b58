use super::tier::UNLIMITED;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-account metered counters and the instants they were last reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub daily_generation_count: i64,
    pub daily_reset_at: DateTime<Utc>,
    pub monthly_word_count: i64,
    pub monthly_reset_at: DateTime<Utc>,
}

impl UsageCounters {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            daily_generation_count: 0,
            daily_reset_at: now,
            monthly_word_count: 0,
            monthly_reset_at: now,
        }
    }
}

/// Amount to add to an account's counters after a successful generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageDelta {
    pub daily_generation_delta: i64,
    pub monthly_word_delta: i64,
}

impl UsageDelta {
    pub fn generation(words_generated: u32) -> Self {
        Self {
            daily_generation_delta: 1,
            monthly_word_delta: i64::from(words_generated),
        }
    }
}

/// Derived view of one metered dimension. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub current: i64,
    pub limit: i64,
    /// `-1` when unlimited.
    pub remaining: i64,
    /// Share of the limit consumed, in `[0, 100]`. Always `0` when unlimited.
    pub percentage: f64,
    pub unlimited: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Safe,
    Warning,
    Danger,
}

pub fn compute_stats(current: i64, limit: i64) -> UsageStats {
    let current = current.max(0);

    if limit <= UNLIMITED {
        return UsageStats {
            current,
            limit: UNLIMITED,
            remaining: UNLIMITED,
            percentage: 0.0,
            unlimited: true,
        };
    }

    if limit == 0 {
        return UsageStats {
            current,
            limit,
            remaining: 0,
            percentage: 100.0,
            unlimited: false,
        };
    }

    let percentage = (current as f64 / limit as f64) * 100.0;

    UsageStats {
        current,
        limit,
        remaining: (limit - current).max(0),
        percentage: percentage.clamp(0.0, 100.0),
        unlimited: false,
    }
}

pub fn warning_level(percentage: f64) -> WarningLevel {
    if percentage >= 90.0 {
        WarningLevel::Danger
    } else if percentage >= 75.0 {
        WarningLevel::Warning
    } else {
        WarningLevel::Safe
    }
}

impl UsageStats {
    pub fn is_exhausted(&self) -> bool {
        !self.unlimited && self.current >= self.limit
    }

    pub fn warning_level(&self) -> WarningLevel {
        warning_level(self.percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_within_limit() {
        for limit in [1_i64, 5, 7, 100, 5_000] {
            for current in 0..=limit.min(50) {
                let stats = compute_stats(current, limit);
                assert_eq!(stats.remaining, limit - current);
                let expected = current as f64 / limit as f64 * 100.0;
                assert!((stats.percentage - expected).abs() < 1e-9);
                assert!(!stats.unlimited);
            }
        }
    }

    #[test]
    fn unlimited_never_reads_as_exhausted() {
        for current in [0_i64, 1, 10_000, 999_999] {
            let stats = compute_stats(current, UNLIMITED);
            assert_eq!(stats.remaining, -1);
            assert_eq!(stats.percentage, 0.0);
            assert!(stats.unlimited);
            assert!(!stats.is_exhausted());
            assert_eq!(stats.warning_level(), WarningLevel::Safe);
        }
    }

    #[test]
    fn zero_limit_is_already_exhausted() {
        let stats = compute_stats(0, 0);
        assert_eq!(stats.remaining, 0);
        assert_eq!(stats.percentage, 100.0);
        assert!(stats.is_exhausted());
    }

    #[test]
    fn overage_is_clamped() {
        let stats = compute_stats(12, 5);
        assert_eq!(stats.remaining, 0);
        assert_eq!(stats.percentage, 100.0);
        assert!(stats.is_exhausted());
    }

    #[test]
    fn negative_current_is_treated_as_zero() {
        let stats = compute_stats(-3, 10);
        assert_eq!(stats.current, 0);
        assert_eq!(stats.remaining, 10);
        assert_eq!(stats.percentage, 0.0);
    }

    #[test]
    fn warning_thresholds() {
        assert_eq!(warning_level(0.0), WarningLevel::Safe);
        assert_eq!(warning_level(74.9), WarningLevel::Safe);
        assert_eq!(warning_level(75.0), WarningLevel::Warning);
        assert_eq!(warning_level(89.9), WarningLevel::Warning);
        assert_eq!(warning_level(90.0), WarningLevel::Danger);
        assert_eq!(warning_level(100.0), WarningLevel::Danger);
    }

    #[test]
    fn generation_delta_counts_one_generation() {
        let delta = UsageDelta::generation(250);
        assert_eq!(delta.daily_generation_delta, 1);
        assert_eq!(delta.monthly_word_delta, 250);
    }
}
