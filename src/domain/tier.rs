//! Subscription tiers and their quota limits.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

/// Sentinel limit meaning "no cap".
pub const UNLIMITED: i64 = -1;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionTier {
    Free,
    Pro,
    Plus,
}

/// Quota limits for one tier. `UNLIMITED` disables a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    pub monthly_word_limit: i64,
    pub daily_generation_limit: i64,
}

impl TierLimits {
    pub const fn new(daily_generation_limit: i64, monthly_word_limit: i64) -> Self {
        Self {
            monthly_word_limit,
            daily_generation_limit,
        }
    }

    pub const fn unlimited() -> Self {
        Self::new(UNLIMITED, UNLIMITED)
    }

    fn validate(&self) -> Result<(), TierCatalogError> {
        for value in [self.daily_generation_limit, self.monthly_word_limit] {
            if value < UNLIMITED {
                return Err(TierCatalogError::InvalidLimit(value));
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TierCatalogError {
    #[error("Invalid limit {0}: limits must be >= 0 or -1 for unlimited")]
    InvalidLimit(i64),
    #[error("Tier catalog is missing an entry for {0}")]
    MissingTier(SubscriptionTier),
}

/// Immutable tier -> limits table, passed explicitly into the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCatalog {
    limits: HashMap<SubscriptionTier, TierLimits>,
}

impl Default for TierCatalog {
    /// | Tier | Generations/day | Words/month |
    /// |------|-----------------|-------------|
    /// | free | 5               | 5 000       |
    /// | pro  | 100             | 100 000     |
    /// | plus | unlimited       | unlimited   |
    fn default() -> Self {
        let limits = HashMap::from([
            (SubscriptionTier::Free, TierLimits::new(5, 5_000)),
            (SubscriptionTier::Pro, TierLimits::new(100, 100_000)),
            (SubscriptionTier::Plus, TierLimits::unlimited()),
        ]);
        Self { limits }
    }
}

impl TierCatalog {
    /// Build a catalog from explicit limits. Every tier must be present.
    pub fn with_limits(
        entries: impl IntoIterator<Item = (SubscriptionTier, TierLimits)>,
    ) -> Result<Self, TierCatalogError> {
        let limits: HashMap<_, _> = entries.into_iter().collect();

        for tier in SubscriptionTier::iter() {
            let entry = limits.get(&tier).ok_or(TierCatalogError::MissingTier(tier))?;
            entry.validate()?;
        }

        Ok(Self { limits })
    }

    pub fn limits_for_tier(&self, tier: SubscriptionTier) -> TierLimits {
        // with_limits guarantees every tier; Default covers all variants.
        self.limits
            .get(&tier)
            .copied()
            .unwrap_or_else(|| self.free_limits())
    }

    /// Resolve limits by tier name. Unknown names get the free tier's limits.
    pub fn limits_for(&self, tier: &str) -> TierLimits {
        match parse_tier(tier) {
            Some(tier) => self.limits_for_tier(tier),
            None => self.free_limits(),
        }
    }

    fn free_limits(&self) -> TierLimits {
        self.limits
            .get(&SubscriptionTier::Free)
            .copied()
            .unwrap_or(TierLimits::new(0, 0))
    }
}

/// Strict tier parse. Returns `None` for names outside the catalog.
pub fn parse_tier(tier: &str) -> Option<SubscriptionTier> {
    SubscriptionTier::from_str(tier.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_matches_published_plans() {
        let catalog = TierCatalog::default();
        assert_eq!(catalog.limits_for("free"), TierLimits::new(5, 5_000));
        assert_eq!(catalog.limits_for("pro"), TierLimits::new(100, 100_000));
        assert_eq!(catalog.limits_for("plus"), TierLimits::unlimited());
    }

    #[test]
    fn unknown_tier_falls_back_to_free() {
        let catalog = TierCatalog::default();
        let free = catalog.limits_for("free");
        assert_eq!(catalog.limits_for("gold"), free);
        assert_eq!(catalog.limits_for("starter"), free);
        assert_eq!(catalog.limits_for("enterprise"), free);
        assert_eq!(catalog.limits_for(""), free);
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let catalog = TierCatalog::default();
        assert_eq!(catalog.limits_for(" PRO "), TierLimits::new(100, 100_000));
        assert_eq!(parse_tier("Plus"), Some(SubscriptionTier::Plus));
    }

    #[test]
    fn parse_tier_is_strict() {
        assert!(parse_tier("gold").is_none());
        assert!(parse_tier("starter").is_none());
    }

    #[test]
    fn custom_catalog_requires_every_tier() {
        let err = TierCatalog::with_limits([
            (SubscriptionTier::Free, TierLimits::new(1, 10)),
            (SubscriptionTier::Pro, TierLimits::new(2, 20)),
        ])
        .unwrap_err();
        assert_eq!(err, TierCatalogError::MissingTier(SubscriptionTier::Plus));
    }

    #[test]
    fn custom_catalog_rejects_limits_below_sentinel() {
        let err = TierCatalog::with_limits([
            (SubscriptionTier::Free, TierLimits::new(-2, 10)),
            (SubscriptionTier::Pro, TierLimits::new(2, 20)),
            (SubscriptionTier::Plus, TierLimits::unlimited()),
        ])
        .unwrap_err();
        assert_eq!(err, TierCatalogError::InvalidLimit(-2));
    }

    #[test]
    fn tier_display_is_snake_case() {
        assert_eq!(SubscriptionTier::Plus.to_string(), "plus");
        assert_eq!(
            serde_json::to_string(&SubscriptionTier::Pro).unwrap(),
            "\"pro\""
        );
    }
}
