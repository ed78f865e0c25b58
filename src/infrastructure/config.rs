use crate::domain::{SubscriptionTier, TierCatalog, TierCatalogError, TierLimits};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,

    /// Bearer token for account and tier administration.
    pub admin_token: String,
    /// Shared secret for billing webhook signatures.
    pub webhook_secret: String,
    /// Shown to clients when a limit is reached.
    pub upgrade_url: String,

    // Text-generation API (OpenAI-compatible)
    pub generator_base_url: String,
    pub generator_api_key: String,
    pub generator_model: String,
    pub generator_timeout_secs: u64,

    pub tiers: TierLimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TierLimitsConfig {
    pub free: TierLimits,
    pub pro: TierLimits,
    pub plus: TierLimits,
}

impl TierLimitsConfig {
    pub fn to_catalog(&self) -> Result<TierCatalog, TierCatalogError> {
        TierCatalog::with_limits([
            (SubscriptionTier::Free, self.free),
            (SubscriptionTier::Pro, self.pro),
            (SubscriptionTier::Plus, self.plus),
        ])
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("WORDSMITH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 8080)?
            .set_default("admin_token", "")?
            .set_default("webhook_secret", "")?
            .set_default("upgrade_url", "https://wordsmith.app/pricing")?
            .set_default("generator_base_url", "https://api.openai.com/v1")?
            .set_default("generator_api_key", "")?
            .set_default("generator_model", "gpt-4o-mini")?
            .set_default("generator_timeout_secs", 60)?
            // Canonical plan limits; -1 means unlimited.
            .set_default("tiers.free.daily_generation_limit", 5)?
            .set_default("tiers.free.monthly_word_limit", 5_000)?
            .set_default("tiers.pro.daily_generation_limit", 100)?
            .set_default("tiers.pro.monthly_word_limit", 100_000)?
            .set_default("tiers.plus.daily_generation_limit", -1)?
            .set_default("tiers.plus.monthly_word_limit", -1)?
            .build()?;

        config.try_deserialize()
    }

    pub fn tier_catalog(&self) -> Result<TierCatalog, TierCatalogError> {
        self.tiers.to_catalog()
    }
}
