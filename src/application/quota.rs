use crate::domain::{
    compute_stats, decide, next_daily_reset, next_monthly_reset, parse_tier, Account,
    AdmissionDecision, Caller, Refusal, RefusalReason, ResetPlan, SubscriptionTier, TierCatalog,
    UsageCounters, UsageDelta, UsageStats, WarningLevel,
};
use crate::infrastructure::{AccountRepository, Lookup, RepositoryError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("Repository error: {0}")]
    Storage(#[from] RepositoryError),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Account already exists: {0}")]
    AccountExists(String),
    #[error("Invalid tier: {0}")]
    InvalidTier(String),
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Read-only usage view for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub tier: SubscriptionTier,
    pub daily: UsageStats,
    pub monthly: UsageStats,
    pub daily_warning: WarningLevel,
    pub monthly_warning: WarningLevel,
    pub daily_resets_at: DateTime<Utc>,
    pub monthly_resets_at: DateTime<Utc>,
}

pub struct QuotaService<A>
where
    A: AccountRepository,
{
    account_repo: Arc<A>,
    catalog: TierCatalog,
    clock: Clock,
}

impl<A> QuotaService<A>
where
    A: AccountRepository,
{
    pub fn new(account_repo: Arc<A>, catalog: TierCatalog) -> Self {
        Self::with_clock(account_repo, catalog, Arc::new(Utc::now))
    }

    pub fn with_clock(account_repo: Arc<A>, catalog: TierCatalog, clock: Clock) -> Self {
        Self {
            account_repo,
            catalog,
            clock,
        }
    }

    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    /// Create an account with zeroed counters, stored together with the API
    /// token the caller will authenticate with.
    pub async fn create_account(
        &self,
        external_id: String,
        tier: &str,
        api_token: &str,
    ) -> Result<Account, QuotaError> {
        let tier = parse_tier(tier).ok_or_else(|| QuotaError::InvalidTier(tier.to_string()))?;
        let account = Account::new_at(external_id, tier, (self.clock)());

        match self.account_repo.create_with_token(&account, api_token).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => {
                return Err(QuotaError::AccountExists(account.external_id))
            }
            Err(e) => return Err(e.into()),
        }
        info!(account_id = %account.id, tier = %tier, "Created account");

        Ok(account)
    }

    /// Gate run before an external generation call.
    ///
    /// Refusals come back as `AdmissionDecision::Refused`; only storage
    /// failures are errors.
    pub async fn check_admission(&self, caller: &Caller) -> Result<AdmissionDecision, QuotaError> {
        let user_id = match caller {
            Caller::User(id) => *id,
            Caller::Anonymous => {
                return Ok(AdmissionDecision::Refused(Refusal::new(
                    RefusalReason::Unauthorized,
                )))
            }
        };

        let account = match self.load_current(user_id).await? {
            Some(account) => account,
            None => {
                warn!(user_id = %user_id, "Admission check for user without account");
                return Ok(AdmissionDecision::Refused(Refusal::new(
                    RefusalReason::AccountNotFound,
                )));
            }
        };

        let (daily, monthly) = self.stats_for(&account);
        let decision = decide(user_id, account.subscription_tier, daily, monthly);

        if let Some(reason) = decision.refusal_reason() {
            info!(user_id = %user_id, tier = %account.subscription_tier, reason = %reason, "Generation refused");
        } else {
            debug!(user_id = %user_id, "Generation admitted");
        }

        Ok(decision)
    }

    /// Charge one generation and `words_generated` words. Call only after the
    /// external generation succeeded. A charge that lands after a period
    /// boundary counts toward the new period.
    pub async fn record_usage(
        &self,
        user_id: Uuid,
        words_generated: u32,
    ) -> Result<UsageCounters, QuotaError> {
        match self
            .account_repo
            .increment_counters(
                user_id,
                UsageDelta::generation(words_generated),
                (self.clock)(),
            )
            .await?
        {
            Lookup::Found(counters) => {
                debug!(
                    user_id = %user_id,
                    words = words_generated,
                    daily = counters.daily_generation_count,
                    monthly = counters.monthly_word_count,
                    "Recorded usage"
                );
                Ok(counters)
            }
            Lookup::NotFound => Err(QuotaError::AccountNotFound(user_id.to_string())),
        }
    }

    pub async fn get_usage_snapshot(&self, user_id: Uuid) -> Result<UsageSnapshot, QuotaError> {
        let account = self
            .load_current(user_id)
            .await?
            .ok_or_else(|| QuotaError::AccountNotFound(user_id.to_string()))?;

        let (daily, monthly) = self.stats_for(&account);
        let now = (self.clock)();

        Ok(UsageSnapshot {
            tier: account.subscription_tier,
            daily_warning: daily.warning_level(),
            monthly_warning: monthly.warning_level(),
            daily,
            monthly,
            daily_resets_at: next_daily_reset(now),
            monthly_resets_at: next_monthly_reset(now),
        })
    }

    /// Switch plans. Both counters restart from zero even when no natural
    /// reset is due.
    pub async fn change_tier(&self, user_id: Uuid, tier: &str) -> Result<Account, QuotaError> {
        let tier = parse_tier(tier).ok_or_else(|| QuotaError::InvalidTier(tier.to_string()))?;
        self.set_tier(user_id, tier).await
    }

    /// Tier change keyed by the identity provider's id (billing webhooks).
    pub async fn change_tier_by_external_id(
        &self,
        external_id: &str,
        tier: SubscriptionTier,
    ) -> Result<Account, QuotaError> {
        let account = self
            .account_repo
            .get_by_external_id(external_id)
            .await?
            .into_option()
            .ok_or_else(|| QuotaError::AccountNotFound(external_id.to_string()))?;

        self.set_tier(account.id, tier).await
    }

    async fn set_tier(&self, user_id: Uuid, tier: SubscriptionTier) -> Result<Account, QuotaError> {
        match self
            .account_repo
            .set_tier(user_id, tier, (self.clock)())
            .await?
        {
            Lookup::Found(account) => {
                info!(user_id = %user_id, tier = %tier, "Changed subscription tier, counters reset");
                Ok(account)
            }
            Lookup::NotFound => Err(QuotaError::AccountNotFound(user_id.to_string())),
        }
    }

    /// Load the account and roll over any counters whose period has ended.
    async fn load_current(&self, user_id: Uuid) -> Result<Option<Account>, QuotaError> {
        let mut account = match self.account_repo.get_account(user_id).await? {
            Lookup::Found(account) => account,
            Lookup::NotFound => return Ok(None),
        };

        let plan = ResetPlan::for_counters(&account.usage, (self.clock)());
        if plan.is_empty() {
            return Ok(Some(account));
        }

        match self.account_repo.reset_counters(user_id, plan).await? {
            Lookup::Found(counters) => {
                info!(
                    user_id = %user_id,
                    daily = plan.reset_daily,
                    monthly = plan.reset_monthly,
                    "Reset usage counters"
                );
                account.usage = counters;
                Ok(Some(account))
            }
            Lookup::NotFound => Ok(None),
        }
    }

    fn stats_for(&self, account: &Account) -> (UsageStats, UsageStats) {
        let limits = self.catalog.limits_for_tier(account.subscription_tier);
        (
            compute_stats(
                account.usage.daily_generation_count,
                limits.daily_generation_limit,
            ),
            compute_stats(account.usage.monthly_word_count, limits.monthly_word_limit),
        )
    }
}
