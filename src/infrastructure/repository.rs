use crate::domain::{Account, ResetPlan, SubscriptionTier, UsageCounters, UsageDelta};
use crate::domain::{start_of_day, start_of_month};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result of a keyed read or write: absence is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Lookup::NotFound, Lookup::Found)
    }
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert the account and its API token together. Either both are
    /// stored or neither is.
    #[must_use]
    async fn create_with_token(
        &self,
        account: &Account,
        api_token: &str,
    ) -> Result<(), RepositoryError>;
    #[must_use]
    async fn get_account(&self, id: Uuid) -> Result<Lookup<Account>, RepositoryError>;
    #[must_use]
    async fn get_by_external_id(&self, external_id: &str)
        -> Result<Lookup<Account>, RepositoryError>;
    /// Atomically add `delta` to the counters and return the new values.
    /// Implementations must not read-then-write. A counter whose period
    /// ended before `now` restarts from `delta` in the current period.
    #[must_use]
    async fn increment_counters(
        &self,
        id: Uuid,
        delta: UsageDelta,
        now: DateTime<Utc>,
    ) -> Result<Lookup<UsageCounters>, RepositoryError>;
    /// Zero the counters selected by `plan`. A counter already reset in the
    /// current period is left untouched.
    #[must_use]
    async fn reset_counters(
        &self,
        id: Uuid,
        plan: ResetPlan,
    ) -> Result<Lookup<UsageCounters>, RepositoryError>;
    /// Switch tier and zero both counters, stamping both resets at `now`.
    #[must_use]
    async fn set_tier(
        &self,
        id: Uuid,
        tier: SubscriptionTier,
        now: DateTime<Utc>,
    ) -> Result<Lookup<Account>, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    #[must_use]
    async fn resolve(&self, token: &str) -> Result<Lookup<Uuid>, RepositoryError>;
}

pub fn hash_api_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("sha256:{:x}", digest)
}

const ACCOUNT_COLUMNS: &str = "id, external_id, subscription_tier, daily_generation_count, \
     daily_reset_at, monthly_word_count, monthly_reset_at, created_at, updated_at";

const COUNTER_COLUMNS: &str =
    "daily_generation_count, daily_reset_at, monthly_word_count, monthly_reset_at";

pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn create_with_token(
        &self,
        account: &Account,
        api_token: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, external_id, subscription_tier,
                                  daily_generation_count, daily_reset_at,
                                  monthly_word_count, monthly_reset_at,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(account.id)
        .bind(&account.external_id)
        .bind(account.subscription_tier.to_string())
        .bind(account.usage.daily_generation_count)
        .bind(account.usage.daily_reset_at)
        .bind(account.usage.monthly_word_count)
        .bind(account.usage.monthly_reset_at)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("Account {}", account.external_id))
            }
            _ => RepositoryError::DatabaseError(e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO api_sessions (token_hash, account_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(hash_api_token(api_token))
        .bind(account.id)
        .bind(account.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Lookup<Account>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose().map(Lookup::from)
    }

    async fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Lookup<Account>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose().map(Lookup::from)
    }

    async fn increment_counters(
        &self,
        id: Uuid,
        delta: UsageDelta,
        now: DateTime<Utc>,
    ) -> Result<Lookup<UsageCounters>, RepositoryError> {
        // SET expressions all read the pre-update row, so the reset_at
        // comparisons see the old stamps.
        let row = sqlx::query(&format!(
            r#"
            UPDATE accounts
            SET daily_generation_count = CASE WHEN daily_reset_at < $3
                                              THEN $1 ELSE daily_generation_count + $1 END,
                daily_reset_at = CASE WHEN daily_reset_at < $3
                                      THEN $3 ELSE daily_reset_at END,
                monthly_word_count = CASE WHEN monthly_reset_at < $4
                                          THEN $2 ELSE monthly_word_count + $2 END,
                monthly_reset_at = CASE WHEN monthly_reset_at < $4
                                        THEN $4 ELSE monthly_reset_at END,
                updated_at = $5
            WHERE id = $6
            RETURNING {COUNTER_COLUMNS}
            "#
        ))
        .bind(delta.daily_generation_delta)
        .bind(delta.monthly_word_delta)
        .bind(start_of_day(now))
        .bind(start_of_month(now))
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_counters).transpose().map(Lookup::from)
    }

    async fn reset_counters(
        &self,
        id: Uuid,
        plan: ResetPlan,
    ) -> Result<Lookup<UsageCounters>, RepositoryError> {
        // The `< period start` guards make a second concurrent reset a no-op
        // instead of wiping increments that landed after the first one.
        let row = sqlx::query(&format!(
            r#"
            UPDATE accounts
            SET daily_generation_count = CASE WHEN $1 AND daily_reset_at < $3
                                              THEN 0 ELSE daily_generation_count END,
                daily_reset_at = CASE WHEN $1 AND daily_reset_at < $3
                                      THEN $3 ELSE daily_reset_at END,
                monthly_word_count = CASE WHEN $2 AND monthly_reset_at < $4
                                          THEN 0 ELSE monthly_word_count END,
                monthly_reset_at = CASE WHEN $2 AND monthly_reset_at < $4
                                        THEN $4 ELSE monthly_reset_at END,
                updated_at = $5
            WHERE id = $6
            RETURNING {COUNTER_COLUMNS}
            "#
        ))
        .bind(plan.reset_daily)
        .bind(plan.reset_monthly)
        .bind(start_of_day(plan.now))
        .bind(start_of_month(plan.now))
        .bind(plan.now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_counters).transpose().map(Lookup::from)
    }

    async fn set_tier(
        &self,
        id: Uuid,
        tier: SubscriptionTier,
        now: DateTime<Utc>,
    ) -> Result<Lookup<Account>, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE accounts
            SET subscription_tier = $1,
                daily_generation_count = 0,
                daily_reset_at = $2,
                monthly_word_count = 0,
                monthly_reset_at = $2,
                updated_at = $2
            WHERE id = $3
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(tier.to_string())
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose().map(Lookup::from)
    }
}

fn row_to_counters(row: &sqlx::postgres::PgRow) -> Result<UsageCounters, RepositoryError> {
    Ok(UsageCounters {
        daily_generation_count: row.try_get("daily_generation_count")?,
        daily_reset_at: row.try_get("daily_reset_at")?,
        monthly_word_count: row.try_get("monthly_word_count")?,
        monthly_reset_at: row.try_get("monthly_reset_at")?,
    })
}

fn row_to_account(row: &sqlx::postgres::PgRow) -> Result<Account, RepositoryError> {
    let tier_str: String = row.try_get("subscription_tier")?;
    let tier = SubscriptionTier::from_str(&tier_str)
        .map_err(|_| RepositoryError::InvalidData(format!("Unknown tier: {}", tier_str)))?;

    Ok(Account {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        subscription_tier: tier,
        usage: row_to_counters(row)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn resolve(&self, token: &str) -> Result<Lookup<Uuid>, RepositoryError> {
        let account_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT account_id
            FROM api_sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(hash_api_token(token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(account_id.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_api_token_is_stable_and_prefixed() {
        let token = "wsk_abc123";
        let hashed = hash_api_token(token);

        assert_eq!(hashed, hash_api_token(token));
        assert!(hashed.starts_with("sha256:"));
        assert_ne!(hashed, token);
    }

    #[test]
    fn lookup_from_option() {
        assert_eq!(Lookup::from(Some(3)), Lookup::Found(3));
        assert_eq!(Lookup::<i32>::from(None), Lookup::NotFound);
        assert_eq!(Lookup::Found(2).map(|v| v * 2).into_option(), Some(4));
    }
}
