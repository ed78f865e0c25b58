use crate::application::{GenerationService, QuotaService};
use crate::infrastructure::{
    AppConfig, OpenAiCompatibleClient, PostgresAccountRepository, PostgresSessionRepository,
};
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

pub type QuotaServiceType = QuotaService<PostgresAccountRepository>;

pub type GenerationServiceType =
    GenerationService<PostgresAccountRepository, OpenAiCompatibleClient>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub sessions: Arc<PostgresSessionRepository>,
    pub quota: Arc<QuotaServiceType>,
    pub generation: Arc<GenerationServiceType>,
    pub admin_token: String,
    pub webhook_secret: String,
    pub upgrade_url: String,
}

/// Build full state from config + an existing pool.
///
/// Intended for embedding into a larger service that already manages a `PgPool`.
pub async fn build_state_with_pool(
    config: AppConfig,
    pool: PgPool,
    run_migrations: bool,
) -> anyhow::Result<AppState> {
    if run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;
    }

    let catalog = config.tier_catalog().context("load tier limits")?;

    let generator = Arc::new(
        OpenAiCompatibleClient::new(
            config.generator_base_url.clone(),
            &config.generator_api_key,
            config.generator_model.clone(),
            Duration::from_secs(config.generator_timeout_secs),
        )
        .context("init generation client")?,
    );

    let account_repo = Arc::new(PostgresAccountRepository::new(pool.clone()));
    let sessions = Arc::new(PostgresSessionRepository::new(pool.clone()));

    let quota = Arc::new(QuotaService::new(account_repo, catalog));
    let generation = Arc::new(GenerationService::new(quota.clone(), generator));

    Ok(AppState {
        pool,
        sessions,
        quota,
        generation,
        admin_token: config.admin_token,
        webhook_secret: config.webhook_secret,
        upgrade_url: config.upgrade_url,
    })
}

/// Build state for the standalone server.
///
/// Creates the `PgPool`, runs migrations, and wires repositories/services.
pub async fn build_state_from_env(config: AppConfig) -> anyhow::Result<AppState> {
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("connect database")?;
    build_state_with_pool(config, pool, true).await
}
