//! Wordsmith Quota
//!
//! Subscription usage metering for the Wordsmith AI writer: tier limits,
//! daily/monthly counters with calendar resets, and the admission check run
//! before every content generation.
//!
//! ## Standalone
//!
//! Run the binary:
//! ```bash
//! wordsmith-quota-server
//! ```
//!
//! ## Embedded (Axum)
//!
//! When the `server` feature is enabled, this crate can be nested into the
//! dashboard's Axum app:
//! ```rust,ignore
//! use axum::Router;
//! use wordsmith_quota::infrastructure::AppConfig;
//! use wordsmith_quota::server::{build_state_with_pool, router};
//! use sqlx::PgPool;
//!
//! let cfg = AppConfig::from_env()?;
//! let pool = PgPool::connect(&cfg.database_url).await?;
//! let state = build_state_with_pool(cfg, pool, true).await?;
//! let app = Router::new().nest("/quota", router(state));
//! ```
//!
//! ## Library
//!
//! ```rust,ignore
//! use wordsmith_quota::{AdmissionDecision, Caller, QuotaService, TierCatalog};
//!
//! let quota = QuotaService::new(repo, TierCatalog::default());
//! match quota.check_admission(&Caller::User(user_id)).await? {
//!     AdmissionDecision::Admitted(_) => { /* call the model, then record_usage */ }
//!     AdmissionDecision::Refused(refusal) => { /* map refusal.reason to a response */ }
//! }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(feature = "server")]
pub mod server;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;

#[cfg(feature = "server")]
pub use server::*;
