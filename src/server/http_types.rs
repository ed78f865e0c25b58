use crate::domain::{Account, Admission, SubscriptionTier, UsageStats};
use crate::infrastructure::GenerationRequest;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, ToSchema)]
pub(super) struct HealthResponse {
    pub(super) status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(super) struct CreateAccountRequest {
    #[validate(length(min = 1, max = 255))]
    #[schema(example = "user_2abc")]
    pub(super) external_id: String,
    #[serde(default = "default_tier")]
    #[schema(example = "free")]
    pub(super) tier: String,
}

pub(super) fn default_tier() -> String {
    SubscriptionTier::Free.to_string()
}

#[derive(Serialize, ToSchema)]
pub(super) struct CreateAccountResponse {
    pub(super) id: Uuid,
    pub(super) tier: String,
    /// Shown once; only its hash is stored.
    pub(super) api_token: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct ChangeTierRequest {
    #[schema(example = "pro")]
    pub(super) tier: String,
}

#[derive(Serialize, ToSchema)]
pub(super) struct AccountResponse {
    pub(super) id: Uuid,
    pub(super) external_id: String,
    pub(super) tier: String,
    pub(super) daily_generation_count: i64,
    pub(super) monthly_word_count: i64,
    pub(super) daily_reset_at: chrono::DateTime<chrono::Utc>,
    pub(super) monthly_reset_at: chrono::DateTime<chrono::Utc>,
    pub(super) updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            external_id: account.external_id,
            tier: account.subscription_tier.to_string(),
            daily_generation_count: account.usage.daily_generation_count,
            monthly_word_count: account.usage.monthly_word_count,
            daily_reset_at: account.usage.daily_reset_at,
            monthly_reset_at: account.usage.monthly_reset_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(super) struct GenerateRequest {
    #[validate(length(min = 1, max = 8000))]
    pub(super) prompt: String,
    #[schema(example = "blog_post")]
    pub(super) content_type: Option<String>,
    #[schema(example = "friendly")]
    pub(super) tone: Option<String>,
    #[validate(range(min = 1, max = 4000))]
    pub(super) max_words: Option<u32>,
}

impl From<GenerateRequest> for GenerationRequest {
    fn from(req: GenerateRequest) -> Self {
        Self {
            prompt: req.prompt,
            content_type: req.content_type,
            tone: req.tone,
            max_words: req.max_words,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct GenerateResponse {
    pub(super) content: String,
    pub(super) model: String,
    pub(super) words: u32,
    pub(super) daily_generation_count: i64,
    pub(super) monthly_word_count: i64,
}

#[derive(Serialize, ToSchema)]
pub(super) struct AdmissionResponse {
    pub(super) admitted: bool,
    pub(super) tier: String,
    #[schema(value_type = Object)]
    pub(super) daily: UsageStats,
    #[schema(value_type = Object)]
    pub(super) monthly: UsageStats,
}

impl From<Admission> for AdmissionResponse {
    fn from(admission: Admission) -> Self {
        Self {
            admitted: true,
            tier: admission.tier.to_string(),
            daily: admission.daily,
            monthly: admission.monthly,
        }
    }
}
