use crate::application::{GenerationError, QuotaError};
use crate::domain::{Refusal, RefusalReason, SubscriptionTier};
use crate::infrastructure::{GeneratorError, WebhookError};
use axum::http::StatusCode;
use strum::IntoEnumIterator;

fn allowed_tiers() -> Vec<String> {
    SubscriptionTier::iter().map(|t| t.to_string()).collect()
}

pub(super) fn map_refusal(refusal: &Refusal, upgrade_url: &str) -> (StatusCode, serde_json::Value) {
    match refusal.reason {
        RefusalReason::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": "Authentication required", "reason": refusal.reason }),
        ),
        RefusalReason::AccountNotFound => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "Account not found", "reason": refusal.reason }),
        ),
        RefusalReason::DailyLimitReached | RefusalReason::MonthlyLimitReached => {
            let message = if refusal.reason == RefusalReason::DailyLimitReached {
                "Daily generation limit reached"
            } else {
                "Monthly word limit reached"
            };
            let mut body = serde_json::json!({
                "error": message,
                "reason": refusal.reason,
                "remaining": 0,
                "upgrade_url": upgrade_url,
            });
            if let Some(details) = &refusal.details {
                body["current"] = serde_json::json!(details.current);
                body["limit"] = serde_json::json!(details.limit);
                body["tier"] = serde_json::json!(details.tier);
            }
            (StatusCode::TOO_MANY_REQUESTS, body)
        }
    }
}

pub(super) fn map_quota_error(err: &QuotaError) -> (StatusCode, serde_json::Value) {
    match err {
        QuotaError::AccountNotFound(_) => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "Account not found" }),
        ),
        QuotaError::AccountExists(_) => (
            StatusCode::CONFLICT,
            serde_json::json!({ "error": "Account already exists" }),
        ),
        QuotaError::InvalidTier(_) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "error": "Invalid subscription tier",
                "allowed": allowed_tiers()
            }),
        ),
        QuotaError::Storage(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "Storage failure" }),
        ),
    }
}

pub(super) fn map_generation_error(err: &GenerationError) -> (StatusCode, serde_json::Value) {
    match err {
        GenerationError::Quota(e) => map_quota_error(e),
        GenerationError::Generator(GeneratorError::RateLimited) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({ "error": "Generation service is busy, please retry" }),
        ),
        GenerationError::Generator(_) => (
            StatusCode::BAD_GATEWAY,
            serde_json::json!({ "error": "Content generation failed" }),
        ),
    }
}

pub(super) fn map_webhook_error(err: &WebhookError) -> (StatusCode, serde_json::Value) {
    match err {
        WebhookError::NotConfigured => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({ "error": "Webhooks are not configured" }),
        ),
        WebhookError::InvalidSignature => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": "Invalid signature" }),
        ),
        WebhookError::MalformedPayload(_) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "Malformed payload" }),
        ),
        WebhookError::InvalidTier(_) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "error": "Invalid subscription tier",
                "allowed": allowed_tiers()
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{compute_stats, RefusalReason};

    #[test]
    fn limit_refusal_maps_to_429_with_details() {
        let refusal = Refusal::limit_reached(
            RefusalReason::DailyLimitReached,
            &compute_stats(5, 5),
            SubscriptionTier::Free,
        );
        let (status, body) = map_refusal(&refusal, "https://example.com/pricing");

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["reason"], "daily_limit_reached");
        assert_eq!(body["current"], 5);
        assert_eq!(body["limit"], 5);
        assert_eq!(body["remaining"], 0);
        assert_eq!(body["tier"], "free");
        assert_eq!(body["upgrade_url"], "https://example.com/pricing");
    }

    #[test]
    fn unauthorized_refusal_maps_to_401() {
        let (status, _) = map_refusal(&Refusal::new(RefusalReason::Unauthorized), "");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn invalid_tier_lists_allowed_values() {
        let (status, body) = map_quota_error(&QuotaError::InvalidTier("gold".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["allowed"], serde_json::json!(["free", "pro", "plus"]));
    }

    #[test]
    fn duplicate_account_maps_to_conflict() {
        let (status, body) = map_quota_error(&QuotaError::AccountExists("user_1".to_string()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Account already exists");
    }

    #[test]
    fn generator_failure_maps_to_bad_gateway() {
        let err = GenerationError::Generator(GeneratorError::RequestFailed("boom".to_string()));
        assert_eq!(map_generation_error(&err).0, StatusCode::BAD_GATEWAY);
    }
}
