use super::http_auth::{generate_api_token, is_admin_authorized, resolve_caller};
use super::http_errors::{map_generation_error, map_quota_error, map_refusal, map_webhook_error};
use super::http_types::{
    AccountResponse, AdmissionResponse, ChangeTierRequest, CreateAccountRequest,
    CreateAccountResponse, GenerateRequest, GenerateResponse, HealthResponse,
};
use super::state::AppState;
use crate::application::GenerationOutcome;
use crate::domain::{AdmissionDecision, Caller, Refusal, RefusalReason};
use crate::infrastructure::parse_billing_event;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;
use validator::Validate;

const SIGNATURE_HEADER: &str = "x-signature";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/accounts", post(create_account))
        .route("/accounts/:id/tier", put(change_tier))
        .route("/usage", get(get_usage))
        .route("/admission", post(check_admission))
        .route("/generate", post(generate))
        .route("/webhooks/billing", post(billing_webhook))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        create_account,
        change_tier,
        get_usage,
        check_admission,
        generate,
        billing_webhook,
    ),
    components(
        schemas(
            HealthResponse,
            CreateAccountRequest,
            CreateAccountResponse,
            ChangeTierRequest,
            AccountResponse,
            GenerateRequest,
            GenerateResponse,
            AdmissionResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Accounts", description = "Account and subscription administration"),
        (name = "Usage", description = "Quota snapshots and admission checks"),
        (name = "Generation", description = "Metered content generation"),
        (name = "Billing", description = "Payment provider webhooks"),
    ),
    info(
        title = "Wordsmith Quota API",
        version = "0.1.0",
        description = "Subscription usage metering and generation admission",
        license(name = "MIT")
    )
)]
struct ApiDoc;

/// Resolve the caller, turning storage failures into a 500 response.
async fn caller_or_error(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Caller, (StatusCode, Json<serde_json::Value>)> {
    resolve_caller(state, headers).await.map_err(|e| {
        error!(error = %e, "Failed to resolve caller session");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "Failed to resolve session"})),
        )
    })
}

fn refused(refusal: &Refusal, state: &AppState) -> (StatusCode, Json<serde_json::Value>) {
    let (status, body) = map_refusal(refusal, &state.upgrade_url);
    (status, Json(body))
}

fn admin_unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "Missing or invalid admin token"})),
    )
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Health check failed: DB connectivity issue");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    error: Some("Database connectivity failed".to_string()),
                }),
            )
        }
    }
}

/// Create an account with zeroed counters and issue its API token.
#[utoipa::path(
    post,
    path = "/accounts",
    tag = "Accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = CreateAccountResponse),
        (status = 400, description = "Invalid request or subscription tier", body = Object),
        (status = 401, description = "Missing or invalid admin token", body = Object),
        (status = 409, description = "Account already exists", body = Object),
        (status = 500, description = "Failed to create account", body = Object)
    )
)]
async fn create_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAccountRequest>,
) -> impl IntoResponse {
    if !is_admin_authorized(&headers, &state.admin_token) {
        return admin_unauthorized();
    }

    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid account request", "details": errors})),
        );
    }

    let api_token = generate_api_token();
    let account = match state
        .quota
        .create_account(req.external_id, &req.tier, &api_token)
        .await
    {
        Ok(account) => account,
        Err(e) => {
            warn!(error = %e, "Failed to create account");
            let (status, body) = map_quota_error(&e);
            return (status, Json(body));
        }
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!(CreateAccountResponse {
            id: account.id,
            tier: account.subscription_tier.to_string(),
            api_token,
        })),
    )
}

/// Change an account's tier. Both usage counters restart from zero.
#[utoipa::path(
    put,
    path = "/accounts/{id}/tier",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account ID")),
    request_body = ChangeTierRequest,
    responses(
        (status = 200, description = "Tier changed", body = AccountResponse),
        (status = 400, description = "Invalid subscription tier", body = Object),
        (status = 401, description = "Missing or invalid admin token", body = Object),
        (status = 404, description = "Account not found", body = Object)
    )
)]
async fn change_tier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<ChangeTierRequest>,
) -> impl IntoResponse {
    if !is_admin_authorized(&headers, &state.admin_token) {
        return admin_unauthorized();
    }

    match state.quota.change_tier(id, &req.tier).await {
        Ok(account) => (
            StatusCode::OK,
            Json(serde_json::json!(AccountResponse::from(account))),
        ),
        Err(e) => {
            warn!(error = %e, account_id = %id, "Tier change rejected");
            let (status, body) = map_quota_error(&e);
            (status, Json(body))
        }
    }
}

#[utoipa::path(
    get,
    path = "/usage",
    tag = "Usage",
    responses(
        (status = 200, description = "Usage snapshot", body = Object),
        (status = 401, description = "Authentication required", body = Object),
        (status = 404, description = "Account not found", body = Object)
    )
)]
async fn get_usage(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match caller_or_error(&state, &headers).await {
        Ok(Caller::User(id)) => id,
        Ok(Caller::Anonymous) => {
            return refused(&Refusal::new(RefusalReason::Unauthorized), &state)
        }
        Err(resp) => return resp,
    };

    match state.quota.get_usage_snapshot(user_id).await {
        Ok(snapshot) => (StatusCode::OK, Json(serde_json::json!(snapshot))),
        Err(e) => {
            error!(error = %e, user_id = %user_id, "Failed to load usage");
            let (status, body) = map_quota_error(&e);
            (status, Json(body))
        }
    }
}

/// Ask whether a generation would be admitted, without generating.
#[utoipa::path(
    post,
    path = "/admission",
    tag = "Usage",
    responses(
        (status = 200, description = "Admitted", body = AdmissionResponse),
        (status = 401, description = "Authentication required", body = Object),
        (status = 404, description = "Account not found", body = Object),
        (status = 429, description = "Daily or monthly limit reached", body = Object)
    )
)]
async fn check_admission(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let caller = match caller_or_error(&state, &headers).await {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };

    match state.quota.check_admission(&caller).await {
        Ok(AdmissionDecision::Admitted(admission)) => (
            StatusCode::OK,
            Json(serde_json::json!(AdmissionResponse::from(admission))),
        ),
        Ok(AdmissionDecision::Refused(refusal)) => refused(&refusal, &state),
        Err(e) => {
            error!(error = %e, "Admission check failed");
            let (status, body) = map_quota_error(&e);
            (status, Json(body))
        }
    }
}

#[utoipa::path(
    post,
    path = "/generate",
    tag = "Generation",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Content generated", body = GenerateResponse),
        (status = 400, description = "Invalid request", body = Object),
        (status = 401, description = "Authentication required", body = Object),
        (status = 429, description = "Daily or monthly limit reached", body = Object),
        (status = 502, description = "Content generation failed", body = Object)
    )
)]
async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> impl IntoResponse {
    let caller = match caller_or_error(&state, &headers).await {
        Ok(Caller::Anonymous) => {
            return refused(&Refusal::new(RefusalReason::Unauthorized), &state)
        }
        Ok(caller) => caller,
        Err(resp) => return resp,
    };

    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid generation request", "details": errors})),
        );
    }

    match state.generation.generate(&caller, req.into()).await {
        Ok(GenerationOutcome::Generated {
            content,
            words,
            usage,
        }) => (
            StatusCode::OK,
            Json(serde_json::json!(GenerateResponse {
                content: content.text,
                model: content.model,
                words,
                daily_generation_count: usage.daily_generation_count,
                monthly_word_count: usage.monthly_word_count,
            })),
        ),
        Ok(GenerationOutcome::Refused(refusal)) => refused(&refusal, &state),
        Err(e) => {
            let (status, body) = map_generation_error(&e);
            (status, Json(body))
        }
    }
}

/// Subscription change pushed by the payment provider.
#[utoipa::path(
    post,
    path = "/webhooks/billing",
    tag = "Billing",
    request_body = Object,
    responses(
        (status = 200, description = "Tier updated", body = Object),
        (status = 400, description = "Malformed payload or invalid tier", body = Object),
        (status = 401, description = "Invalid signature", body = Object),
        (status = 404, description = "Account not found", body = Object)
    )
)]
async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let change = match parse_billing_event(&state.webhook_secret, &body, signature) {
        Ok(change) => change,
        Err(e) => {
            warn!(error = %e, "Rejected billing webhook");
            let (status, body) = map_webhook_error(&e);
            return (status, Json(body));
        }
    };

    match state
        .quota
        .change_tier_by_external_id(&change.external_id, change.tier)
        .await
    {
        Ok(account) => {
            info!(account_id = %account.id, tier = %change.tier, "Applied billing tier change");
            (
                StatusCode::OK,
                Json(serde_json::json!({"status": "ok", "tier": change.tier})),
            )
        }
        Err(e) => {
            error!(error = %e, external_id = %change.external_id, "Failed to apply billing tier change");
            let (status, body) = map_quota_error(&e);
            (status, Json(body))
        }
    }
}
