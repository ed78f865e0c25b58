use super::state::AppState;
use crate::domain::Caller;
use crate::infrastructure::{Lookup, RepositoryError, SessionRepository};
use axum::http::{header, header::HeaderMap};
use rand::RngCore;

pub(super) const API_TOKEN_PREFIX: &str = "wsk_";

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

pub(super) fn is_admin_authorized(headers: &HeaderMap, expected_token: &str) -> bool {
    !expected_token.is_empty() && extract_bearer_token(headers) == Some(expected_token)
}

pub(super) fn generate_api_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", API_TOKEN_PREFIX, hex::encode(bytes))
}

/// Resolve the bearer token to a user. Missing or unknown tokens are anonymous.
pub(super) async fn resolve_caller(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Caller, RepositoryError> {
    let token = match extract_bearer_token(headers) {
        Some(t) if t.starts_with(API_TOKEN_PREFIX) => t,
        _ => return Ok(Caller::Anonymous),
    };

    Ok(match state.sessions.resolve(token).await? {
        Lookup::Found(user_id) => Caller::User(user_id),
        Lookup::NotFound => Caller::Anonymous,
    })
}
