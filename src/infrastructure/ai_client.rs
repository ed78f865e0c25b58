use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("API request failed: {0}")]
    RequestFailed(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// e.g. "blog_post", "ad_copy", "email"
    pub content_type: Option<String>,
    pub tone: Option<String>,
    pub max_words: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub text: String,
    pub model: String,
}

/// External text-generation collaborator.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GeneratedContent, GeneratorError>;
}

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 500 | 502 | 503)
}

/// Client for any `/chat/completions` endpoint speaking the OpenAI schema.
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: String,
        api_key: &str,
        model: String,
        timeout: Duration,
    ) -> Result<Self, GeneratorError> {
        let mut headers = header::HeaderMap::new();
        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| GeneratorError::InvalidConfig(format!("Invalid API key format: {}", e)))?;
        headers.insert(header::AUTHORIZATION, auth_value);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                GeneratorError::InvalidConfig(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    async fn send_with_retry(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, GeneratorError> {
        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_RETRIES {
            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .json(body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status == 429 {
                        return Err(GeneratorError::RateLimited);
                    }

                    if is_retryable_status(status) && attempt < MAX_RETRIES - 1 {
                        warn!(status, attempt, "Generator returned retryable status");
                        sleep(Duration::from_millis(INITIAL_BACKOFF_MS * 2_u64.pow(attempt))).await;
                        continue;
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    if attempt < MAX_RETRIES - 1 {
                        sleep(Duration::from_millis(INITIAL_BACKOFF_MS * 2_u64.pow(attempt))).await;
                    }
                }
            }
        }

        Err(GeneratorError::RequestFailed(
            last_error.unwrap_or_else(|| "Max retries exceeded".to_string()),
        ))
    }
}

#[async_trait]
impl ContentGenerator for OpenAiCompatibleClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedContent, GeneratorError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt(request) },
                { "role": "user", "content": request.prompt },
            ],
        });

        let resp = self.send_with_retry(&body).await?;

        if !resp.status().is_success() {
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GeneratorError::RequestFailed(error_text));
        }

        let json_response: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GeneratorError::InvalidResponse(e.to_string()))?;

        parse_completion(&json_response, &self.model)
    }
}

fn system_prompt(request: &GenerationRequest) -> String {
    let mut prompt = String::from("You are a professional copywriter.");
    if let Some(content_type) = &request.content_type {
        prompt.push_str(&format!(" Write a {}.", content_type.replace('_', " ")));
    }
    if let Some(tone) = &request.tone {
        prompt.push_str(&format!(" Use a {} tone.", tone));
    }
    if let Some(max_words) = request.max_words {
        prompt.push_str(&format!(" Keep it under {} words.", max_words));
    }
    prompt
}

fn parse_completion(
    response: &serde_json::Value,
    default_model: &str,
) -> Result<GeneratedContent, GeneratorError> {
    let text = response
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GeneratorError::InvalidResponse("Missing completion content".to_string()))?;

    if text.trim().is_empty() {
        return Err(GeneratorError::InvalidResponse("Empty completion".to_string()));
    }

    let model = response
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or(default_model);

    Ok(GeneratedContent {
        text: text.to_string(),
        model: model.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_completion_reads_first_choice() {
        let response = json!({
            "model": "gpt-4o-mini-2024",
            "choices": [{ "message": { "role": "assistant", "content": "Hello there" } }]
        });
        let content = parse_completion(&response, "fallback").unwrap();
        assert_eq!(content.text, "Hello there");
        assert_eq!(content.model, "gpt-4o-mini-2024");
    }

    #[test]
    fn parse_completion_rejects_missing_or_empty_content() {
        assert!(parse_completion(&json!({ "choices": [] }), "m").is_err());
        let blank = json!({ "choices": [{ "message": { "content": "  " } }] });
        assert!(matches!(
            parse_completion(&blank, "m"),
            Err(GeneratorError::InvalidResponse(_))
        ));
    }

    #[test]
    fn system_prompt_includes_options() {
        let prompt = system_prompt(&GenerationRequest {
            prompt: "x".to_string(),
            content_type: Some("blog_post".to_string()),
            tone: Some("friendly".to_string()),
            max_words: Some(300),
        });
        assert!(prompt.contains("blog post"));
        assert!(prompt.contains("friendly tone"));
        assert!(prompt.contains("300 words"));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(502));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(429));
    }
}
