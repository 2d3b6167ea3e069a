//! `POST /api/chat`: one non-streaming tutor reply from OpenAI chat completions.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use bytes::Bytes;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Ava, a helpful AI language tutor. Be encouraging and supportive in your responses.";
const ERROR_PREFIX: &str = "Failed to get AI response: ";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    messages: Option<Vec<IncomingMessage>>,
    system_prompt: Option<String>,
    tutor_id: Option<String>,
}

/// Only the fields OpenAI needs; ids and timestamps are dropped.
#[derive(Deserialize, Serialize)]
struct IncomingMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Value,
}

#[derive(Deserialize)]
struct Choice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiErrorBody {
    error: OpenAiError,
}

#[derive(Deserialize)]
struct OpenAiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    tracing::info!("API/Chat: Request received.");

    let request: Option<ChatRequest> = serde_json::from_slice(&body).ok();
    let Some((messages, system_prompt, tutor_id)) = request.and_then(|r| {
        r.messages
            .filter(|m| !m.is_empty())
            .map(|m| (m, r.system_prompt, r.tutor_id))
    }) else {
        tracing::error!("API/Chat: Invalid or empty messages array received.");
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid or empty messages array provided.",
        ));
    };
    tracing::debug!(
        "API/Chat: {} messages for tutor {}",
        messages.len(),
        tutor_id.as_deref().unwrap_or("<none>")
    );

    let Some(api_key) = state.openai.api_key.as_ref() else {
        tracing::error!("OPENAI_API_KEY is not set in environment variables.");
        return Err(ApiError::internal(
            "Server configuration error: OpenAI API key is missing.",
        ));
    };

    let system_prompt = system_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
    let mut upstream_messages = vec![json!({ "role": "system", "content": system_prompt })];
    upstream_messages.extend(messages.iter().map(|m| json!(m)));

    tracing::info!("API/Chat: Calling OpenAI with model {}...", state.openai.model);
    let response = state
        .http
        .post(format!("{}/chat/completions", state.openai.base_url))
        .bearer_auth(api_key.expose_secret())
        .json(&json!({
            "model": state.openai.model,
            "messages": upstream_messages,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        }))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("API/Chat: OpenAI request failed: {e}");
            failure(None, &e.to_string())
        })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| failure(None, &e.to_string()))?;

    if !status.is_success() {
        let upstream = serde_json::from_str::<OpenAiErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(OpenAiError {
                message: text,
                code: None,
                kind: None,
            });
        tracing::error!("API/Chat: OpenAI answered {status}: {}", upstream.message);
        return Err(failure(Some((status, &upstream)), &upstream.message));
    }

    let completion: Completion = serde_json::from_str(&text)
        .map_err(|e| failure(None, &format!("Malformed OpenAI response: {e}")))?;
    let message = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    tracing::info!("API/Chat: OpenAI response received ({} characters)", message.len());
    Ok(Json(json!({
        "success": true,
        "message": message,
        "usage": completion.usage,
    })))
}

/// Classifies an upstream failure: the upstream status first, then the
/// message text.
fn failure(upstream: Option<(StatusCode, &OpenAiError)>, message: &str) -> ApiError {
    let (status, text) = match upstream {
        Some((StatusCode::UNAUTHORIZED, _)) => (StatusCode::UNAUTHORIZED, invalid_key()),
        Some((StatusCode::TOO_MANY_REQUESTS, error)) if is_quota(error) => {
            (StatusCode::PAYMENT_REQUIRED, quota_exceeded())
        }
        Some((StatusCode::TOO_MANY_REQUESTS, _)) => (StatusCode::TOO_MANY_REQUESTS, rate_limited()),
        _ => classify_text(message),
    };
    ApiError::new(status, format!("{ERROR_PREFIX}{text}"))
}

fn classify_text(message: &str) -> (StatusCode, String) {
    if message.contains("API key") {
        (StatusCode::UNAUTHORIZED, invalid_key())
    } else if message.contains("rate limit") {
        (StatusCode::TOO_MANY_REQUESTS, rate_limited())
    } else if message.contains("quota") {
        (StatusCode::PAYMENT_REQUIRED, quota_exceeded())
    } else if message.trim().is_empty() {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An unexpected error occurred.".to_string(),
        )
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
    }
}

fn is_quota(error: &OpenAiError) -> bool {
    error.code.as_deref() == Some("insufficient_quota")
        || error.kind.as_deref() == Some("insufficient_quota")
}

fn invalid_key() -> String {
    "OpenAI API key is invalid or missing.".to_string()
}

fn rate_limited() -> String {
    "OpenAI API rate limit exceeded. Please try again later.".to_string()
}

fn quota_exceeded() -> String {
    "OpenAI API quota exceeded. Please check your billing.".to_string()
}
