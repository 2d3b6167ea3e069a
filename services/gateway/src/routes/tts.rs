//! `POST /api/tts`: Eleven Labs text-to-speech, audio bytes passed through.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

const TTS_MODEL: &str = crate::config::DEFAULT_TTS_MODEL;
const STABILITY: f32 = 0.75;
const SIMILARITY_BOOST: f32 = 0.75;
const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

#[derive(Deserialize)]
struct TtsRequest {
    #[serde(default)]
    text: Option<String>,
    /// Accepted for logging; the voice is fixed by id.
    #[serde(default)]
    language: Option<String>,
}

pub async fn tts(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match synthesize(&state, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn synthesize(state: &AppState, body: Bytes) -> Result<Response, ApiError> {
    let request: TtsRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::internal(format!("Internal Server Error: {e}")))?;

    let Some(text) = request.text.filter(|t| !t.is_empty()) else {
        tracing::error!("TTS API: Text is required but missing.");
        return Ok((StatusCode::BAD_REQUEST, "Text is required").into_response());
    };

    let Some(api_key) = state.eleven_labs.api_key.as_ref() else {
        tracing::error!("ELEVEN_LABS_API_KEY is not set in environment variables.");
        return Err(ApiError::internal(
            "Server configuration error: Eleven Labs API key is missing.",
        ));
    };

    let preview: String = text.chars().take(50).collect();
    tracing::info!(
        "TTS API: Requesting speech ({}) for text: \"{preview}...\"",
        request.language.as_deref().unwrap_or("unspecified")
    );

    let response = state
        .http
        .post(format!(
            "{}/v1/text-to-speech/{}",
            state.eleven_labs.base_url, state.eleven_labs.voice_id
        ))
        .header("xi-api-key", api_key.expose_secret())
        .json(&json!({
            "text": text,
            "model_id": TTS_MODEL,
            "voice_settings": {
                "stability": STABILITY,
                "similarity_boost": SIMILARITY_BOOST,
            },
        }))
        .send()
        .await
        .map_err(|e| ApiError::internal(format!("Internal Server Error: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = upstream_message(&body);
        tracing::error!("Eleven Labs API Error: {status} {message}");
        // The upstream status is forwarded as-is.
        return Err(ApiError::new(
            status,
            format!("Eleven Labs API failed: {status} - {message}"),
        ));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    tracing::info!("TTS API: Received audio response with Content-Type: {content_type}");

    let audio = response
        .bytes()
        .await
        .map_err(|e| ApiError::internal(format!("Internal Server Error: {e}")))?;

    Ok(([(header::CONTENT_TYPE, content_type)], audio).into_response())
}

/// Eleven Labs reports errors as `{message}` or `{detail: {message}}`.
fn upstream_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return "Unknown error".to_string();
    };
    value
        .get("message")
        .or_else(|| value.pointer("/detail/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "No message".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_shapes() {
        assert_eq!(upstream_message(r#"{"message":"bad voice"}"#), "bad voice");
        assert_eq!(
            upstream_message(r#"{"detail":{"status":"invalid_api_key","message":"Invalid API key"}}"#),
            "Invalid API key"
        );
        assert_eq!(upstream_message(r#"{"detail":"nope"}"#), "No message");
        assert_eq!(upstream_message("<html>"), "Unknown error");
    }
}
