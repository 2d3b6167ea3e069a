use crate::config::Config;
use crate::consts;
use crate::error_body::{error_message, names_missing_key};
use anyhow::Context;
use async_trait::async_trait;
use lingo_core::synthesis::{AudioClip, DEFAULT_AUDIO_CONTENT_TYPE, SpeechSynthesizer, SynthesisError};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    language: &'a str,
}

/// Fetches spoken audio from `POST /api/tts`.
#[derive(Clone)]
pub struct HttpSynthesisClient {
    http: reqwest::Client,
    config: Config,
}

impl HttpSynthesisClient {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http = config
            .http_client()
            .context("failed to build the synthesis HTTP client")?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesisClient {
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioClip, SynthesisError> {
        let url = self.config.endpoint(consts::TTS_PATH).ok_or_else(|| {
            SynthesisError::MissingCredential(
                "the speech synthesis endpoint is not configured".to_string(),
            )
        })?;

        tracing::debug!("POST {url} ({} characters, {language})", text.len());
        let response = self
            .http
            .post(&url)
            .json(&TtsRequest { text, language })
            .send()
            .await
            .map_err(|e| SynthesisError::Transport(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(body);
            tracing::warn!("Synthesis failed with {status}: {message}");
            if status.is_server_error() && names_missing_key(&message) {
                return Err(SynthesisError::MissingCredential(message));
            }
            return Err(SynthesisError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_AUDIO_CONTENT_TYPE)
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Transport(format!("failed to read audio: {e}")))?;

        Ok(AudioClip::new(bytes.to_vec(), content_type))
    }
}
