use crate::config::Config;
use crate::consts;
use crate::error_body::{error_message, names_missing_key};
use crate::stats::Stats;
use anyhow::Context;
use async_trait::async_trait;
use lingo_core::message::ConversationMessage;
use lingo_core::reply::{Reply, ReplyClient, ReplyError, Usage};
use lingo_core::tutor::DEFAULT_SYSTEM_PROMPT;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    messages: &'a [ConversationMessage],
    system_prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tutor_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    usage: Usage,
}

/// Requests tutor replies from `POST /api/chat`.
#[derive(Clone)]
pub struct HttpReplyClient {
    http: reqwest::Client,
    config: Config,
    stats: Arc<Mutex<Stats>>,
}

impl HttpReplyClient {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http = config
            .http_client()
            .context("failed to build the reply HTTP client")?;
        Ok(Self {
            http,
            config,
            stats: Arc::new(Mutex::new(Stats::new())),
        })
    }

    /// Token usage accumulated over every successful request so far.
    pub fn stats(&self) -> Stats {
        match self.stats.lock() {
            Ok(stats) => *stats,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn record(&self, usage: &Usage) {
        match self.stats.lock() {
            Ok(mut stats) => stats.update_usage(usage),
            Err(poisoned) => poisoned.into_inner().update_usage(usage),
        }
    }
}

#[async_trait]
impl ReplyClient for HttpReplyClient {
    async fn request_reply(
        &self,
        history: &[ConversationMessage],
        system_prompt: &str,
    ) -> Result<Reply, ReplyError> {
        if history.is_empty() {
            return Err(ReplyError::InvalidRequest(
                "conversation history is empty".to_string(),
            ));
        }
        if let Some(message) = history.iter().find(|m| !m.is_well_formed()) {
            return Err(ReplyError::InvalidRequest(format!(
                "message {} has no content",
                message.id
            )));
        }
        let url = self.config.endpoint(consts::CHAT_PATH).ok_or_else(|| {
            ReplyError::MissingCredential("the AI reply endpoint is not configured".to_string())
        })?;

        let system_prompt = if system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            system_prompt
        };
        let request = ChatRequest {
            messages: history,
            system_prompt,
            tutor_id: self.config.tutor_id(),
        };

        tracing::debug!("POST {url} with {} messages", history.len());
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReplyError::Unknown(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReplyError::Unknown(format!("failed to read reply body: {e}")))?;

        if !status.is_success() {
            let message = error_message(body);
            tracing::warn!("Reply request failed with {status}: {message}");
            return Err(classify_failure(status.as_u16(), message));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ReplyError::Unknown(format!("malformed reply body: {e}")))?;
        if !parsed.success {
            return Err(ReplyError::Unknown(
                "the reply endpoint did not report success".to_string(),
            ));
        }

        self.record(&parsed.usage);
        Ok(Reply {
            text: parsed.message,
            usage: parsed.usage,
        })
    }
}

/// Maps a failed `/api/chat` response onto a [`ReplyError`].
///
/// The status decides when it carries a category; otherwise the message text
/// is searched for a missing key, "API key", "rate limit" and "quota", in that
/// order.
pub(crate) fn classify_failure(status: u16, message: String) -> ReplyError {
    match status {
        401 | 403 => ReplyError::InvalidCredential(message),
        402 => ReplyError::QuotaExceeded(message),
        429 => ReplyError::RateLimited(message),
        _ => classify_text(message),
    }
}

fn classify_text(message: String) -> ReplyError {
    let lower = message.to_lowercase();
    if names_missing_key(&message) {
        ReplyError::MissingCredential(message)
    } else if lower.contains("api key") {
        ReplyError::InvalidCredential(message)
    } else if lower.contains("rate limit") {
        ReplyError::RateLimited(message)
    } else if lower.contains("quota") {
        ReplyError::QuotaExceeded(message)
    } else {
        ReplyError::Unknown(message)
    }
}
