use crate::message::ConversationMessage;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token accounting reported alongside a reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default, alias = "prompt_tokens", alias = "inputTokens")]
    pub prompt_tokens: u64,
    #[serde(default, alias = "completion_tokens", alias = "outputTokens")]
    pub completion_tokens: u64,
    #[serde(default, alias = "total_tokens")]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub usage: Usage,
}

/// Failure categories of a reply request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    /// The completion endpoint (or its key) is not configured.
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    /// The request was rejected before reaching the provider.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Unknown(String),
}

// The `ReplyClient` trait is the seam between the session controller and
// whatever produces tutor replies. The runtime only depends on this trait, so
// tests drive it with `MockReplyClient` and the application plugs in the HTTP
// client from `lingo-client`.
//
// Implementations perform no retries; a `RateLimited` error goes straight back
// to the caller, which owns the retry policy.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait ReplyClient: Send + Sync {
    async fn request_reply(
        &self,
        history: &[ConversationMessage],
        system_prompt: &str,
    ) -> Result<Reply, ReplyError>;
}
