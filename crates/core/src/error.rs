//! Errors surfaced to the presentation layer.
//!
//! Every collaborator failure (capture, reply, synthesis, playback) is folded
//! into a [`SessionError`] at the controller boundary. The category decides how
//! the front end presents it: configuration errors are fatal and shown apart
//! from transient ones, retryable errors may be retried by the caller.

use crate::reply::ReplyError;
use crate::synthesis::SynthesisError;
use thiserror::Error;

/// Why a listen cycle produced no transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureErrorKind {
    PermissionDenied,
    NoSpeechDetected,
    NetworkError,
    Other,
}

impl std::fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            CaptureErrorKind::PermissionDenied => "microphone permission denied",
            CaptureErrorKind::NoSpeechDetected => "no speech detected",
            CaptureErrorKind::NetworkError => "speech recognition network error",
            CaptureErrorKind::Other => "speech recognition failed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("speech recognition is not available on this host")]
    Unavailable,
    #[error("already listening")]
    AlreadyActive,
    #[error("{0}")]
    Failed(CaptureErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Billing problem: {0}")]
    Billing(String),
    #[error("Temporarily unavailable, try again later: {0}")]
    Retryable(String),
    #[error("Capture error: {0}")]
    Capture(CaptureError),
    #[error("Speech synthesis failed ({status}): {message}")]
    SynthesisUpstream { status: u16, message: String },
    #[error("Audio playback failed: {0}")]
    Playback(String),
    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl SessionError {
    /// Configuration errors cannot be fixed by trying again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Configuration(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Retryable(_))
    }
}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        SessionError::Capture(err)
    }
}

impl From<ReplyError> for SessionError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::MissingCredential(message) => SessionError::Configuration(message),
            ReplyError::InvalidCredential(message) => SessionError::Auth(message),
            ReplyError::RateLimited(message) => SessionError::Retryable(message),
            ReplyError::QuotaExceeded(message) => SessionError::Billing(message),
            ReplyError::InvalidRequest(message) | ReplyError::Unknown(message) => {
                SessionError::Unknown(message)
            }
        }
    }
}

impl From<SynthesisError> for SessionError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::MissingCredential(message) => SessionError::Configuration(message),
            SynthesisError::Upstream { status, message } => match status {
                401 | 403 => SessionError::Auth(message),
                402 => SessionError::Billing(message),
                429 => SessionError::Retryable(message),
                _ => SessionError::SynthesisUpstream { status, message },
            },
            SynthesisError::Transport(message) => SessionError::Unknown(message),
        }
    }
}
