use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// Content type assumed when the synthesis endpoint does not name one.
pub const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Encoded audio returned by speech synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// A zero-length clip means "nothing to play"; it is not an error.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("missing credential: {0}")]
    MissingCredential(String),
    /// Non-success response from the synthesis endpoint, carried verbatim.
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },
    /// The request never produced a response (connection refused, body read failed).
    #[error("transport error: {0}")]
    Transport(String),
}

/// Turns reply text into playable audio.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<AudioClip, SynthesisError>;
}
