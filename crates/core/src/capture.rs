//! Speech Capture Adapter.
//!
//! Wraps a host speech-recognition capability into a start/stop contract with
//! exactly one result event per listen cycle. The open [`RecognitionStream`]
//! is the microphone claim: it lives inside the listen task, so the
//! microphone is released however that task ends (result, error, `stop()`,
//! or the adapter being dropped).

use crate::Ticket;
use crate::error::{CaptureError, CaptureErrorKind};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Host speech-recognition capability.
pub trait SpeechRecognizer: Send + Sync {
    /// Claims the microphone and begins recognition.
    ///
    /// Returns [`CaptureError::Unavailable`] when the host cannot recognize
    /// speech at all, or [`CaptureError::Failed`] when the claim is refused.
    fn open(&self) -> Result<Box<dyn RecognitionStream>, CaptureError>;
}

/// One recognition pass over a claimed microphone. Dropping it releases the microphone.
#[async_trait]
pub trait RecognitionStream: Send {
    async fn recognize(&mut self) -> Result<String, CaptureErrorKind>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Transcript { ticket: Ticket, text: String },
    Error { ticket: Ticket, kind: CaptureErrorKind },
}

pub struct SpeechCapture {
    recognizer: Arc<dyn SpeechRecognizer>,
    listening: Option<(Ticket, JoinHandle<()>)>,
}

impl SpeechCapture {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            listening: None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
            .as_ref()
            .is_some_and(|(_, task)| !task.is_finished())
    }

    /// Starts a listen cycle; its single outcome is sent on `events` tagged with `ticket`.
    pub fn start(
        &mut self,
        ticket: Ticket,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<(), CaptureError> {
        if self.is_listening() {
            return Err(CaptureError::AlreadyActive);
        }

        let mut stream = self.recognizer.open()?;
        tracing::debug!("Listening for speech ({ticket})");

        let task = tokio::spawn(async move {
            let outcome = stream.recognize().await;
            // Release the microphone before anyone reacts to the result.
            drop(stream);

            let event = match outcome {
                Ok(text) => CaptureEvent::Transcript { ticket, text },
                Err(kind) => CaptureEvent::Error { ticket, kind },
            };
            if events.send(event).is_err() {
                tracing::debug!("Capture event receiver dropped ({ticket})");
            }
        });

        self.listening = Some((ticket, task));
        Ok(())
    }

    /// Ends the current listen cycle without a result. The microphone is
    /// released by the time this returns. Safe to call at any time.
    pub async fn stop(&mut self) {
        if let Some((ticket, task)) = self.listening.take() {
            if !task.is_finished() {
                tracing::debug!("Stopping speech capture ({ticket})");
            }
            task.abort();
            // Resolves only after the task, and the stream it owns, is dropped.
            let _ = task.await;
        }
    }
}

impl Drop for SpeechCapture {
    fn drop(&mut self) {
        if let Some((_, task)) = self.listening.take() {
            task.abort();
        }
    }
}
