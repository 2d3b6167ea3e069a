pub mod capture;
pub mod error;
pub mod message;
pub mod playback;
pub mod reply;
pub mod runtime;
pub mod session_state;
pub mod synthesis;
pub mod tutor;

#[cfg(test)]
mod test_support;

use crate::error::{CaptureError, SessionError};
use crate::message::ConversationMessage;
use crate::playback::AudioHandle;
use crate::reply::{Reply, ReplyError};
use crate::synthesis::{AudioClip, SynthesisError};

/// Tags one outstanding operation (listen cycle, reply request or synthesis request).
///
/// Completions carrying a ticket the controller no longer waits for are stale
/// and get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub u64);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ticket#{}", self.0)
    }
}

/// Everything the `SessionController` reacts to: user intents from the
/// presentation layer and completions of the work it asked for.
#[derive(Debug, Clone)]
pub enum Input {
    ActivateMic,
    SetSpeechEnabled(bool),
    SetAutoSpeak(bool),
    SetVolume(f32),
    Transcript { ticket: Ticket, text: String },
    CaptureFailed { ticket: Ticket, error: CaptureError },
    ReplyReceived { ticket: Ticket, result: Result<Reply, ReplyError> },
    SynthesisFinished { ticket: Ticket, result: Result<AudioClip, SynthesisError> },
    PlaybackStarted { handle: AudioHandle },
    PlaybackEnded { handle: AudioHandle },
    PlaybackFailed { handle: AudioHandle, message: String },
    Shutdown,
}

impl From<capture::CaptureEvent> for Input {
    fn from(event: capture::CaptureEvent) -> Self {
        match event {
            capture::CaptureEvent::Transcript { ticket, text } => Input::Transcript { ticket, text },
            capture::CaptureEvent::Error { ticket, kind } => Input::CaptureFailed {
                ticket,
                error: CaptureError::Failed(kind),
            },
        }
    }
}

/// Side effects the `SessionController` asks the runtime to carry out.
///
/// Keeping decisions (controller) apart from execution (runtime) lets the
/// state machine be driven synchronously in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartCapture { ticket: Ticket },
    StopCapture,
    RequestReply {
        ticket: Ticket,
        history: Vec<ConversationMessage>,
        system_prompt: String,
    },
    Synthesize { ticket: Ticket, text: String, language: String },
    Play { handle: AudioHandle, clip: AudioClip, volume: f32 },
    ReleaseAudio { handle: AudioHandle },
    /// Forget an in-flight request; its result will be ignored.
    Abandon { ticket: Ticket },
    /// Surface an error to the presentation layer.
    Notify(SessionError),
}
