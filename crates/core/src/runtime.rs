//! Async execution of the session state machine.
//!
//! `SessionRuntime` owns the `SessionController` and runs it on a single event
//! loop. Collaborator calls (reply, synthesis, playback) run on spawned tasks
//! and post their completions back into the loop, so the controller only ever
//! sees one input at a time and history is mutated in completion order.

use crate::capture::{CaptureEvent, SpeechCapture, SpeechRecognizer};
use crate::error::SessionError;
use crate::playback::{AudioHandle, AudioPlayer};
use crate::reply::ReplyClient;
use crate::session_state::{SessionController, SessionSnapshot};
use crate::synthesis::{AudioClip, SpeechSynthesizer};
use crate::{Command, Input, Ticket};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

const INTENT_CAPACITY: usize = 32;
const NOTICE_CAPACITY: usize = 16;

/// The host capabilities and remote clients a session talks to.
pub struct Collaborators {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub replies: Arc<dyn ReplyClient>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub player: Arc<dyn AudioPlayer>,
}

#[derive(Debug, thiserror::Error)]
#[error("the session has ended")]
pub struct SessionClosed;

/// Presentation-side handle: sends intents, observes state.
///
/// Dropping every handle ends the session.
#[derive(Clone)]
pub struct SessionHandle {
    intents: mpsc::Sender<Input>,
    snapshots: watch::Receiver<SessionSnapshot>,
    notices: broadcast::Sender<SessionError>,
}

impl SessionHandle {
    pub async fn activate_mic(&self) -> Result<(), SessionClosed> {
        self.send(Input::ActivateMic).await
    }

    pub async fn set_speech_enabled(&self, enabled: bool) -> Result<(), SessionClosed> {
        self.send(Input::SetSpeechEnabled(enabled)).await
    }

    pub async fn set_auto_speak(&self, enabled: bool) -> Result<(), SessionClosed> {
        self.send(Input::SetAutoSpeak(enabled)).await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), SessionClosed> {
        self.send(Input::SetVolume(volume)).await
    }

    /// Stops listening, abandons in-flight requests and releases audio.
    pub async fn shutdown(&self) -> Result<(), SessionClosed> {
        self.send(Input::Shutdown).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Errors surfaced by the session, in the order they happened.
    pub fn notices(&self) -> broadcast::Receiver<SessionError> {
        self.notices.subscribe()
    }

    async fn send(&self, input: Input) -> Result<(), SessionClosed> {
        self.intents.send(input).await.map_err(|_| SessionClosed)
    }
}

pub struct SessionRuntime {
    controller: SessionController,
    capture: SpeechCapture,
    replies: Arc<dyn ReplyClient>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    intents: mpsc::Receiver<Input>,
    completions_tx: mpsc::UnboundedSender<Input>,
    completions: mpsc::UnboundedReceiver<Input>,
    capture_tx: mpsc::UnboundedSender<CaptureEvent>,
    capture_events: mpsc::UnboundedReceiver<CaptureEvent>,
    snapshots: watch::Sender<SessionSnapshot>,
    notices: broadcast::Sender<SessionError>,
    requests: HashMap<Ticket, JoinHandle<()>>,
    playback: Option<(AudioHandle, JoinHandle<()>)>,
}

impl SessionRuntime {
    pub fn new(controller: SessionController, collaborators: Collaborators) -> (Self, SessionHandle) {
        let (intents_tx, intents) = mpsc::channel(INTENT_CAPACITY);
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (capture_tx, capture_events) = mpsc::unbounded_channel();
        let (snapshots, snapshots_rx) = watch::channel(controller.snapshot());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let handle = SessionHandle {
            intents: intents_tx,
            snapshots: snapshots_rx,
            notices: notices.clone(),
        };
        let runtime = Self {
            controller,
            capture: SpeechCapture::new(collaborators.recognizer),
            replies: collaborators.replies,
            synthesizer: collaborators.synthesizer,
            player: collaborators.player,
            intents,
            completions_tx,
            completions,
            capture_tx,
            capture_events,
            snapshots,
            notices,
            requests: HashMap::new(),
            playback: None,
        };
        (runtime, handle)
    }

    /// Runs the session until it is shut down or every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("Session with {} is running", self.controller.tutor().name);

        while !self.controller.is_closed() {
            let input = tokio::select! {
                intent = self.intents.recv() => intent.unwrap_or(Input::Shutdown),
                Some(input) = self.completions.recv() => input,
                Some(event) = self.capture_events.recv() => Input::from(event),
            };
            self.step(input).await;
        }

        self.teardown().await;
        tracing::info!("Session ended");
    }

    async fn step(&mut self, input: Input) {
        for command in self.controller.handle(input) {
            self.execute(command).await;
        }
        self.snapshots.send_replace(self.controller.snapshot());
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::StartCapture { ticket } => {
                if let Err(error) = self.capture.start(ticket, self.capture_tx.clone()) {
                    self.complete(Input::CaptureFailed { ticket, error });
                }
            }
            Command::StopCapture => self.capture.stop().await,
            Command::RequestReply {
                ticket,
                history,
                system_prompt,
            } => {
                let replies = self.replies.clone();
                let tx = self.completions_tx.clone();
                self.track(ticket, async move {
                    tracing::debug!("Requesting reply for {} messages ({ticket})", history.len());
                    let result = replies.request_reply(&history, &system_prompt).await;
                    let _ = tx.send(Input::ReplyReceived { ticket, result });
                });
            }
            Command::Synthesize {
                ticket,
                text,
                language,
            } => {
                let synthesizer = self.synthesizer.clone();
                let tx = self.completions_tx.clone();
                self.track(ticket, async move {
                    tracing::debug!("Synthesizing {} characters ({ticket})", text.len());
                    let result = synthesizer.synthesize(&text, &language).await;
                    let _ = tx.send(Input::SynthesisFinished { ticket, result });
                });
            }
            Command::Play {
                handle,
                clip,
                volume,
            } => self.play(handle, clip, volume).await,
            Command::ReleaseAudio { handle } => {
                if let Some((current, task)) = self.playback.take() {
                    if current == handle {
                        release(task).await;
                        tracing::debug!("Released {handle}");
                    } else {
                        self.playback = Some((current, task));
                    }
                }
            }
            Command::Abandon { ticket } => {
                if let Some(task) = self.requests.remove(&ticket) {
                    task.abort();
                    tracing::debug!("Abandoned {ticket}");
                }
            }
            Command::Notify(error) => {
                if error.is_fatal() {
                    tracing::error!("{error}");
                } else {
                    tracing::warn!("{error}");
                }
                // No subscribers is fine; the error is already logged.
                let _ = self.notices.send(error);
            }
        }
    }

    async fn play(&mut self, handle: AudioHandle, clip: AudioClip, volume: f32) {
        if let Some((previous, task)) = self.playback.take() {
            tracing::debug!("{previous} superseded by {handle}");
            release(task).await;
        }

        let player = self.player.clone();
        let tx = self.completions_tx.clone();
        let task = tokio::spawn(async move {
            tracing::debug!("Loading {} bytes of {} ({handle})", clip.len(), clip.content_type);
            let mut playback = match player.load(clip, volume).await {
                Ok(playback) => playback,
                Err(err) => {
                    let _ = tx.send(Input::PlaybackFailed {
                        handle,
                        message: err.to_string(),
                    });
                    return;
                }
            };
            let _ = tx.send(Input::PlaybackStarted { handle });

            let outcome = playback.play().await;
            drop(playback);
            let input = match outcome {
                Ok(()) => Input::PlaybackEnded { handle },
                Err(err) => Input::PlaybackFailed {
                    handle,
                    message: err.to_string(),
                },
            };
            let _ = tx.send(input);
        });
        self.playback = Some((handle, task));
    }

    fn track<F>(&mut self, ticket: Ticket, work: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.requests.retain(|_, task| !task.is_finished());
        self.requests.insert(ticket, tokio::spawn(work));
    }

    fn complete(&self, input: Input) {
        // The receiver lives in `self`, so this cannot fail while we run.
        let _ = self.completions_tx.send(input);
    }

    async fn teardown(&mut self) {
        self.capture.stop().await;
        for (ticket, task) in self.requests.drain() {
            if !task.is_finished() {
                tracing::debug!("Ignoring the result of {ticket}");
            }
            task.abort();
        }
        if let Some((handle, task)) = self.playback.take() {
            release(task).await;
            tracing::debug!("Released {handle}");
        }
    }
}

/// Cancels a playback task and waits until its `Playback` has been dropped.
async fn release(task: JoinHandle<()>) {
    task.abort();
    let _ = task.await;
}
