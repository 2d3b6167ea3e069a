use crate::error::{CaptureError, CaptureErrorKind, SessionError};
use crate::message::{ConversationMessage, MessageId, MessageIds, Role};
use crate::playback::AudioHandle;
use crate::reply::ReplyError;
use crate::tutor::{INSTRUCTION_MESSAGE, TutorProfile};
use crate::{Command, Input, Ticket};
use serde::Serialize;

/// Where the session is within one conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnPhase {
    Idle,
    Listening,
    AwaitingReply,
    Speaking,
}

/// Avatar mood rendered by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Thinking,
    Happy,
    Surprised,
    Encouraging,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub speech_enabled: bool,
    pub auto_speak: bool,
    /// Playback volume in `0.0..=1.0`.
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            speech_enabled: true,
            auto_speak: true,
            volume: 0.8,
        }
    }
}

/// Read-only view of the session handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub turn_phase: TurnPhase,
    pub emotion: Emotion,
    pub has_started: bool,
    pub history: Vec<ConversationMessage>,
    pub settings: VoiceSettings,
}

impl SessionSnapshot {
    /// One-line prompt describing what the learner can do next.
    pub fn status_line(&self) -> &'static str {
        if !self.has_started {
            return "Click the mic to start conversation!";
        }
        match self.turn_phase {
            TurnPhase::Idle => "Ready to talk!",
            TurnPhase::Listening => "Listening...",
            TurnPhase::AwaitingReply => "AI is thinking...",
            TurnPhase::Speaking => "AI is speaking...",
        }
    }

    /// Whether the mic control should be enabled.
    pub fn mic_enabled(&self) -> bool {
        matches!(self.turn_phase, TurnPhase::Idle | TurnPhase::Listening)
    }
}

// The turn together with the one operation it is waiting on. Each phase owns
// at most one outstanding operation, so overlapping requests or two playing
// clips cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Idle,
    Listening(Ticket),
    AwaitingReply(Ticket),
    // Waiting for synthesized audio. Reported as `AwaitingReply`: the spoken
    // reply has not arrived yet.
    Synthesizing(Ticket),
    Speaking(AudioHandle),
}

/// The conversation state machine.
///
/// Consumes [`Input`]s and returns the [`Command`]s the runtime must execute.
/// It never performs I/O itself.
pub struct SessionController {
    tutor: TutorProfile,
    turn: Turn,
    emotion: Emotion,
    has_started: bool,
    history: Vec<ConversationMessage>,
    settings: VoiceSettings,
    message_ids: MessageIds,
    next_ticket: u64,
    next_audio: u64,
    closed: bool,
}

impl SessionController {
    pub fn new(tutor: TutorProfile) -> Self {
        Self::with_settings(tutor, VoiceSettings::default())
    }

    pub fn with_settings(tutor: TutorProfile, settings: VoiceSettings) -> Self {
        let mut message_ids = MessageIds::default();
        let instruction =
            ConversationMessage::new(message_ids.next(), Role::Assistant, INSTRUCTION_MESSAGE);
        Self {
            tutor,
            turn: Turn::Idle,
            emotion: Emotion::Neutral,
            has_started: false,
            history: vec![instruction],
            settings,
            message_ids,
            next_ticket: 0,
            next_audio: 0,
            closed: false,
        }
    }

    pub fn tutor(&self) -> &TutorProfile {
        &self.tutor
    }

    pub fn turn_phase(&self) -> TurnPhase {
        match self.turn {
            Turn::Idle => TurnPhase::Idle,
            Turn::Listening(_) => TurnPhase::Listening,
            Turn::AwaitingReply(_) | Turn::Synthesizing(_) => TurnPhase::AwaitingReply,
            Turn::Speaking(_) => TurnPhase::Speaking,
        }
    }

    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    pub fn settings(&self) -> VoiceSettings {
        self.settings
    }

    pub fn active_audio(&self) -> Option<AudioHandle> {
        match self.turn {
            Turn::Speaking(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            turn_phase: self.turn_phase(),
            emotion: self.emotion,
            has_started: self.has_started,
            history: self.history.clone(),
            settings: self.settings,
        }
    }

    pub fn handle(&mut self, input: Input) -> Vec<Command> {
        if self.closed {
            tracing::debug!("Session closed, ignoring {:?}", input);
            return vec![];
        }

        match input {
            Input::ActivateMic => self.activate_mic(),
            Input::SetSpeechEnabled(enabled) => self.set_speech_enabled(enabled),
            Input::SetAutoSpeak(enabled) => {
                self.settings.auto_speak = enabled;
                vec![]
            }
            Input::SetVolume(volume) => {
                self.settings.volume = volume.clamp(0.0, 1.0);
                vec![]
            }
            Input::Transcript { ticket, text } => self.on_transcript(ticket, text),
            Input::CaptureFailed { ticket, error } => {
                if self.turn != Turn::Listening(ticket) {
                    return self.stale("capture failure", ticket);
                }
                self.fail(error.into())
            }
            Input::ReplyReceived { ticket, result } => self.on_reply(ticket, result),
            Input::SynthesisFinished { ticket, result } => {
                if self.turn != Turn::Synthesizing(ticket) {
                    return self.stale("synthesis result", ticket);
                }
                match result {
                    Ok(clip) if clip.is_empty() => {
                        tracing::debug!("Synthesis returned no audio, nothing to play");
                        self.go_idle();
                        vec![]
                    }
                    Ok(clip) => {
                        let handle = AudioHandle(self.next_audio);
                        self.next_audio += 1;
                        self.turn = Turn::Speaking(handle);
                        vec![Command::Play {
                            handle,
                            clip,
                            volume: self.settings.volume,
                        }]
                    }
                    Err(err) => self.fail(err.into()),
                }
            }
            Input::PlaybackStarted { handle } => {
                if self.turn == Turn::Speaking(handle) {
                    self.emotion = Emotion::Happy;
                }
                vec![]
            }
            Input::PlaybackEnded { handle } => {
                if self.turn != Turn::Speaking(handle) {
                    return vec![];
                }
                self.go_idle();
                vec![Command::ReleaseAudio { handle }]
            }
            Input::PlaybackFailed { handle, message } => {
                if self.turn != Turn::Speaking(handle) {
                    return vec![];
                }
                self.fail(SessionError::Playback(message))
            }
            Input::Shutdown => self.shutdown(),
        }
    }

    fn activate_mic(&mut self) -> Vec<Command> {
        match self.turn {
            Turn::Idle if !self.has_started => self.start_conversation(),
            Turn::Idle => {
                let ticket = self.ticket();
                self.turn = Turn::Listening(ticket);
                self.emotion = Emotion::Thinking;
                vec![Command::StartCapture { ticket }]
            }
            // Pressing the mic again while listening ends the listen cycle.
            Turn::Listening(_) => {
                self.go_idle();
                vec![Command::StopCapture]
            }
            Turn::AwaitingReply(_) | Turn::Synthesizing(_) | Turn::Speaking(_) => {
                tracing::debug!("Mic is disabled while {:?}", self.turn_phase());
                vec![]
            }
        }
    }

    // The first press speaks the greeting instead of listening: audio may
    // only start after a user gesture.
    fn start_conversation(&mut self) -> Vec<Command> {
        self.has_started = true;
        let greeting = self.tutor.greeting();
        self.history = vec![ConversationMessage::new(
            self.message_ids.next(),
            Role::Assistant,
            greeting.clone(),
        )];
        tracing::info!("Conversation with {} started", self.tutor.name);

        if !self.settings.speech_enabled {
            return vec![];
        }
        let ticket = self.ticket();
        self.turn = Turn::Synthesizing(ticket);
        vec![Command::Synthesize {
            ticket,
            text: greeting,
            language: self.tutor.language_code.clone(),
        }]
    }

    fn on_transcript(&mut self, ticket: Ticket, text: String) -> Vec<Command> {
        if self.turn != Turn::Listening(ticket) {
            return self.stale("transcript", ticket);
        }
        let text = text.trim();
        if text.is_empty() {
            return self.fail(CaptureError::Failed(CaptureErrorKind::NoSpeechDetected).into());
        }

        self.append(Role::User, text);
        let ticket = self.ticket();
        self.turn = Turn::AwaitingReply(ticket);
        self.emotion = Emotion::Thinking;
        vec![Command::RequestReply {
            ticket,
            history: self.history.clone(),
            system_prompt: self.tutor.effective_system_prompt().to_string(),
        }]
    }

    fn on_reply(
        &mut self,
        ticket: Ticket,
        result: Result<crate::reply::Reply, ReplyError>,
    ) -> Vec<Command> {
        if self.turn != Turn::AwaitingReply(ticket) {
            return self.stale("reply", ticket);
        }
        let reply = match result {
            Ok(reply) if reply.text.trim().is_empty() => {
                return self.fail(SessionError::Unknown("the tutor sent an empty reply".into()));
            }
            Ok(reply) => reply,
            Err(err) => return self.fail(err.into()),
        };

        self.append(Role::Assistant, reply.text.trim());
        tracing::debug!(
            "Reply used {} tokens ({} prompt, {} completion)",
            reply.usage.total_tokens,
            reply.usage.prompt_tokens,
            reply.usage.completion_tokens
        );

        if self.settings.auto_speak && self.settings.speech_enabled && self.has_started {
            let ticket = self.ticket();
            self.turn = Turn::Synthesizing(ticket);
            vec![Command::Synthesize {
                ticket,
                text: reply.text.trim().to_string(),
                language: self.tutor.language_code.clone(),
            }]
        } else {
            self.go_idle();
            vec![]
        }
    }

    fn set_speech_enabled(&mut self, enabled: bool) -> Vec<Command> {
        self.settings.speech_enabled = enabled;
        if enabled {
            return vec![];
        }
        match self.turn {
            Turn::Speaking(handle) => {
                self.go_idle();
                vec![Command::ReleaseAudio { handle }]
            }
            Turn::Synthesizing(ticket) => {
                self.go_idle();
                vec![Command::Abandon { ticket }]
            }
            _ => vec![],
        }
    }

    fn shutdown(&mut self) -> Vec<Command> {
        let commands = match self.turn {
            Turn::Idle => vec![],
            Turn::Listening(_) => vec![Command::StopCapture],
            Turn::AwaitingReply(ticket) | Turn::Synthesizing(ticket) => {
                vec![Command::Abandon { ticket }]
            }
            Turn::Speaking(handle) => vec![Command::ReleaseAudio { handle }],
        };
        self.go_idle();
        self.closed = true;
        commands
    }

    // Error exit: back to idle without touching history.
    fn fail(&mut self, error: SessionError) -> Vec<Command> {
        let mut commands = Vec::with_capacity(2);
        match self.turn {
            Turn::Speaking(handle) => commands.push(Command::ReleaseAudio { handle }),
            Turn::Listening(_) => commands.push(Command::StopCapture),
            _ => {}
        }
        tracing::warn!("Turn failed in {:?}: {}", self.turn_phase(), error);
        self.go_idle();
        commands.push(Command::Notify(error));
        commands
    }

    fn stale(&self, what: &str, ticket: Ticket) -> Vec<Command> {
        tracing::debug!("Ignoring stale {what} ({ticket}) while {:?}", self.turn);
        vec![]
    }

    fn go_idle(&mut self) {
        self.turn = Turn::Idle;
        self.emotion = Emotion::Neutral;
    }

    fn ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    fn append(&mut self, role: Role, content: &str) -> MessageId {
        let id = self.message_ids.next();
        self.history.push(ConversationMessage::new(id, role, content));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::{Reply, Usage};
    use crate::synthesis::{AudioClip, SynthesisError};
    use crate::tutor::find_tutor;

    fn ava() -> TutorProfile {
        find_tutor("maria")
            .unwrap()
            .with_system_prompt("You are Ava, a cheerful tutor.")
            .with_native_language("English")
    }

    fn reply(text: &str) -> Result<Reply, ReplyError> {
        Ok(Reply {
            text: text.to_string(),
            usage: Usage::default(),
        })
    }

    fn audio() -> Result<AudioClip, SynthesisError> {
        Ok(AudioClip::new(vec![1, 2, 3], "audio/mpeg"))
    }

    fn synth_ticket(commands: &[Command]) -> Ticket {
        match commands {
            [Command::Synthesize { ticket, .. }] => *ticket,
            other => panic!("Expected a single Synthesize command, got {:?}", other),
        }
    }

    fn capture_ticket(commands: &[Command]) -> Ticket {
        match commands {
            [Command::StartCapture { ticket }] => *ticket,
            other => panic!("Expected a single StartCapture command, got {:?}", other),
        }
    }

    fn reply_ticket(commands: &[Command]) -> Ticket {
        match commands {
            [Command::RequestReply { ticket, .. }] => *ticket,
            other => panic!("Expected a single RequestReply command, got {:?}", other),
        }
    }

    fn play_handle(commands: &[Command]) -> AudioHandle {
        match commands {
            [Command::Play { handle, .. }] => *handle,
            other => panic!("Expected a single Play command, got {:?}", other),
        }
    }

    /// Drives the greeting through synthesis and playback back to idle.
    fn started(session: &mut SessionController) {
        let ticket = synth_ticket(&session.handle(Input::ActivateMic));
        let handle = play_handle(&session.handle(Input::SynthesisFinished { ticket, result: audio() }));
        session.handle(Input::PlaybackStarted { handle });
        session.handle(Input::PlaybackEnded { handle });
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
    }

    /// Runs one exchange (listen, transcript, reply, speech) and returns to idle.
    fn exchange(session: &mut SessionController, said: &str, answered: &str) {
        let ticket = capture_ticket(&session.handle(Input::ActivateMic));
        let ticket = reply_ticket(&session.handle(Input::Transcript {
            ticket,
            text: said.to_string(),
        }));
        let ticket = synth_ticket(&session.handle(Input::ReplyReceived {
            ticket,
            result: reply(answered),
        }));
        let handle = play_handle(&session.handle(Input::SynthesisFinished { ticket, result: audio() }));
        session.handle(Input::PlaybackEnded { handle });
    }

    #[test]
    fn test_new_session_shows_instruction() {
        let session = SessionController::new(ava());

        assert_eq!(session.turn_phase(), TurnPhase::Idle);
        assert_eq!(session.emotion(), Emotion::Neutral);
        assert!(!session.has_started());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].content, INSTRUCTION_MESSAGE);
        assert_eq!(
            session.snapshot().status_line(),
            "Click the mic to start conversation!"
        );
    }

    #[test]
    fn test_first_activation_speaks_greeting_without_listening() {
        let mut session = SessionController::new(ava());
        let greeting = ava().greeting();

        let commands = session.handle(Input::ActivateMic);

        // Only synthesis of the exact greeting; no capture, no reply request.
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            Command::Synthesize { text, language, .. } => {
                assert_eq!(text, &greeting);
                assert_eq!(language, "es");
            }
            other => panic!("Expected Synthesize, got {:?}", other),
        }
        assert!(session.has_started());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role, Role::Assistant);
        assert_eq!(session.history()[0].content, greeting);
        assert!(greeting.contains("Spanish") && greeting.contains("English"));
        assert!(session.history().iter().all(|m| m.role != Role::User));
    }

    #[test]
    fn test_greeting_audio_enters_speaking_and_plays() {
        let mut session = SessionController::new(ava());
        let ticket = synth_ticket(&session.handle(Input::ActivateMic));
        assert_eq!(session.turn_phase(), TurnPhase::AwaitingReply);

        let commands = session.handle(Input::SynthesisFinished { ticket, result: audio() });
        let handle = play_handle(&commands);

        assert_eq!(session.turn_phase(), TurnPhase::Speaking);
        assert_eq!(session.active_audio(), Some(handle));

        session.handle(Input::PlaybackStarted { handle });
        assert_eq!(session.emotion(), Emotion::Happy);

        let commands = session.handle(Input::PlaybackEnded { handle });
        assert_eq!(commands, vec![Command::ReleaseAudio { handle }]);
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
        assert_eq!(session.emotion(), Emotion::Neutral);
        assert_eq!(session.active_audio(), None);
    }

    #[test]
    fn test_greeting_is_only_placed_once() {
        let mut session = SessionController::new(ava());
        started(&mut session);

        let commands = session.handle(Input::ActivateMic);

        capture_ticket(&commands);
        assert_eq!(session.turn_phase(), TurnPhase::Listening);
        assert_eq!(session.emotion(), Emotion::Thinking);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_transcript_appends_user_message_and_requests_reply() {
        let mut session = SessionController::new(ava());
        started(&mut session);
        let ticket = capture_ticket(&session.handle(Input::ActivateMic));

        let commands = session.handle(Input::Transcript {
            ticket,
            text: "  Quiero aprender  ".to_string(),
        });

        match &commands[..] {
            [Command::RequestReply { history, system_prompt, .. }] => {
                assert_eq!(history.len(), 2);
                assert_eq!(history[1].role, Role::User);
                assert_eq!(history[1].content, "Quiero aprender");
                assert_eq!(system_prompt, "You are Ava, a cheerful tutor.");
            }
            other => panic!("Expected RequestReply, got {:?}", other),
        }
        assert_eq!(session.turn_phase(), TurnPhase::AwaitingReply);
        assert_eq!(session.emotion(), Emotion::Thinking);
    }

    #[test]
    fn test_exchanges_alternate_roles_with_unique_ids() {
        let mut session = SessionController::new(ava());
        started(&mut session);

        exchange(&mut session, "Hola", "¡Hola! ¿Cómo estás?");
        exchange(&mut session, "Bien, gracias", "¡Muy bien!");
        exchange(&mut session, "Adiós", "¡Hasta luego!");

        let history = session.history();
        assert_eq!(history.len(), 7);
        for pair in history[1..].chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
        let mut ids: Vec<_> = history.iter().map(|m| m.id).collect();
        let sorted = {
            let mut ids = ids.clone();
            ids.sort();
            ids
        };
        assert_eq!(ids, sorted, "ids follow creation order");
        ids.dedup();
        assert_eq!(ids.len(), history.len());
    }

    #[test]
    fn test_rate_limited_reply_leaves_history_unchanged() {
        let mut session = SessionController::new(ava());
        started(&mut session);
        let ticket = capture_ticket(&session.handle(Input::ActivateMic));
        let ticket = reply_ticket(&session.handle(Input::Transcript {
            ticket,
            text: "Hola".to_string(),
        }));
        let before = session.history().len();

        let commands = session.handle(Input::ReplyReceived {
            ticket,
            result: Err(ReplyError::RateLimited("slow down".into())),
        });

        assert_eq!(
            commands,
            vec![Command::Notify(SessionError::Retryable("slow down".into()))]
        );
        assert_eq!(session.history().len(), before);
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
        assert_eq!(session.emotion(), Emotion::Neutral);
    }

    #[test]
    fn test_empty_synthesis_goes_idle_without_speaking() {
        let mut session = SessionController::new(ava());
        let ticket = synth_ticket(&session.handle(Input::ActivateMic));

        let commands = session.handle(Input::SynthesisFinished {
            ticket,
            result: Ok(AudioClip::new(Vec::new(), "audio/mpeg")),
        });

        assert!(commands.is_empty());
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
        assert_eq!(session.active_audio(), None);
    }

    #[test]
    fn test_mic_is_ignored_while_awaiting_or_speaking() {
        let mut session = SessionController::new(ava());
        started(&mut session);
        assert!(session.snapshot().mic_enabled());
        let ticket = capture_ticket(&session.handle(Input::ActivateMic));
        assert!(session.snapshot().mic_enabled());
        let ticket = reply_ticket(&session.handle(Input::Transcript {
            ticket,
            text: "Hola".to_string(),
        }));

        let before = session.snapshot();
        assert!(!before.mic_enabled());
        assert!(session.handle(Input::ActivateMic).is_empty());
        assert_eq!(session.snapshot(), before);

        let ticket = synth_ticket(&session.handle(Input::ReplyReceived {
            ticket,
            result: reply("¡Hola!"),
        }));
        assert!(session.handle(Input::ActivateMic).is_empty());

        play_handle(&session.handle(Input::SynthesisFinished { ticket, result: audio() }));
        let before = session.snapshot();
        assert!(!before.mic_enabled());
        assert!(session.handle(Input::ActivateMic).is_empty());
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_synthesis_unauthorized_surfaces_auth_error() {
        let mut session = SessionController::new(ava());
        let ticket = synth_ticket(&session.handle(Input::ActivateMic));
        let history = session.history().to_vec();

        let commands = session.handle(Input::SynthesisFinished {
            ticket,
            result: Err(SynthesisError::Upstream {
                status: 401,
                message: "invalid key".into(),
            }),
        });

        assert_eq!(
            commands,
            vec![Command::Notify(SessionError::Auth("invalid key".into()))]
        );
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
        assert_eq!(session.history(), &history[..]);
        assert_eq!(session.active_audio(), None);
    }

    #[test]
    fn test_synthesis_failure_keeps_text_reply() {
        let mut session = SessionController::new(ava());
        started(&mut session);
        let ticket = capture_ticket(&session.handle(Input::ActivateMic));
        let ticket = reply_ticket(&session.handle(Input::Transcript {
            ticket,
            text: "Hola".to_string(),
        }));
        let ticket = synth_ticket(&session.handle(Input::ReplyReceived {
            ticket,
            result: reply("¡Hola!"),
        }));

        let commands = session.handle(Input::SynthesisFinished {
            ticket,
            result: Err(SynthesisError::Upstream {
                status: 500,
                message: "boom".into(),
            }),
        });

        assert!(matches!(
            &commands[..],
            [Command::Notify(SessionError::SynthesisUpstream { status: 500, .. })]
        ));
        assert_eq!(session.history().last().unwrap().content, "¡Hola!");
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
    }

    #[test]
    fn test_reply_without_auto_speak_goes_idle() {
        let mut session = SessionController::new(ava());
        started(&mut session);
        session.handle(Input::SetAutoSpeak(false));
        let ticket = capture_ticket(&session.handle(Input::ActivateMic));
        let ticket = reply_ticket(&session.handle(Input::Transcript {
            ticket,
            text: "Hola".to_string(),
        }));

        let commands = session.handle(Input::ReplyReceived {
            ticket,
            result: reply("¡Hola!"),
        });

        assert!(commands.is_empty());
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
        assert_eq!(session.emotion(), Emotion::Neutral);
        assert_eq!(session.history().len(), 3);
    }

    #[test]
    fn test_capture_error_returns_to_idle() {
        let mut session = SessionController::new(ava());
        started(&mut session);
        let ticket = capture_ticket(&session.handle(Input::ActivateMic));

        let commands = session.handle(Input::CaptureFailed {
            ticket,
            error: CaptureError::Failed(CaptureErrorKind::PermissionDenied),
        });

        assert!(commands.contains(&Command::Notify(SessionError::Capture(
            CaptureError::Failed(CaptureErrorKind::PermissionDenied)
        ))));
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
        assert_eq!(session.emotion(), Emotion::Neutral);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_blank_transcript_counts_as_no_speech() {
        let mut session = SessionController::new(ava());
        started(&mut session);
        let ticket = capture_ticket(&session.handle(Input::ActivateMic));

        let commands = session.handle(Input::Transcript {
            ticket,
            text: "   ".to_string(),
        });

        assert!(commands.contains(&Command::Notify(SessionError::Capture(
            CaptureError::Failed(CaptureErrorKind::NoSpeechDetected)
        ))));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_second_press_while_listening_stops_capture() {
        let mut session = SessionController::new(ava());
        started(&mut session);
        let ticket = capture_ticket(&session.handle(Input::ActivateMic));

        assert_eq!(session.handle(Input::ActivateMic), vec![Command::StopCapture]);
        assert_eq!(session.turn_phase(), TurnPhase::Idle);

        // A transcript from the stopped cycle is stale.
        assert!(session
            .handle(Input::Transcript {
                ticket,
                text: "late".to_string()
            })
            .is_empty());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_stale_reply_is_ignored() {
        let mut session = SessionController::new(ava());
        started(&mut session);

        let commands = session.handle(Input::ReplyReceived {
            ticket: Ticket(999),
            result: reply("ghost"),
        });

        assert!(commands.is_empty());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_playback_failure_releases_audio() {
        let mut session = SessionController::new(ava());
        let ticket = synth_ticket(&session.handle(Input::ActivateMic));
        let handle = play_handle(&session.handle(Input::SynthesisFinished { ticket, result: audio() }));

        let commands = session.handle(Input::PlaybackFailed {
            handle,
            message: "device lost".into(),
        });

        assert_eq!(
            commands,
            vec![
                Command::ReleaseAudio { handle },
                Command::Notify(SessionError::Playback("device lost".into()))
            ]
        );
        assert_eq!(session.active_audio(), None);
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
    }

    #[test]
    fn test_disabling_speech_while_speaking_releases_audio() {
        let mut session = SessionController::new(ava());
        let ticket = synth_ticket(&session.handle(Input::ActivateMic));
        let handle = play_handle(&session.handle(Input::SynthesisFinished { ticket, result: audio() }));

        let commands = session.handle(Input::SetSpeechEnabled(false));

        assert_eq!(commands, vec![Command::ReleaseAudio { handle }]);
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
        assert!(!session.settings().speech_enabled);
    }

    #[test]
    fn test_first_activation_with_speech_disabled_only_greets() {
        let mut session = SessionController::new(ava());
        session.handle(Input::SetSpeechEnabled(false));

        let commands = session.handle(Input::ActivateMic);

        assert!(commands.is_empty());
        assert!(session.has_started());
        assert_eq!(session.history()[0].content, ava().greeting());
        assert_eq!(session.turn_phase(), TurnPhase::Idle);
    }

    #[test]
    fn test_volume_is_clamped_and_used_for_playback() {
        let mut session = SessionController::new(ava());
        session.handle(Input::SetVolume(3.5));
        assert_eq!(session.settings().volume, 1.0);

        session.handle(Input::SetVolume(0.25));
        let ticket = synth_ticket(&session.handle(Input::ActivateMic));
        match &session.handle(Input::SynthesisFinished { ticket, result: audio() })[..] {
            [Command::Play { volume, .. }] => assert_eq!(*volume, 0.25),
            other => panic!("Expected Play, got {:?}", other),
        }
    }

    #[test]
    fn test_shutdown_abandons_in_flight_reply_and_closes() {
        let mut session = SessionController::new(ava());
        started(&mut session);
        let ticket = capture_ticket(&session.handle(Input::ActivateMic));
        let ticket = reply_ticket(&session.handle(Input::Transcript {
            ticket,
            text: "Hola".to_string(),
        }));

        assert_eq!(session.handle(Input::Shutdown), vec![Command::Abandon { ticket }]);
        assert!(session.is_closed());

        // A late reply after teardown changes nothing.
        assert!(session
            .handle(Input::ReplyReceived {
                ticket,
                result: reply("late")
            })
            .is_empty());
        assert_eq!(session.history().len(), 2);
        assert!(session.handle(Input::ActivateMic).is_empty());
    }

    #[test]
    fn test_shutdown_while_speaking_releases_audio() {
        let mut session = SessionController::new(ava());
        let ticket = synth_ticket(&session.handle(Input::ActivateMic));
        let handle = play_handle(&session.handle(Input::SynthesisFinished { ticket, result: audio() }));

        assert_eq!(
            session.handle(Input::Shutdown),
            vec![Command::ReleaseAudio { handle }]
        );
        assert_eq!(session.active_audio(), None);
    }
}
