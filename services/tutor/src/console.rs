//! Terminal stand-ins for the microphone: while a listen cycle is open, the
//! next line typed on stdin is its transcript.

use async_trait::async_trait;
use lingo_core::capture::{RecognitionStream, SpeechRecognizer};
use lingo_core::error::{CaptureError, CaptureErrorKind};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type Waiting = Arc<Mutex<Option<oneshot::Sender<String>>>>;

/// Recognizes "speech" by reading a typed line.
#[derive(Clone, Default)]
pub struct ConsoleRecognizer {
    waiting: Waiting,
}

impl ConsoleRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands `line` to the open listen cycle. Gives the line back when nobody listens.
    pub fn offer(&self, line: String) -> Result<(), String> {
        let sender = match self.waiting.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) if !tx.is_closed() => tx.send(line),
            _ => Err(line),
        }
    }
}

impl SpeechRecognizer for ConsoleRecognizer {
    fn open(&self) -> Result<Box<dyn RecognitionStream>, CaptureError> {
        let mut slot = self
            .waiting
            .lock()
            .map_err(|_| CaptureError::Failed(CaptureErrorKind::Other))?;
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(CaptureError::AlreadyActive);
        }
        let (tx, rx) = oneshot::channel();
        *slot = Some(tx);
        Ok(Box::new(TypedLine { rx }))
    }
}

struct TypedLine {
    rx: oneshot::Receiver<String>,
}

#[async_trait]
impl RecognitionStream for TypedLine {
    async fn recognize(&mut self) -> Result<String, CaptureErrorKind> {
        (&mut self.rx).await.map_err(|_| CaptureErrorKind::Other)
    }
}

/// What a line typed outside a listen cycle asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    ActivateMic,
    Speech(bool),
    AutoSpeak(bool),
    /// Volume as a fraction of full scale.
    Volume(f32),
    Help,
    Quit,
    Invalid(String),
}

pub const HELP: &str = "Enter: talk (then type what you say) | :speech on|off | :auto on|off | :volume 0-100 | :help | :quit";

pub fn parse_command(line: &str) -> ConsoleCommand {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleCommand::ActivateMic;
    }
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let argument = words.next();

    match (command, argument) {
        (":speech", Some(arg)) => on_off(arg).map_or_else(invalid(line), ConsoleCommand::Speech),
        (":auto", Some(arg)) => on_off(arg).map_or_else(invalid(line), ConsoleCommand::AutoSpeak),
        (":volume", Some(arg)) => match arg.parse::<f32>() {
            Ok(percent) if (0.0..=100.0).contains(&percent) => ConsoleCommand::Volume(percent / 100.0),
            _ => ConsoleCommand::Invalid(format!("volume must be between 0 and 100, got '{arg}'")),
        },
        (":help", None) => ConsoleCommand::Help,
        (":quit" | ":q", None) => ConsoleCommand::Quit,
        _ => ConsoleCommand::Invalid(format!("unknown command '{line}'")),
    }
}

fn on_off(arg: &str) -> Option<bool> {
    match arg {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

fn invalid(line: &str) -> impl FnOnce() -> ConsoleCommand + '_ {
    move || ConsoleCommand::Invalid(format!("expected 'on' or 'off' in '{line}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingo_core::Ticket;
    use lingo_core::capture::{CaptureEvent, SpeechCapture};
    use tokio::sync::mpsc;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command(""), ConsoleCommand::ActivateMic);
        assert_eq!(parse_command(":speech off"), ConsoleCommand::Speech(false));
        assert_eq!(parse_command(":auto on"), ConsoleCommand::AutoSpeak(true));
        assert_eq!(parse_command(":volume 25"), ConsoleCommand::Volume(0.25));
        assert_eq!(parse_command(":quit"), ConsoleCommand::Quit);
        assert!(matches!(parse_command(":volume 300"), ConsoleCommand::Invalid(_)));
        assert!(matches!(parse_command(":speech maybe"), ConsoleCommand::Invalid(_)));
        assert!(matches!(parse_command("hola"), ConsoleCommand::Invalid(_)));
    }

    #[tokio::test]
    async fn test_typed_line_becomes_transcript() {
        let recognizer = ConsoleRecognizer::new();
        let mut stream = recognizer.open().unwrap();

        recognizer.offer("Me llamo Sam".to_string()).unwrap();

        assert_eq!(stream.recognize().await.unwrap(), "Me llamo Sam");
    }

    #[test]
    fn test_line_without_listener_is_returned() {
        let recognizer = ConsoleRecognizer::new();

        assert_eq!(recognizer.offer("hola".to_string()), Err("hola".to_string()));
    }

    #[tokio::test]
    async fn test_capture_restarts_immediately_after_stop() {
        let recognizer = ConsoleRecognizer::new();
        let mut capture = SpeechCapture::new(Arc::new(recognizer.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        capture.start(Ticket(1), tx.clone()).unwrap();
        tokio::task::yield_now().await;
        capture.stop().await;

        assert_eq!(capture.start(Ticket(2), tx), Ok(()));
        recognizer.offer("Hola".to_string()).unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            CaptureEvent::Transcript {
                ticket: Ticket(2),
                text: "Hola".to_string()
            }
        );
    }

    #[test]
    fn test_dropped_stream_stops_listening() {
        let recognizer = ConsoleRecognizer::new();
        let stream = recognizer.open().unwrap();
        assert!(matches!(recognizer.open(), Err(CaptureError::AlreadyActive)));

        drop(stream);

        assert_eq!(recognizer.offer(":quit".to_string()), Err(":quit".to_string()));
        assert!(recognizer.open().is_ok());
    }
}
