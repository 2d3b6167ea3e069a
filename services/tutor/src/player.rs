//! Audio playback through an external player program.
//!
//! Each clip is written to a temporary file and handed to the player. The
//! child process is killed and the file deleted when the playback is dropped,
//! so aborting the playback task is enough to silence it.

use async_trait::async_trait;
use lingo_core::playback::{AudioPlayer, Playback, PlaybackError};
use lingo_core::synthesis::AudioClip;
use std::io::Write;
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::process::{Child, Command};

pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    /// `command` is the program followed by its arguments; the file path is appended.
    pub fn new(command: &[String]) -> Result<Self, PlaybackError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| PlaybackError("no audio player configured".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn is_ffplay(&self) -> bool {
        self.program.ends_with("ffplay")
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn load(&self, clip: AudioClip, volume: f32) -> Result<Box<dyn Playback>, PlaybackError> {
        let mut file = tempfile::Builder::new()
            .prefix("lingo-")
            .suffix(extension(&clip.content_type))
            .tempfile()
            .map_err(|e| PlaybackError(format!("failed to create audio file: {e}")))?;
        file.write_all(&clip.bytes)
            .and_then(|_| file.flush())
            .map_err(|e| PlaybackError(format!("failed to write audio file: {e}")))?;

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if self.is_ffplay() {
            command.arg("-volume").arg(((volume * 100.0).round() as u32).to_string());
        }
        command
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| PlaybackError(format!("failed to start {}: {e}", self.program)))?;
        tracing::debug!("Playing {} bytes with {}", clip.len(), self.program);

        Ok(Box::new(ChildPlayback { child, _file: file }))
    }
}

struct ChildPlayback {
    child: Child,
    _file: NamedTempFile,
}

#[async_trait]
impl Playback for ChildPlayback {
    async fn play(&mut self) -> Result<(), PlaybackError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| PlaybackError(format!("audio player failed: {e}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(PlaybackError(format!("audio player exited with {status}")))
        }
    }
}

fn extension(content_type: &str) -> &'static str {
    match content_type {
        "audio/wav" | "audio/x-wav" | "audio/wave" => ".wav",
        "audio/ogg" => ".ogg",
        "audio/webm" => ".webm",
        _ => ".mp3",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(command: &str) -> CommandPlayer {
        let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        CommandPlayer::new(&parts).unwrap()
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(CommandPlayer::new(&[]).is_err());
    }

    #[tokio::test]
    async fn test_successful_player_finishes_playback() {
        let mut playback = player("true")
            .load(AudioClip::new(vec![1, 2, 3], "audio/mpeg"), 0.8)
            .await
            .unwrap();

        assert!(playback.play().await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_player_is_playback_error() {
        let mut playback = player("false")
            .load(AudioClip::new(vec![1, 2, 3], "audio/mpeg"), 0.8)
            .await
            .unwrap();

        assert!(playback.play().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_player_fails_to_load() {
        let result = player("definitely-not-an-audio-player-lingo")
            .load(AudioClip::new(vec![1], "audio/mpeg"), 0.8)
            .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_extension_follows_content_type() {
        assert_eq!(extension("audio/mpeg"), ".mp3");
        assert_eq!(extension("audio/wav"), ".wav");
    }
}
