use crate::synthesis::AudioClip;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Names the single playable-audio resource a session may hold.
///
/// Only the session controller mints handles; the runtime keeps the loaded
/// [`Playback`] under this handle and drops it when the controller releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioHandle(pub u64);

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audio#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PlaybackError(pub String);

/// Host audio output.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Stages a clip for playback. Resolves once the audio is ready to play.
    async fn load(&self, clip: AudioClip, volume: f32) -> Result<Box<dyn Playback>, PlaybackError>;
}

/// A loaded clip. Dropping it stops playback and frees the resource.
#[async_trait]
pub trait Playback: Send {
    /// Plays the clip; resolves when playback has ended.
    async fn play(&mut self) -> Result<(), PlaybackError>;
}
