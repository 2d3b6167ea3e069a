//! Hand-written fakes for the host capabilities (microphone, speakers).

use crate::capture::{RecognitionStream, SpeechRecognizer};
use crate::error::{CaptureError, CaptureErrorKind};
use crate::playback::{AudioPlayer, Playback, PlaybackError};
use crate::synthesis::AudioClip;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Counts live resources; each claim decrements the count when dropped.
#[derive(Clone, Default)]
pub(crate) struct ResourceCounter(Arc<AtomicUsize>);

impl ResourceCounter {
    fn claim(&self) -> Claim {
        self.0.fetch_add(1, Ordering::SeqCst);
        Claim(self.0.clone())
    }

    pub(crate) fn live(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_until_released(&self) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while self.live() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("resource was not released");
    }
}

pub(crate) struct Claim(Arc<AtomicUsize>);

impl Drop for Claim {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

type RecognitionResult = Result<String, CaptureErrorKind>;

pub(crate) struct FakeRecognizer {
    available: bool,
    // Refuses a second claim while the microphone is still held, like a real device.
    exclusive: bool,
    scripts: Mutex<VecDeque<oneshot::Receiver<RecognitionResult>>>,
    microphone: ResourceCounter,
    opened: AtomicUsize,
}

impl FakeRecognizer {
    pub(crate) fn available() -> Self {
        Self {
            available: true,
            exclusive: false,
            scripts: Mutex::new(VecDeque::new()),
            microphone: ResourceCounter::default(),
            opened: AtomicUsize::new(0),
        }
    }

    pub(crate) fn exclusive() -> Self {
        Self {
            exclusive: true,
            ..Self::available()
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    /// Queues the outcome of the next listen cycle; send on the returned channel to finish it.
    pub(crate) fn script(&self) -> oneshot::Sender<RecognitionResult> {
        let (tx, rx) = oneshot::channel();
        self.scripts.lock().unwrap().push_back(rx);
        tx
    }

    pub(crate) fn microphone_in_use(&self) -> bool {
        self.microphone.live() > 0
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_release(&self) {
        self.microphone.wait_until_released().await;
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn open(&self) -> Result<Box<dyn RecognitionStream>, CaptureError> {
        if !self.available {
            return Err(CaptureError::Unavailable);
        }
        if self.exclusive && self.microphone_in_use() {
            return Err(CaptureError::AlreadyActive);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            result: self.scripts.lock().unwrap().pop_front(),
            _microphone: self.microphone.claim(),
        }))
    }
}

struct FakeStream {
    result: Option<oneshot::Receiver<RecognitionResult>>,
    _microphone: Claim,
}

#[async_trait]
impl RecognitionStream for FakeStream {
    async fn recognize(&mut self) -> Result<String, CaptureErrorKind> {
        match self.result.take() {
            Some(rx) => rx.await.unwrap_or(Err(CaptureErrorKind::Other)),
            None => std::future::pending().await,
        }
    }
}

type PlaybackResult = Result<(), PlaybackError>;

#[derive(Default)]
pub(crate) struct FakePlayer {
    loaded: Mutex<Vec<(AudioClip, f32)>>,
    scripts: Mutex<VecDeque<oneshot::Receiver<PlaybackResult>>>,
    speakers: ResourceCounter,
}

impl FakePlayer {
    /// Queues how the next loaded clip finishes playing.
    pub(crate) fn script(&self) -> oneshot::Sender<PlaybackResult> {
        let (tx, rx) = oneshot::channel();
        self.scripts.lock().unwrap().push_back(rx);
        tx
    }

    pub(crate) fn loaded(&self) -> Vec<(AudioClip, f32)> {
        self.loaded.lock().unwrap().clone()
    }

    pub(crate) fn live_playbacks(&self) -> usize {
        self.speakers.live()
    }

    pub(crate) async fn wait_for_release(&self) {
        self.speakers.wait_until_released().await;
    }
}

#[async_trait]
impl AudioPlayer for FakePlayer {
    async fn load(&self, clip: AudioClip, volume: f32) -> Result<Box<dyn Playback>, PlaybackError> {
        self.loaded.lock().unwrap().push((clip, volume));
        Ok(Box::new(FakePlayback {
            result: self.scripts.lock().unwrap().pop_front(),
            _speakers: self.speakers.claim(),
        }))
    }
}

struct FakePlayback {
    result: Option<oneshot::Receiver<PlaybackResult>>,
    _speakers: Claim,
}

#[async_trait]
impl Playback for FakePlayback {
    async fn play(&mut self) -> Result<(), PlaybackError> {
        match self.result.take() {
            Some(rx) => rx.await.unwrap_or(Ok(())),
            None => std::future::pending().await,
        }
    }
}
