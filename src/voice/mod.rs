//! Voice capability interfaces
//!
//! Wake word detection, speech capture, and playback are provided by the
//! platform. The session drives them through these traits so any engine,
//! or a scripted fake, can be plugged in.

pub mod console;
mod wake_word;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use console::{ConsoleCapture, ConsoleDetector, ConsoleInput, ConsolePlayback};
pub use wake_word::{WakePhrase, normalize};

use crate::Result;

/// A phrase reported by the wake word detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Text the detector matched in the audio window
    pub phrase: String,
    /// When the window was heard
    pub heard_at: DateTime<Utc>,
}

impl Detection {
    /// Create a detection stamped now
    #[must_use]
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            heard_at: Utc::now(),
        }
    }
}

/// A captured user utterance, consumed once by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Transcribed text
    pub transcript: String,
    /// When capture completed
    pub captured_at: DateTime<Utc>,
}

impl Utterance {
    /// Create an utterance stamped now
    #[must_use]
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            captured_at: Utc::now(),
        }
    }

    /// Whether the transcript has no spoken content
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transcript.trim().is_empty()
    }
}

/// Bounds applied to a single capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    /// Silence after speech that ends the utterance
    pub silence_timeout: Duration,
    /// Hard cap on the utterance length
    pub max_duration: Duration,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            silence_timeout: Duration::from_millis(1500),
            max_duration: Duration::from_secs(15),
        }
    }
}

/// How a capture ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Speech was transcribed
    Utterance(Utterance),
    /// Silence timeout with nothing said
    Empty,
    /// Maximum duration reached without a usable transcript
    TimedOut,
}

/// How playback ended; reported exactly once per `speak` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Text was spoken to the end
    Completed,
    /// Playback was interrupted
    Cancelled,
}

/// Evaluates live audio against a single configured phrase
#[async_trait]
pub trait WakeWordDetector: Send {
    /// Open the audio stream and listen for `phrase`
    ///
    /// Called once per session; the phrase does not change mid-session.
    async fn arm(&mut self, phrase: &WakePhrase) -> Result<()>;

    /// Wait for the next utterance window the detector flags
    ///
    /// Returns `None` when the audio stream has ended.
    async fn next_detection(&mut self) -> Result<Option<Detection>>;

    /// Release the audio stream
    fn disarm(&mut self);
}

/// Records speech until silence or timeout and transcribes it
#[async_trait]
pub trait SpeechCapture: Send {
    /// Capture one utterance
    async fn capture(&mut self, limits: CaptureLimits) -> Result<CaptureOutcome>;

    /// Abort an in-flight capture and release the microphone
    fn cancel(&mut self) {}
}

/// Renders text as audio
#[async_trait]
pub trait SpeechPlayback: Send {
    /// Speak `text`, resolving when playback completes or is interrupted
    async fn speak(&mut self, text: &str) -> Result<PlaybackOutcome>;

    /// Stop any in-flight playback and release the speaker
    fn cancel(&mut self) {}
}
