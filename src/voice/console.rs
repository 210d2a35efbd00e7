//! Line-oriented console capabilities
//!
//! Lets a session run in a terminal: each input line is one heard audio
//! window (while waiting for the wake word) or one utterance (while
//! listening), and replies are printed instead of synthesized. A line break
//! stands in for the silence timeout.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;

use super::{
    CaptureLimits, CaptureOutcome, Detection, PlaybackOutcome, SpeechCapture, SpeechPlayback,
    Utterance, WakePhrase, WakeWordDetector,
};
use crate::{Error, Result};

type LineSource = Lines<Box<dyn AsyncBufRead + Unpin + Send>>;

/// Shared line reader; the detector and capture take turns on it
#[derive(Clone)]
pub struct ConsoleInput {
    lines: Arc<Mutex<LineSource>>,
}

impl ConsoleInput {
    /// Read lines from standard input
    #[must_use]
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }

    /// Read lines from any buffered reader
    #[must_use]
    pub fn from_reader(reader: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        let boxed: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(reader);
        Self {
            lines: Arc::new(Mutex::new(boxed.lines())),
        }
    }

    /// Next line, `None` at end of input
    async fn next_line(&self) -> Result<Option<String>> {
        let mut lines = self.lines.lock().await;
        Ok(lines.next_line().await?)
    }
}

/// Treats every console line as a heard wake window
pub struct ConsoleDetector {
    input: ConsoleInput,
    armed: bool,
}

impl ConsoleDetector {
    /// Create a detector reading from `input`
    #[must_use]
    pub const fn new(input: ConsoleInput) -> Self {
        Self {
            input,
            armed: false,
        }
    }
}

#[async_trait]
impl WakeWordDetector for ConsoleDetector {
    async fn arm(&mut self, phrase: &WakePhrase) -> Result<()> {
        tracing::debug!(wake_word = %phrase, "console detector armed");
        self.armed = true;
        Ok(())
    }

    async fn next_detection(&mut self) -> Result<Option<Detection>> {
        if !self.armed {
            return Err(Error::WakeWord("detector used before arm".to_string()));
        }

        loop {
            match self.input.next_line().await? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => return Ok(Some(Detection::new(line))),
                None => return Ok(None),
            }
        }
    }

    fn disarm(&mut self) {
        if self.armed {
            self.armed = false;
            tracing::debug!("console detector disarmed");
        }
    }
}

/// Treats the next console line as the user's utterance
pub struct ConsoleCapture {
    input: ConsoleInput,
}

impl ConsoleCapture {
    /// Create a capture reading from `input`
    #[must_use]
    pub const fn new(input: ConsoleInput) -> Self {
        Self { input }
    }
}

#[async_trait]
impl SpeechCapture for ConsoleCapture {
    async fn capture(&mut self, limits: CaptureLimits) -> Result<CaptureOutcome> {
        match tokio::time::timeout(limits.max_duration, self.input.next_line()).await {
            Err(_) => {
                tracing::debug!(max = ?limits.max_duration, "console capture timed out");
                Ok(CaptureOutcome::TimedOut)
            }
            Ok(line) => match line? {
                Some(text) if text.trim().is_empty() => Ok(CaptureOutcome::Empty),
                Some(text) => Ok(CaptureOutcome::Utterance(Utterance::new(text.trim()))),
                None => Err(Error::Capture("console input closed".to_string())),
            },
        }
    }
}

/// Prints replies to standard output
pub struct ConsolePlayback {
    per_word: Option<Duration>,
}

impl ConsolePlayback {
    /// Print replies immediately
    #[must_use]
    pub const fn new() -> Self {
        Self { per_word: None }
    }

    /// Hold each reply for roughly as long as it would take to say aloud
    #[must_use]
    pub const fn with_pacing(per_word: Duration) -> Self {
        Self {
            per_word: Some(per_word),
        }
    }
}

impl Default for ConsolePlayback {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechPlayback for ConsolePlayback {
    async fn speak(&mut self, text: &str) -> Result<PlaybackOutcome> {
        {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "assistant> {text}")
                .and_then(|()| stdout.flush())
                .map_err(|e| Error::Playback(e.to_string()))?;
        }

        if let Some(per_word) = self.per_word {
            let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
            tokio::time::sleep(per_word.saturating_mul(words)).await;
        }

        Ok(PlaybackOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn input(text: &str) -> ConsoleInput {
        ConsoleInput::from_reader(Cursor::new(text.as_bytes().to_vec()))
    }

    #[tokio::test]
    async fn test_detector_skips_blank_lines() {
        let mut detector = ConsoleDetector::new(input("\n\nhey buddy\n"));
        detector.arm(&WakePhrase::parse("hey buddy").unwrap()).await.unwrap();

        let detection = detector.next_detection().await.unwrap().unwrap();
        assert_eq!(detection.phrase, "hey buddy");
        assert!(detector.next_detection().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_detector_requires_arm() {
        let mut detector = ConsoleDetector::new(input("openclaw\n"));
        assert!(detector.next_detection().await.is_err());
    }

    #[tokio::test]
    async fn test_capture_outcomes() {
        let shared = input("what's the weather\n   \n");
        let mut capture = ConsoleCapture::new(shared);
        let limits = CaptureLimits::default();

        match capture.capture(limits).await.unwrap() {
            CaptureOutcome::Utterance(u) => assert_eq!(u.transcript, "what's the weather"),
            other => panic!("expected utterance, got {other:?}"),
        }
        assert_eq!(capture.capture(limits).await.unwrap(), CaptureOutcome::Empty);
        assert!(capture.capture(limits).await.is_err());
    }

    #[tokio::test]
    async fn test_detector_and_capture_share_input() {
        let shared = input("openclaw\nturn on the lights\n");
        let mut detector = ConsoleDetector::new(shared.clone());
        let mut capture = ConsoleCapture::new(shared);

        detector.arm(&WakePhrase::parse("openclaw").unwrap()).await.unwrap();
        assert_eq!(detector.next_detection().await.unwrap().unwrap().phrase, "openclaw");
        assert!(matches!(
            capture.capture(CaptureLimits::default()).await.unwrap(),
            CaptureOutcome::Utterance(_)
        ));
    }

    #[tokio::test]
    async fn test_paced_playback_completes() {
        let mut playback = ConsolePlayback::with_pacing(Duration::from_millis(1));
        let outcome = playback.speak("three short words").await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Completed);
    }
}
