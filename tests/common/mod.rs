//! Shared test utilities
//!
//! Scripted voice capabilities and a fake gateway that record what the
//! session asked of them.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use openclaw_assistant::gateway::{AssistantGateway, AssistantReply, TurnRequest};
use openclaw_assistant::voice::{
    CaptureLimits, CaptureOutcome, Detection, PlaybackOutcome, SpeechCapture, SpeechPlayback,
    Utterance, WakePhrase, WakeWordDetector,
};
use openclaw_assistant::{
    Capabilities, Error, GatewayError, SessionConfig, SessionEvent, Settings,
};

/// Webhook URL used by test settings
pub const TEST_WEBHOOK: &str = "https://assistant.test/hooks/voice";

/// What every fake saw during a session
#[derive(Debug, Default)]
pub struct Tally {
    pub armed: AtomicUsize,
    pub disarmed: AtomicUsize,
    pub detections_served: AtomicUsize,
    pub captures: AtomicUsize,
    pub capture_cancels: AtomicUsize,
    pub playback_cancels: AtomicUsize,
    pub spoken: Mutex<Vec<String>>,
    pub dispatched: Mutex<Vec<String>>,
}

impl Tally {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().unwrap().clone()
    }
}

/// What the detector does once its script runs out
#[derive(Debug, Clone, Copy)]
pub enum AfterScript {
    /// Report the audio stream ended
    End,
    /// Never report anything again
    Hang,
    /// Fail as if the detector engine crashed
    Fail,
}

/// Detector that reports a fixed list of heard phrases
pub struct ScriptedDetector {
    heard: VecDeque<String>,
    after: AfterScript,
    tally: Arc<Tally>,
}

impl ScriptedDetector {
    pub fn new(heard: &[&str], after: AfterScript, tally: Arc<Tally>) -> Self {
        Self {
            heard: heard.iter().map(|s| (*s).to_string()).collect(),
            after,
            tally,
        }
    }
}

#[async_trait]
impl WakeWordDetector for ScriptedDetector {
    async fn arm(&mut self, _phrase: &WakePhrase) -> openclaw_assistant::Result<()> {
        self.tally.armed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_detection(&mut self) -> openclaw_assistant::Result<Option<Detection>> {
        if let Some(phrase) = self.heard.pop_front() {
            self.tally.detections_served.fetch_add(1, Ordering::SeqCst);
            return Ok(Some(Detection::new(phrase)));
        }

        match self.after {
            AfterScript::End => Ok(None),
            AfterScript::Hang => std::future::pending().await,
            AfterScript::Fail => Err(Error::WakeWord("recognizer service died".to_string())),
        }
    }

    fn disarm(&mut self) {
        self.tally.disarmed.fetch_add(1, Ordering::SeqCst);
    }
}

/// One scripted capture result
#[derive(Debug, Clone)]
pub enum Heard {
    Say(&'static str),
    Silence,
    Timeout,
    Fail(&'static str),
    Hang,
}

/// Capture that plays back a script, hanging once it runs out
pub struct ScriptedCapture {
    script: VecDeque<Heard>,
    tally: Arc<Tally>,
}

impl ScriptedCapture {
    pub fn new(script: Vec<Heard>, tally: Arc<Tally>) -> Self {
        Self {
            script: script.into(),
            tally,
        }
    }
}

#[async_trait]
impl SpeechCapture for ScriptedCapture {
    async fn capture(
        &mut self,
        _limits: CaptureLimits,
    ) -> openclaw_assistant::Result<CaptureOutcome> {
        self.tally.captures.fetch_add(1, Ordering::SeqCst);

        match self.script.pop_front().unwrap_or(Heard::Hang) {
            Heard::Say(text) => Ok(CaptureOutcome::Utterance(Utterance::new(text))),
            Heard::Silence => Ok(CaptureOutcome::Empty),
            Heard::Timeout => Ok(CaptureOutcome::TimedOut),
            Heard::Fail(msg) => Err(Error::Capture(msg.to_string())),
            Heard::Hang => std::future::pending().await,
        }
    }

    fn cancel(&mut self) {
        self.tally.capture_cancels.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speaker {
    Working,
    Broken,
    Stuck,
}

/// Playback that records what it was asked to say
pub struct RecordingPlayback {
    speaker: Speaker,
    tally: Arc<Tally>,
}

impl RecordingPlayback {
    pub fn new(tally: Arc<Tally>) -> Self {
        Self {
            speaker: Speaker::Working,
            tally,
        }
    }

    /// Every reply fails to play
    pub fn failing(tally: Arc<Tally>) -> Self {
        Self {
            speaker: Speaker::Broken,
            tally,
        }
    }

    /// Playback starts but never finishes
    pub fn hanging(tally: Arc<Tally>) -> Self {
        Self {
            speaker: Speaker::Stuck,
            tally,
        }
    }
}

#[async_trait]
impl SpeechPlayback for RecordingPlayback {
    async fn speak(&mut self, text: &str) -> openclaw_assistant::Result<PlaybackOutcome> {
        self.tally.spoken.lock().unwrap().push(text.to_string());
        match self.speaker {
            Speaker::Working => Ok(PlaybackOutcome::Completed),
            Speaker::Broken => Err(Error::Playback("audio device unavailable".to_string())),
            Speaker::Stuck => std::future::pending().await,
        }
    }

    fn cancel(&mut self) {
        self.tally.playback_cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Gateway answering from a queue; hangs when the queue is empty
pub struct FakeGateway {
    replies: Mutex<VecDeque<Result<AssistantReply, GatewayError>>>,
    tally: Arc<Tally>,
}

impl FakeGateway {
    pub fn new(
        replies: Vec<Result<AssistantReply, GatewayError>>,
        tally: Arc<Tally>,
    ) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            tally,
        }
    }
}

#[async_trait]
impl AssistantGateway for FakeGateway {
    async fn dispatch(&self, request: TurnRequest<'_>) -> Result<AssistantReply, GatewayError> {
        self.tally
            .dispatched
            .lock()
            .unwrap()
            .push(request.transcript.to_string());

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

/// Reply that keeps the conversation open
pub fn reply(text: &str) -> Result<AssistantReply, GatewayError> {
    Ok(AssistantReply {
        text: text.to_string(),
        should_continue_listening: true,
    })
}

/// Reply that ends the conversation
pub fn final_reply(text: &str) -> Result<AssistantReply, GatewayError> {
    Ok(AssistantReply {
        text: text.to_string(),
        should_continue_listening: false,
    })
}

/// Settings pointing at the test webhook
pub fn test_settings() -> Settings {
    Settings {
        webhook_url: TEST_WEBHOOK.to_string(),
        auth_token: "test-token-123".to_string(),
        ..Settings::default()
    }
}

/// Session config with the given loop and voice options
pub fn test_config(continuous: bool, tts: bool) -> SessionConfig {
    let settings = Settings {
        continuous_mode: continuous,
        tts_enabled: tts,
        ..test_settings()
    };
    SessionConfig::from_settings(&settings)
}

/// Capabilities built from scripted parts
pub fn capabilities(
    detector: ScriptedDetector,
    capture: ScriptedCapture,
    playback: RecordingPlayback,
    gateway: FakeGateway,
) -> Capabilities {
    Capabilities {
        detector: Box::new(detector),
        capture: Box::new(capture),
        playback: Box::new(playback),
        gateway: Arc::new(gateway),
    }
}

/// Drain every event left in the channel
pub async fn drain(mut events: mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Some(event) = events.recv().await {
        out.push(event);
    }
    out
}

/// Receive events until one matches, failing after a few seconds
pub async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            let hit = pred(&event);
            seen.push(event);
            if hit {
                return true;
            }
        }
        false
    })
    .await;

    assert!(matches!(found, Ok(true)), "expected event never arrived: {seen:?}");
    seen
}
