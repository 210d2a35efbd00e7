//! OpenClaw Assistant - voice interaction sessions for webhook-backed AI assistants
//!
//! This library drives a hands-free voice exchange with a user-run assistant:
//! - Wake word gating and utterance capture through pluggable voice capabilities
//! - One webhook round-trip per turn with classified failures
//! - Optional spoken replies and a continuous conversation loop
//! - Persisted settings with a verified-connection flag
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Host                            │
//! │   CLI  │  Settings wizard  │  Session service        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Session Orchestrator                   │
//! │   Wake Word  │  Capture  │  Dispatch  │  Playback    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Webhook (user's assistant)              │
//! │   POST {transcript}  →  {text, continue}             │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod setup;
pub mod voice;

pub use config::{SessionConfig, Settings, SettingsSource, SettingsStore, WakeWordPreset};
pub use error::{Error, ErrorKind, GatewayError, Result};
pub use gateway::{Ack, AssistantGateway, AssistantReply, TurnRequest, WebhookGateway};
pub use session::{
    Activation, Capabilities, CapabilityFactory, SessionEvent, SessionHandle,
    SessionOrchestrator, SessionService, SessionState, TerminationReason,
};
pub use voice::{
    CaptureLimits, CaptureOutcome, Detection, PlaybackOutcome, SpeechCapture, SpeechPlayback,
    Utterance, WakePhrase, WakeWordDetector,
};
