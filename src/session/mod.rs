//! Voice interaction sessions
//!
//! A session runs one voice interaction from activation to termination:
//!
//! ```text
//! Idle → WaitingForWake → Listening → Transcribing → Dispatching → Speaking
//!             ▲   (trusted activation skips the wake stage)          │
//!             └──────────── continuous mode loop ◀───────────────────┘
//! ```
//!
//! The host starts a session with [`SessionOrchestrator::run`], cancels it
//! through a [`SessionHandle`], and follows it on the [`SessionEvent`] channel.

mod orchestrator;
mod service;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub use orchestrator::{Capabilities, SessionOrchestrator};
pub use service::{CapabilityFactory, NewSession, SessionService};

use crate::ErrorKind;

/// Where the orchestrator is in the interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, not started
    Idle,
    /// Waiting for the wake phrase
    WaitingForWake,
    /// Capturing the user's utterance
    Listening,
    /// Turning the capture into a request
    Transcribing,
    /// Waiting on the webhook
    Dispatching,
    /// Playing a reply or an error message
    Speaking,
    /// Finished; no further transitions
    Terminated,
}

impl SessionState {
    /// Whether the session has ended
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::WaitingForWake => "waiting-for-wake",
            Self::Listening => "listening",
            Self::Transcribing => "transcribing",
            Self::Dispatching => "dispatching",
            Self::Speaking => "speaking",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// How the platform activated the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    /// Phrase-gated: wait for the wake word first
    #[default]
    WakeWord,
    /// Already activated by a trusted trigger (assist button, gesture)
    Trusted,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// Exchange finished normally
    Completed,
    /// Single-shot turn ended with nothing said
    NoInput,
    /// User or host cancelled
    Cancelled,
    /// Configuration unusable; the session never started
    ConfigInvalid(String),
    /// Audio input ended
    InputClosed,
    /// A turn failed outside continuous mode, or the detector failed
    Failed {
        /// Failure class
        kind: ErrorKind,
        /// User-facing message
        message: String,
    },
}

impl TerminationReason {
    /// Error class behind this reason, `None` for a normal ending
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Completed | Self::NoInput | Self::InputClosed => None,
            Self::Cancelled => Some(ErrorKind::Cancelled),
            Self::ConfigInvalid(_) => Some(ErrorKind::ConfigInvalid),
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::NoInput => write!(f, "no input"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ConfigInvalid(msg) => write!(f, "invalid configuration: {msg}"),
            Self::InputClosed => write!(f, "input closed"),
            Self::Failed { kind, message } => write!(f, "{kind}: {message}"),
        }
    }
}

/// Lifecycle notifications for the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Configuration accepted, session running
    Started {
        /// Session identifier
        session_id: String,
    },
    /// State machine moved
    StateChanged {
        /// Previous state
        from: SessionState,
        /// New state
        to: SessionState,
    },
    /// Microphone opened for an utterance
    ListeningStarted,
    /// Microphone closed
    ListeningStopped,
    /// Utterance transcribed and about to be dispatched
    Transcript {
        /// What the user said
        text: String,
    },
    /// Webhook reply available
    ReplyReady {
        /// Reply text
        text: String,
    },
    /// User-visible failure
    Error {
        /// Failure class
        kind: ErrorKind,
        /// Message shown and optionally spoken ("Failed: ...")
        message: String,
    },
    /// Session over; emitted exactly once
    Terminated {
        /// Why it ended
        reason: TerminationReason,
    },
}

/// Host-side control of a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Session identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cancel the session
    ///
    /// Aborts whichever capture, request, or playback is in flight. Calling
    /// this again, or after the session ended, does nothing.
    pub fn cancel(&self) {
        if self.cancel.is_cancelled() || self.state().is_terminal() {
            tracing::trace!(session_id = %self.id, "cancel ignored, session already stopping");
            return;
        }

        tracing::info!(session_id = %self.id, "session cancel requested");
        self.cancel.cancel();
    }

    /// Whether cancel has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `Terminated`
    pub async fn terminated(&self) {
        let mut rx = self.state.clone();
        // Sender dropped means the orchestrator is gone, which is also the end
        let _ = rx.wait_for(|s| s.is_terminal()).await;
    }
}
