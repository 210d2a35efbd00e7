//! Error types for the OpenClaw assistant

use serde::Serialize;
use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Settings store error
    #[error("settings error: {0}")]
    Settings(String),

    /// Webhook gateway error
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Wake word detection error
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// Speech capture error
    #[error("capture error: {0}")]
    Capture(String),

    /// Speech playback error
    #[error("playback error: {0}")]
    Playback(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("toml error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Classify this error for the session state machine
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Settings(_) | Self::Toml(_) | Self::TomlSerialize(_) => {
                ErrorKind::ConfigInvalid
            }
            Self::Gateway(e) => e.kind(),
            Self::WakeWord(_) => ErrorKind::DetectorFailure,
            Self::Capture(_) | Self::Io(_) => ErrorKind::CaptureFailure,
            Self::Playback(_) => ErrorKind::PlaybackFailure,
            Self::Http(_) => ErrorKind::GatewayNetwork,
        }
    }
}

/// Failure of a single webhook round-trip
///
/// Transport and codec errors are classified into one of these before they
/// reach the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Connection, DNS, TLS, or timeout failure
    #[error("network error: {0}")]
    Network(String),

    /// Webhook rejected the credentials (401/403)
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// Webhook answered with a non-success status
    #[error("server error: {0}")]
    Server(String),

    /// Webhook answered 2xx with a body that is not a reply
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Session-level kind for this failure
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::GatewayNetwork,
            Self::Authentication(_) => ErrorKind::GatewayAuth,
            Self::Server(_) => ErrorKind::GatewayServer,
            Self::Malformed(_) => ErrorKind::GatewayMalformed,
        }
    }
}

/// Error taxonomy seen by the session orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty webhook URL or otherwise unusable configuration
    ConfigInvalid,
    /// Heard phrase did not match the configured wake word
    WakeWordMismatch,
    /// Capture finished with nothing said
    CaptureEmpty,
    /// Capture hit its maximum duration
    CaptureTimeout,
    /// Capture device failed
    CaptureFailure,
    /// Wake word detector stream failed
    DetectorFailure,
    /// Webhook unreachable or timed out
    GatewayNetwork,
    /// Webhook rejected the auth token
    GatewayAuth,
    /// Webhook returned a non-success status
    GatewayServer,
    /// Webhook reply could not be decoded
    GatewayMalformed,
    /// Reply could not be spoken
    PlaybackFailure,
    /// Session was cancelled by the user or the host
    Cancelled,
}

impl ErrorKind {
    /// Whether this kind is surfaced to the user as a message
    #[must_use]
    pub const fn is_user_visible(self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid
                | Self::CaptureFailure
                | Self::DetectorFailure
                | Self::GatewayNetwork
                | Self::GatewayAuth
                | Self::GatewayServer
                | Self::GatewayMalformed
                | Self::PlaybackFailure
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ConfigInvalid => "config invalid",
            Self::WakeWordMismatch => "wake word mismatch",
            Self::CaptureEmpty => "capture empty",
            Self::CaptureTimeout => "capture timeout",
            Self::CaptureFailure => "capture failure",
            Self::DetectorFailure => "detector failure",
            Self::GatewayNetwork => "network",
            Self::GatewayAuth => "authentication",
            Self::GatewayServer => "server",
            Self::GatewayMalformed => "malformed response",
            Self::PlaybackFailure => "playback failure",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
