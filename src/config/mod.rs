//! Configuration management for the assistant
//!
//! `Settings` is the flat record the settings wizard edits and the store
//! persists. `SessionConfig` is the immutable snapshot a session takes of it
//! at start; a running session never re-reads live settings.

pub mod file;

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

pub use file::SettingsStore;

use crate::voice::{CaptureLimits, WakePhrase};
use crate::{Error, Result};

/// Platform watchdog for a voice interaction session
pub const SESSION_WATCHDOG: Duration = Duration::from_secs(60);

/// Upper bound for a webhook round-trip, kept below [`SESSION_WATCHDOG`]
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(50);

/// Phrase used when a custom wake word is selected but left blank
pub const DEFAULT_WAKE_PHRASE: &str = "openclaw";

/// Wake word presets offered by the settings wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeWordPreset {
    /// "OpenClaw"
    #[default]
    OpenClaw,
    /// "Hey Assistant"
    HeyAssistant,
    /// "Jarvis"
    Jarvis,
    /// "Computer"
    Computer,
    /// Free-text phrase from `custom_wake_word`
    Custom,
}

impl WakeWordPreset {
    /// All presets in menu order
    pub const ALL: [Self; 5] = [
        Self::OpenClaw,
        Self::HeyAssistant,
        Self::Jarvis,
        Self::Computer,
        Self::Custom,
    ];

    /// Stable identifier stored in the settings file
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::OpenClaw => "open_claw",
            Self::HeyAssistant => "hey_assistant",
            Self::Jarvis => "jarvis",
            Self::Computer => "computer",
            Self::Custom => "custom",
        }
    }

    /// Menu label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OpenClaw => "OpenClaw",
            Self::HeyAssistant => "Hey Assistant",
            Self::Jarvis => "Jarvis",
            Self::Computer => "Computer",
            Self::Custom => "Custom...",
        }
    }

    /// Fixed phrase for this preset, `None` for custom
    #[must_use]
    pub const fn phrase(self) -> Option<&'static str> {
        match self {
            Self::OpenClaw => Some("OpenClaw"),
            Self::HeyAssistant => Some("Hey Assistant"),
            Self::Jarvis => Some("Jarvis"),
            Self::Computer => Some("Computer"),
            Self::Custom => None,
        }
    }
}

impl std::fmt::Display for WakeWordPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for WakeWordPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| {
                p.id().eq_ignore_ascii_case(wanted)
                    || p.label().trim_end_matches("...").eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| Error::Config(format!("unknown wake word preset: {s}")))
    }
}

/// Flat settings record
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// Webhook receiving transcripts (required)
    pub webhook_url: String,

    /// Bearer token for the webhook (may be empty)
    pub auth_token: String,

    /// Set after a successful connection test
    pub verified: bool,

    /// Read replies aloud
    pub tts_enabled: bool,

    /// Re-arm after each reply instead of ending the session
    pub continuous_mode: bool,

    /// Selected wake word preset
    pub wake_word_preset: WakeWordPreset,

    /// Phrase used when the preset is `Custom`
    pub custom_wake_word: String,

    /// In continuous mode, resume listening without waiting for the wake word
    pub hands_free: bool,

    /// Webhook round-trip timeout in seconds
    pub request_timeout_secs: u64,

    /// Silence that ends an utterance, in milliseconds
    pub silence_timeout_ms: u64,

    /// Longest utterance, in seconds
    pub max_capture_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            auth_token: String::new(),
            verified: false,
            tts_enabled: true,
            continuous_mode: false,
            wake_word_preset: WakeWordPreset::default(),
            custom_wake_word: String::new(),
            hands_free: false,
            request_timeout_secs: 30,
            silence_timeout_ms: 1500,
            max_capture_secs: 15,
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("webhook_url", &self.webhook_url)
            .field("auth_token", &mask_token(&self.auth_token))
            .field("verified", &self.verified)
            .field("tts_enabled", &self.tts_enabled)
            .field("continuous_mode", &self.continuous_mode)
            .field("wake_word_preset", &self.wake_word_preset)
            .field("custom_wake_word", &self.custom_wake_word)
            .field("hands_free", &self.hands_free)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("silence_timeout_ms", &self.silence_timeout_ms)
            .field("max_capture_secs", &self.max_capture_secs)
            .finish()
    }
}

impl Settings {
    /// Apply environment overrides (env > file > default)
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("OPENCLAW_WEBHOOK_URL") {
            self.webhook_url = url;
        }
        if let Some(token) = lookup("OPENCLAW_AUTH_TOKEN") {
            self.auth_token = token;
        }
        if let Some(tts) = lookup("OPENCLAW_TTS") {
            self.tts_enabled = parse_flag(&tts);
        }
        if let Some(continuous) = lookup("OPENCLAW_CONTINUOUS") {
            self.continuous_mode = parse_flag(&continuous);
        }
        self
    }

    /// Whether the connection fields equal those of `other`
    #[must_use]
    pub fn same_connection(&self, other: &Self) -> bool {
        self.webhook_url.trim() == other.webhook_url.trim() && self.auth_token == other.auth_token
    }

    /// The activation phrase as configured, before normalization
    #[must_use]
    pub fn wake_word_text(&self) -> &str {
        self.wake_word_preset
            .phrase()
            .unwrap_or(self.custom_wake_word.as_str())
    }

    /// Check the record can be saved (the webhook URL is required)
    ///
    /// # Errors
    ///
    /// Returns error if the URL is blank or not an http(s) URL
    pub fn validate_for_save(&self) -> Result<()> {
        validate_webhook_url(&self.webhook_url)
    }
}

/// Check a webhook URL is present and http(s)
///
/// # Errors
///
/// Returns error describing the problem
pub fn validate_webhook_url(raw: &str) -> Result<()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("webhook URL is required".to_string()));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| Error::Config(format!("invalid webhook URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "webhook URL must be http or https, got {other}"
        ))),
    }
}

/// Mask a secret for display, keeping the first and last four characters
#[must_use]
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.is_empty() {
        String::new()
    } else if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Anything that can hand out the current settings record
pub trait SettingsSource: Send + Sync {
    /// Read the current settings
    fn settings(&self) -> Settings;
}

impl SettingsSource for Settings {
    fn settings(&self) -> Settings {
        self.clone()
    }
}

/// Immutable snapshot of the settings a session runs with
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Webhook URL; empty is a fatal configuration error at session start
    pub webhook_url: String,

    /// Bearer token, `None` when not configured
    pub auth_token: Option<SecretString>,

    /// Speak replies
    pub tts_enabled: bool,

    /// Loop after each reply
    pub continuous_mode: bool,

    /// Re-arm straight into listening in continuous mode
    pub hands_free: bool,

    /// Normalized activation phrase
    pub wake_phrase: WakePhrase,

    /// Per-utterance capture bounds
    pub capture_limits: CaptureLimits,

    /// Webhook round-trip timeout
    pub request_timeout: Duration,
}

impl SessionConfig {
    /// Snapshot a settings record
    ///
    /// Does not reject an empty webhook URL; the session does that at start
    /// so the failure is reported through the session lifecycle.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let wake_phrase = WakePhrase::parse(settings.wake_word_text()).unwrap_or_else(|_| {
            tracing::warn!(
                preset = %settings.wake_word_preset,
                fallback = DEFAULT_WAKE_PHRASE,
                "custom wake word is blank, using default"
            );
            WakePhrase::default()
        });

        let token = settings.auth_token.trim();
        let auth_token = (!token.is_empty()).then(|| SecretString::from(token.to_string()));

        let request_timeout = Duration::from_secs(settings.request_timeout_secs)
            .clamp(Duration::from_secs(1), MAX_REQUEST_TIMEOUT);

        let capture_limits = CaptureLimits {
            silence_timeout: Duration::from_millis(settings.silence_timeout_ms),
            max_duration: Duration::from_secs(settings.max_capture_secs.max(1)),
        };

        Self {
            webhook_url: settings.webhook_url.trim().to_string(),
            auth_token,
            tts_enabled: settings.tts_enabled,
            continuous_mode: settings.continuous_mode,
            hands_free: settings.hands_free,
            wake_phrase,
            capture_limits,
            request_timeout,
        }
    }

    /// Reject a configuration the session cannot run with
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the webhook URL is empty
    pub fn validate(&self) -> Result<()> {
        if self.webhook_url.is_empty() {
            return Err(Error::Config("webhook URL is empty".to_string()));
        }
        Ok(())
    }
}
