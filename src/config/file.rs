//! TOML settings file
//!
//! Persists the settings record at `~/.config/openclaw/assistant/settings.toml`.
//! All keys are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Settings, WakeWordPreset};
use crate::{Error, Result};

/// On-disk schema of the settings file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    /// Connection settings
    #[serde(default)]
    pub connection: ConnectionFileConfig,

    /// Voice settings
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Wake word settings
    #[serde(default)]
    pub wake_word: WakeWordFileConfig,
}

/// `[connection]` table
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConnectionFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

/// `[voice]` table
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VoiceFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuous_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hands_free: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_capture_secs: Option<u64>,
}

/// `[wake_word]` table
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WakeWordFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<WakeWordPreset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

impl SettingsFile {
    /// Overlay the file onto default settings
    #[must_use]
    pub fn into_settings(self) -> Settings {
        let d = Settings::default();
        Settings {
            webhook_url: self.connection.webhook_url.unwrap_or(d.webhook_url),
            auth_token: self.connection.auth_token.unwrap_or(d.auth_token),
            verified: self.connection.verified.unwrap_or(d.verified),
            tts_enabled: self.voice.tts_enabled.unwrap_or(d.tts_enabled),
            continuous_mode: self.voice.continuous_mode.unwrap_or(d.continuous_mode),
            wake_word_preset: self.wake_word.preset.unwrap_or(d.wake_word_preset),
            custom_wake_word: self.wake_word.custom.unwrap_or(d.custom_wake_word),
            hands_free: self.voice.hands_free.unwrap_or(d.hands_free),
            request_timeout_secs: self
                .connection
                .request_timeout_secs
                .unwrap_or(d.request_timeout_secs),
            silence_timeout_ms: self.voice.silence_timeout_ms.unwrap_or(d.silence_timeout_ms),
            max_capture_secs: self.voice.max_capture_secs.unwrap_or(d.max_capture_secs),
        }
    }

    /// Full file image of a settings record
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            connection: ConnectionFileConfig {
                webhook_url: non_empty(&settings.webhook_url),
                auth_token: non_empty(&settings.auth_token),
                verified: Some(settings.verified),
                request_timeout_secs: Some(settings.request_timeout_secs),
            },
            voice: VoiceFileConfig {
                tts_enabled: Some(settings.tts_enabled),
                continuous_mode: Some(settings.continuous_mode),
                hands_free: Some(settings.hands_free),
                silence_timeout_ms: Some(settings.silence_timeout_ms),
                max_capture_secs: Some(settings.max_capture_secs),
            },
            wake_word: WakeWordFileConfig {
                preset: Some(settings.wake_word_preset),
                custom: non_empty(&settings.custom_wake_word),
            },
        }
    }
}

/// Return the settings file path: `~/.config/openclaw/assistant/settings.toml`
#[must_use]
pub fn settings_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("openclaw")
            .join("assistant")
            .join("settings.toml")
    })
}

/// Settings record backed by a TOML file
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at the standard path
    ///
    /// # Errors
    ///
    /// Returns error if no home directory can be determined
    pub fn open_default() -> Result<Self> {
        settings_file_path()
            .map(Self::at)
            .ok_or_else(|| Error::Settings("cannot determine config directory".to_string()))
    }

    /// Store at an explicit path
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings: env > file > default
    #[must_use]
    pub fn get(&self) -> Settings {
        self.load_file().with_env_overrides()
    }

    /// Settings as stored on disk, without env overrides
    ///
    /// Returns defaults if the file doesn't exist or can't be parsed.
    #[must_use]
    pub fn load_file(&self) -> Settings {
        if !self.path.exists() {
            return Settings::default();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match toml::from_str::<SettingsFile>(&content) {
                Ok(file) => {
                    tracing::debug!(path = %self.path.display(), "loaded settings file");
                    file.into_settings()
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "failed to parse settings file, using defaults"
                    );
                    Settings::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read settings file"
                );
                Settings::default()
            }
        }
    }

    /// Persist a settings record
    ///
    /// Clears `verified` when the webhook URL or token differ from what is
    /// stored, since the earlier connection test no longer applies.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is missing or the file cannot be written
    pub fn save(&self, settings: &Settings) -> Result<()> {
        settings.validate_for_save()?;

        let stored = self.load_file();
        let mut to_write = settings.clone();
        if to_write.verified
            && (stored.webhook_url != to_write.webhook_url
                || stored.auth_token != to_write.auth_token)
        {
            tracing::debug!("connection changed, clearing verified flag");
            to_write.verified = false;
        }

        self.write(&to_write)
    }

    /// Record a successful connection test
    ///
    /// The flag describes the stored connection only. When `tested` differs
    /// from the file (for instance through env overrides) nothing is written,
    /// so env-supplied URLs and tokens never reach disk. Returns whether the
    /// flag was persisted.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn record_verified(&self, tested: &Settings) -> Result<bool> {
        let mut stored = self.load_file();
        if !stored.same_connection(tested) {
            tracing::info!(
                path = %self.path.display(),
                "tested connection is not the stored one, leaving settings file unchanged"
            );
            return Ok(false);
        }

        stored.verified = true;
        stored.validate_for_save()?;
        self.write(&stored)?;
        Ok(true)
    }

    fn write(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let body = toml::to_string_pretty(&SettingsFile::from_settings(settings))?;
        std::fs::write(&self.path, body)?;

        tracing::info!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

impl super::SettingsSource for SettingsStore {
    fn settings(&self) -> Settings {
        self.get()
    }
}
