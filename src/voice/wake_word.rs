//! Wake phrase normalization and matching
//!
//! The detector reports what it heard; the session only reacts when that
//! text equals the configured phrase once case and whitespace are folded.

use crate::{Error, Result};

/// A normalized activation phrase (lowercase, single-spaced, 1+ words)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WakePhrase(String);

impl WakePhrase {
    /// Parse and normalize a phrase
    ///
    /// # Errors
    ///
    /// Returns error if the phrase has no words
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(Error::WakeWord("wake phrase must contain at least one word".to_string()));
        }

        Ok(Self(normalized))
    }

    /// Check whether heard text is this phrase
    #[must_use]
    pub fn matches(&self, heard: &str) -> bool {
        let heard = normalize(heard);
        let matched = heard == self.0;

        if matched {
            tracing::info!(wake_word = %self.0, "wake word detected");
        } else {
            tracing::trace!(wake_word = %self.0, heard = %heard, "ignoring non-matching phrase");
        }

        matched
    }

    /// The normalized phrase
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WakePhrase {
    fn default() -> Self {
        Self(crate::config::DEFAULT_WAKE_PHRASE.to_string())
    }
}

impl std::fmt::Display for WakePhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase and collapse runs of whitespace to single spaces
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
