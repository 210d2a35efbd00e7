//! Session entry point for the host
//!
//! Each activation gets a fresh orchestrator built from a single read of the
//! settings record, so edits made while a session runs apply to the next one.

use tokio::sync::mpsc;

use super::{
    Activation, Capabilities, SessionEvent, SessionHandle, SessionOrchestrator, TerminationReason,
};
use crate::Result;
use crate::config::{SessionConfig, SettingsSource};

/// Builds the platform capabilities for one session
pub trait CapabilityFactory: Send + Sync {
    /// Create detector, capture, playback, and gateway for `config`
    ///
    /// # Errors
    ///
    /// Returns error if a capability cannot be constructed
    fn build(&self, config: &SessionConfig) -> Result<Capabilities>;
}

impl<F> CapabilityFactory for F
where
    F: Fn(&SessionConfig) -> Result<Capabilities> + Send + Sync,
{
    fn build(&self, config: &SessionConfig) -> Result<Capabilities> {
        self(config)
    }
}

/// A session ready to run
pub struct NewSession {
    /// How the platform activated the session
    pub activation: Activation,
    /// State machine; consume with `run` or `spawn`
    pub orchestrator: SessionOrchestrator,
    /// Cancellation and state queries
    pub handle: SessionHandle,
    /// Lifecycle events
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// Creates sessions from the persisted settings
pub struct SessionService<S, F> {
    settings: S,
    factory: F,
}

impl<S: SettingsSource, F: CapabilityFactory> SessionService<S, F> {
    /// Create a service over a settings source and capability factory
    pub const fn new(settings: S, factory: F) -> Self {
        Self { settings, factory }
    }

    /// Prepare a session for one activation
    ///
    /// Reads the settings once and validates them before the factory runs,
    /// so an unusable configuration never builds a capability.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unusable configuration, otherwise any
    /// error from building the capabilities
    pub fn new_session(&self, activation: Activation) -> Result<NewSession> {
        let settings = self.settings.settings();
        let config = SessionConfig::from_settings(&settings);
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "refusing to prepare session");
            return Err(e);
        }

        tracing::debug!(
            ?activation,
            verified = settings.verified,
            wake_word = %config.wake_phrase,
            "preparing session"
        );

        let caps = self.factory.build(&config)?;
        let (orchestrator, handle, events) = SessionOrchestrator::new(config, caps);

        Ok(NewSession {
            activation,
            orchestrator,
            handle,
            events,
        })
    }
}

impl NewSession {
    /// Run the session on its own task with the activation it was created for
    #[must_use]
    pub fn spawn(
        self,
    ) -> (
        SessionHandle,
        mpsc::UnboundedReceiver<SessionEvent>,
        tokio::task::JoinHandle<Result<TerminationReason>>,
    ) {
        let task = self.orchestrator.spawn(self.activation);
        (self.handle, self.events, task)
    }
}
