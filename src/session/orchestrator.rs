//! Session state machine
//!
//! Drives one interaction through wake, capture, dispatch, and playback.
//! Stages run strictly one after another on a single task, so at most one
//! capture, one request, and one playback are ever active, and the
//! microphone and speaker are never held at the same time.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{Activation, SessionEvent, SessionHandle, SessionState, TerminationReason};
use crate::config::SessionConfig;
use crate::gateway::{AssistantGateway, AssistantReply, TurnRequest};
use crate::voice::{
    CaptureOutcome, PlaybackOutcome, SpeechCapture, SpeechPlayback, Utterance, WakeWordDetector,
};
use crate::{ErrorKind, Result};

/// Platform capabilities a session drives
pub struct Capabilities {
    /// Wake phrase detector
    pub detector: Box<dyn WakeWordDetector>,
    /// Utterance capture and transcription
    pub capture: Box<dyn SpeechCapture>,
    /// Reply playback
    pub playback: Box<dyn SpeechPlayback>,
    /// Webhook round-trip
    pub gateway: Arc<dyn AssistantGateway>,
}

/// Outcome of one stage
enum Flow {
    Next(SessionState),
    Stop(TerminationReason),
}

/// Runs a single voice interaction session
pub struct SessionOrchestrator {
    id: String,
    config: SessionConfig,
    caps: Capabilities,
    state: watch::Sender<SessionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
    detector_armed: bool,
    utterance: Option<Utterance>,
    reply: Option<AssistantReply>,
}

impl SessionOrchestrator {
    /// Create a session from a configuration snapshot
    ///
    /// Returns the orchestrator, a handle for cancellation and state queries,
    /// and the receiving end of the lifecycle event channel.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        caps: Capabilities,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let id = Uuid::new_v4().to_string();
        let (state, state_rx) = watch::channel(SessionState::Idle);
        let (events, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = SessionHandle {
            id: id.clone(),
            cancel: cancel.clone(),
            state: state_rx,
        };

        let orchestrator = Self {
            id,
            config,
            caps,
            state,
            events,
            cancel,
            detector_armed: false,
            utterance: None,
            reply: None,
        };

        (orchestrator, handle, events_rx)
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Run the session on its own task
    pub fn spawn(self, activation: Activation) -> JoinHandle<Result<TerminationReason>> {
        tokio::spawn(self.run(activation))
    }

    /// Run the session to completion
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is unusable. This happens
    /// before any audio resource is touched. Every other failure is reported
    /// through events and the returned [`TerminationReason`].
    pub async fn run(mut self, activation: Activation) -> Result<TerminationReason> {
        if let Err(e) = self.config.validate() {
            tracing::error!(session_id = %self.id, error = %e, "refusing to start session");
            self.finish(TerminationReason::ConfigInvalid(e.to_string()));
            return Err(e);
        }

        tracing::info!(
            session_id = %self.id,
            wake_word = %self.config.wake_phrase,
            continuous = self.config.continuous_mode,
            tts = self.config.tts_enabled,
            ?activation,
            "session started"
        );
        self.emit(SessionEvent::Started {
            session_id: self.id.clone(),
        });

        self.transition(match activation {
            Activation::WakeWord => SessionState::WaitingForWake,
            Activation::Trusted => SessionState::Listening,
        });

        let reason = loop {
            if self.cancel.is_cancelled() {
                break TerminationReason::Cancelled;
            }

            let flow = match self.state() {
                SessionState::WaitingForWake => self.wait_for_wake().await,
                SessionState::Listening => self.listen().await,
                SessionState::Transcribing => self.transcribe(),
                SessionState::Dispatching => self.dispatch().await,
                SessionState::Speaking => self.speak_reply().await,
                SessionState::Idle | SessionState::Terminated => {
                    Flow::Stop(TerminationReason::Completed)
                }
            };

            match flow {
                Flow::Next(next) => self.transition(next),
                Flow::Stop(reason) => break reason,
            }
        };

        self.finish(reason.clone());
        Ok(reason)
    }

    /// Wait for a detection matching the configured phrase
    async fn wait_for_wake(&mut self) -> Flow {
        if !self.detector_armed {
            let armed =
                until_cancelled(&self.cancel, self.caps.detector.arm(&self.config.wake_phrase))
                    .await;
            match armed {
                None => return Flow::Stop(TerminationReason::Cancelled),
                Some(Err(e)) => return self.fatal(ErrorKind::DetectorFailure, &e.to_string()),
                Some(Ok(())) => {
                    self.detector_armed = true;
                    tracing::info!(wake_word = %self.config.wake_phrase, "listening for wake word");
                }
            }
        }

        let detection = until_cancelled(&self.cancel, self.caps.detector.next_detection()).await;
        match detection {
            None => Flow::Stop(TerminationReason::Cancelled),
            Some(Ok(Some(d))) if self.config.wake_phrase.matches(&d.phrase) => {
                Flow::Next(SessionState::Listening)
            }
            Some(Ok(Some(_))) => Flow::Next(SessionState::WaitingForWake),
            Some(Ok(None)) => {
                tracing::info!(session_id = %self.id, "wake word stream ended");
                Flow::Stop(TerminationReason::InputClosed)
            }
            Some(Err(e)) => self.fatal(ErrorKind::DetectorFailure, &e.to_string()),
        }
    }

    /// Capture one utterance
    async fn listen(&mut self) -> Flow {
        self.emit(SessionEvent::ListeningStarted);
        let limits = self.config.capture_limits;
        let outcome = until_cancelled(&self.cancel, self.caps.capture.capture(limits)).await;
        self.emit(SessionEvent::ListeningStopped);

        let Some(outcome) = outcome else {
            self.caps.capture.cancel();
            return Flow::Stop(TerminationReason::Cancelled);
        };

        match outcome {
            Ok(CaptureOutcome::Utterance(u)) if !u.is_empty() => {
                self.utterance = Some(u);
                Flow::Next(SessionState::Transcribing)
            }
            Ok(CaptureOutcome::Utterance(_) | CaptureOutcome::Empty) => {
                self.end_quiet_turn(ErrorKind::CaptureEmpty)
            }
            Ok(CaptureOutcome::TimedOut) => self.end_quiet_turn(ErrorKind::CaptureTimeout),
            Err(e) => self.turn_failed(ErrorKind::CaptureFailure, &e.to_string()).await,
        }
    }

    /// Normalize the captured transcript and report it
    fn transcribe(&mut self) -> Flow {
        let Some(utterance) = self.utterance.as_mut() else {
            return self.end_quiet_turn(ErrorKind::CaptureEmpty);
        };

        utterance.transcript = utterance.transcript.trim().to_string();
        let text = utterance.transcript.clone();
        tracing::info!(session_id = %self.id, transcript = %text, "utterance captured");
        self.emit(SessionEvent::Transcript { text });

        Flow::Next(SessionState::Dispatching)
    }

    /// Send the utterance to the webhook
    async fn dispatch(&mut self) -> Flow {
        let Some(utterance) = self.utterance.take() else {
            return self.end_quiet_turn(ErrorKind::CaptureEmpty);
        };

        let request = TurnRequest {
            webhook_url: &self.config.webhook_url,
            auth_token: self.config.auth_token.as_ref(),
            transcript: &utterance.transcript,
            session_id: &self.id,
        };
        let result = until_cancelled(&self.cancel, self.caps.gateway.dispatch(request)).await;

        let Some(result) = result else {
            tracing::info!(session_id = %self.id, "request abandoned on cancel");
            return Flow::Stop(TerminationReason::Cancelled);
        };

        match result {
            Ok(reply) => {
                self.emit(SessionEvent::ReplyReady {
                    text: reply.text.clone(),
                });

                if self.config.tts_enabled && !reply.text.is_empty() {
                    self.reply = Some(reply);
                    Flow::Next(SessionState::Speaking)
                } else {
                    self.after_reply(reply.should_continue_listening)
                }
            }
            Err(e) => self.turn_failed(e.kind(), &e.to_string()).await,
        }
    }

    /// Speak the pending reply
    async fn speak_reply(&mut self) -> Flow {
        let Some(reply) = self.reply.take() else {
            return self.after_reply(true);
        };

        if !self.play(&reply.text).await {
            return Flow::Stop(TerminationReason::Cancelled);
        }

        self.after_reply(reply.should_continue_listening)
    }

    /// Play text; returns `false` if the session was cancelled meanwhile
    async fn play(&mut self, text: &str) -> bool {
        let outcome = until_cancelled(&self.cancel, self.caps.playback.speak(text)).await;

        match outcome {
            None => {
                self.caps.playback.cancel();
                false
            }
            Some(Ok(PlaybackOutcome::Completed)) => true,
            Some(Ok(PlaybackOutcome::Cancelled)) => {
                tracing::debug!(session_id = %self.id, "playback interrupted by platform");
                true
            }
            Some(Err(e)) => {
                tracing::warn!(session_id = %self.id, error = %e, "playback failed");
                self.emit(SessionEvent::Error {
                    kind: ErrorKind::PlaybackFailure,
                    message: format!("Failed: {e}"),
                });
                true
            }
        }
    }

    /// Loop decision after a reply
    fn after_reply(&self, continue_requested: bool) -> Flow {
        if !self.config.continuous_mode {
            return Flow::Stop(TerminationReason::Completed);
        }

        if !continue_requested {
            tracing::info!(session_id = %self.id, "assistant ended the conversation");
            return Flow::Stop(TerminationReason::Completed);
        }

        if self.config.hands_free {
            Flow::Next(SessionState::Listening)
        } else {
            Flow::Next(SessionState::WaitingForWake)
        }
    }

    /// End a turn in which nothing usable was said
    fn end_quiet_turn(&self, kind: ErrorKind) -> Flow {
        tracing::debug!(session_id = %self.id, %kind, "turn ended without input");

        if self.config.continuous_mode {
            Flow::Next(SessionState::WaitingForWake)
        } else {
            Flow::Stop(TerminationReason::NoInput)
        }
    }

    /// Report a failed turn, then continue or stop depending on the mode
    async fn turn_failed(&mut self, kind: ErrorKind, detail: &str) -> Flow {
        let message = format!("Failed: {detail}");
        tracing::warn!(session_id = %self.id, %kind, error = detail, "turn failed");
        self.emit(SessionEvent::Error {
            kind,
            message: message.clone(),
        });

        if self.config.tts_enabled {
            self.transition(SessionState::Speaking);
            if !self.play(&message).await {
                return Flow::Stop(TerminationReason::Cancelled);
            }
        }

        if self.config.continuous_mode {
            Flow::Next(SessionState::WaitingForWake)
        } else {
            Flow::Stop(TerminationReason::Failed { kind, message })
        }
    }

    /// Report an error that ends the session regardless of mode
    fn fatal(&self, kind: ErrorKind, detail: &str) -> Flow {
        let message = format!("Failed: {detail}");
        tracing::error!(session_id = %self.id, %kind, error = detail, "session failed");
        self.emit(SessionEvent::Error {
            kind,
            message: message.clone(),
        });
        Flow::Stop(TerminationReason::Failed { kind, message })
    }

    fn transition(&self, next: SessionState) {
        let from = self.state();
        if from == next {
            return;
        }

        tracing::debug!(session_id = %self.id, %from, to = %next, "state transition");
        self.state.send_replace(next);
        self.emit(SessionEvent::StateChanged { from, to: next });
    }

    /// Release resources and publish the terminal event; runs once per session
    fn finish(&mut self, reason: TerminationReason) {
        if self.detector_armed {
            self.caps.detector.disarm();
            self.detector_armed = false;
        }

        self.transition(SessionState::Terminated);
        tracing::info!(session_id = %self.id, %reason, "session terminated");
        self.emit(SessionEvent::Terminated { reason });
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!(session_id = %self.id, "event receiver dropped");
        }
    }
}

/// Await `fut` unless the token fires first
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}
