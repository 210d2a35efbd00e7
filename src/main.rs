use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use openclaw_assistant::config::{
    SessionConfig, Settings, SettingsStore, WakeWordPreset, mask_token,
};
use openclaw_assistant::ErrorKind;
use openclaw_assistant::gateway::WebhookGateway;
use openclaw_assistant::session::{
    Activation, Capabilities, SessionEvent, SessionService, SessionState,
};
use openclaw_assistant::voice::{ConsoleCapture, ConsoleDetector, ConsoleInput, ConsolePlayback};

/// How long to wait for background work after the command finishes
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// OpenClaw - voice sessions for webhook-backed AI assistants
#[derive(Parser)]
#[command(name = "openclaw", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file to use instead of the standard location
    #[arg(long, env = "OPENCLAW_SETTINGS", global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a voice session on the console
    Run {
        /// Skip the wake word, as when activated by the assist button
        #[arg(long)]
        trusted: bool,

        /// Hold each printed reply this many milliseconds per word, as if spoken
        #[arg(long, value_name = "MS")]
        speak_pace: Option<u64>,
    },
    /// Interactive settings wizard
    Setup,
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Send a test request to the webhook
    TestConnection,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Change one or more settings
    Set {
        /// Webhook URL
        #[arg(long)]
        webhook_url: Option<String>,
        /// Bearer token (empty string clears it)
        #[arg(long)]
        auth_token: Option<String>,
        /// Speak replies
        #[arg(long)]
        tts: Option<bool>,
        /// Keep listening after each reply
        #[arg(long)]
        continuous: Option<bool>,
        /// Wake word preset (open_claw, hey_assistant, jarvis, computer, custom)
        #[arg(long)]
        wake_word: Option<WakeWordPreset>,
        /// Phrase used with the custom preset
        #[arg(long)]
        custom_wake_word: Option<String>,
        /// Re-open the mic after a reply without waiting for the wake word
        #[arg(long)]
        hands_free: Option<bool>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; stdout belongs to the conversation
    let filter = match cli.verbose {
        0 => "info,openclaw_assistant=info",
        1 => "info,openclaw_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    };

    // A cancelled console read can stay parked on stdin; don't wait for it
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    code
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let store = match cli.settings {
        Some(path) => SettingsStore::at(path),
        None => SettingsStore::open_default()?,
    };
    tracing::debug!(path = %store.path().display(), "using settings file");

    let command = cli.command.unwrap_or(Command::Run {
        trusted: false,
        speak_pace: None,
    });

    match command {
        Command::Run {
            trusted,
            speak_pace,
        } => cmd_run(store, trusted, speak_pace.map(Duration::from_millis)).await,
        Command::Setup => {
            openclaw_assistant::setup::run_setup(&store).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Settings { action } => match action {
            SettingsAction::Show => {
                cmd_settings_show(&store);
                Ok(ExitCode::SUCCESS)
            }
            SettingsAction::Set {
                webhook_url,
                auth_token,
                tts,
                continuous,
                wake_word,
                custom_wake_word,
                hands_free,
            } => {
                let mut settings = store.load_file();
                if let Some(url) = webhook_url {
                    settings.webhook_url = url.trim().to_string();
                }
                if let Some(token) = auth_token {
                    settings.auth_token = token.trim().to_string();
                }
                if let Some(v) = tts {
                    settings.tts_enabled = v;
                }
                if let Some(v) = continuous {
                    settings.continuous_mode = v;
                }
                if let Some(preset) = wake_word {
                    settings.wake_word_preset = preset;
                }
                if let Some(phrase) = custom_wake_word {
                    settings.custom_wake_word = phrase.trim().to_lowercase();
                }
                if let Some(v) = hands_free {
                    settings.hands_free = v;
                }

                store.save(&settings)?;
                println!("Saved {}", store.path().display());
                Ok(ExitCode::SUCCESS)
            }
        },
        Command::TestConnection => cmd_test_connection(&store).await,
    }
}

/// Run one console session until it terminates or Ctrl-C
async fn cmd_run(
    store: SettingsStore,
    trusted: bool,
    speak_pace: Option<Duration>,
) -> anyhow::Result<ExitCode> {
    let input = ConsoleInput::stdin();
    let factory = move |config: &SessionConfig| -> openclaw_assistant::Result<Capabilities> {
        Ok(Capabilities {
            detector: Box::new(ConsoleDetector::new(input.clone())),
            capture: Box::new(ConsoleCapture::new(input.clone())),
            playback: Box::new(
                speak_pace.map_or_else(ConsolePlayback::new, ConsolePlayback::with_pacing),
            ),
            gateway: Arc::new(WebhookGateway::new(config.request_timeout)?),
        })
    };

    let service = SessionService::new(store, factory);
    let activation = if trusted {
        Activation::Trusted
    } else {
        Activation::WakeWord
    };

    let session = match service.new_session(activation) {
        Ok(session) => session,
        Err(e) if e.kind() == ErrorKind::ConfigInvalid => {
            eprintln!("{e}. Run `openclaw setup` to configure the webhook.");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };
    let (handle, mut events, task) = session.spawn();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let interrupt = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let result = task.await?;
    // Drains the remaining events; the channel closes with the orchestrator
    let _ = printer.await;

    match result {
        Ok(reason) => match reason.error_kind() {
            Some(kind) if kind.is_user_visible() => {
                tracing::warn!(%kind, %reason, "session ended with failure");
                Ok(ExitCode::FAILURE)
            }
            _ => Ok(ExitCode::SUCCESS),
        },
        Err(e) => {
            eprintln!("{e}. Run `openclaw setup` to configure the webhook.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Started { session_id } => {
            tracing::debug!(%session_id, "session started");
        }
        SessionEvent::StateChanged { to, .. } => {
            if *to == SessionState::WaitingForWake {
                println!("(waiting for wake word)");
            }
        }
        SessionEvent::ListeningStarted => println!("(listening)"),
        SessionEvent::ListeningStopped => {}
        SessionEvent::Transcript { text } => println!("you> {text}"),
        SessionEvent::ReplyReady { .. } => {}
        SessionEvent::Error { kind, message } => {
            if kind.is_user_visible() {
                println!("{message}");
            }
        }
        SessionEvent::Terminated { reason } => println!("(session ended: {reason})"),
    }
}

fn cmd_settings_show(store: &SettingsStore) {
    let s: Settings = store.get();

    println!("Settings file: {}", store.path().display());
    println!();
    println!("webhook_url        = {}", display_or_unset(&s.webhook_url));
    println!("auth_token         = {}", display_or_unset(&mask_token(&s.auth_token)));
    println!("verified           = {}", s.verified);
    println!("tts_enabled        = {}", s.tts_enabled);
    println!("continuous_mode    = {}", s.continuous_mode);
    println!("hands_free         = {}", s.hands_free);
    println!("wake_word          = {} ({})", s.wake_word_preset.label(), s.wake_word_text());
    println!("request_timeout    = {}s", s.request_timeout_secs);
    println!("silence_timeout    = {}ms", s.silence_timeout_ms);
    println!("max_capture        = {}s", s.max_capture_secs);
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() { "(not set)" } else { value }
}

/// Test the effective webhook; the verified flag is only recorded for the stored one
async fn cmd_test_connection(store: &SettingsStore) -> anyhow::Result<ExitCode> {
    let settings = store.get();
    if settings.webhook_url.trim().is_empty() {
        eprintln!("No webhook URL configured. Run `openclaw setup` first.");
        return Ok(ExitCode::FAILURE);
    }

    let config = SessionConfig::from_settings(&settings);
    let gateway = WebhookGateway::new(config.request_timeout)?;
    let token = (!settings.auth_token.is_empty())
        .then(|| SecretString::from(settings.auth_token.clone()));

    println!("Testing {}...", settings.webhook_url);
    match gateway
        .test_connection(&settings.webhook_url, token.as_ref())
        .await
    {
        Ok(ack) => {
            println!("Connected ({} in {} ms)", ack.status, ack.latency.as_millis());
            if store.record_verified(&settings)? {
                println!("Marked verified in {}", store.path().display());
            } else {
                println!("Verified using environment overrides; settings file left unchanged");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("Failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
