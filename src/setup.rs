//! Interactive settings wizard (`openclaw setup`)

use dialoguer::{Confirm, Input, Password, Select};
use secrecy::SecretString;

use crate::config::{Settings, SettingsStore, WakeWordPreset, mask_token, validate_webhook_url};
use crate::gateway::WebhookGateway;

/// Run the interactive settings wizard
///
/// # Errors
///
/// Returns error if user input fails or settings cannot be written
pub async fn run_setup(store: &SettingsStore) -> anyhow::Result<()> {
    println!("OpenClaw Assistant Setup\n");

    let mut settings = store.load_file();
    if store.path().exists() {
        println!("Existing settings found at {}\n", store.path().display());
    }

    // 1. Webhook URL
    let url_input = Input::<String>::new()
        .with_prompt("Webhook URL")
        .validate_with(|input: &String| validate_webhook_url(input));
    let url_input = if settings.webhook_url.is_empty() {
        url_input
    } else {
        url_input.default(settings.webhook_url.clone())
    };
    settings.webhook_url = url_input.interact_text()?.trim().to_string();

    // 2. Auth token
    let prompt = if settings.auth_token.is_empty() {
        "Auth token (optional)".to_string()
    } else {
        format!(
            "Auth token (current: {}, leave blank to keep)",
            mask_token(&settings.auth_token)
        )
    };
    let token = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?;
    if !token.trim().is_empty() {
        settings.auth_token = token.trim().to_string();
    }

    // 3. Connection test (optional)
    let test_now = Confirm::new()
        .with_prompt("Test the connection now?")
        .default(true)
        .interact()?;

    let check = if test_now {
        if test_connection(&settings.webhook_url, &settings.auth_token).await {
            ConnectionCheck::Passed
        } else {
            ConnectionCheck::Failed
        }
    } else {
        ConnectionCheck::Skipped
    };

    // 4. Voice output
    settings.tts_enabled = Confirm::new()
        .with_prompt("Read AI responses aloud?")
        .default(settings.tts_enabled)
        .interact()?;

    // 5. Continuous conversation
    settings.continuous_mode = Confirm::new()
        .with_prompt("Auto-start mic after AI speaks?")
        .default(settings.continuous_mode)
        .interact()?;

    // 6. Wake word
    let labels: Vec<&str> = WakeWordPreset::ALL.iter().map(|p| p.label()).collect();
    let current = WakeWordPreset::ALL
        .iter()
        .position(|&p| p == settings.wake_word_preset)
        .unwrap_or(0);

    let idx = Select::new()
        .with_prompt("Wake word")
        .items(&labels)
        .default(current)
        .interact()?;
    settings.wake_word_preset = WakeWordPreset::ALL[idx];

    if settings.wake_word_preset == WakeWordPreset::Custom {
        let phrase = Input::<String>::new()
            .with_prompt("Custom wake word (enter 2-3 words, lowercase)")
            .with_initial_text(settings.custom_wake_word.clone())
            .validate_with(|input: &String| {
                if input.trim().is_empty() {
                    Err("wake word cannot be blank")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;
        settings.custom_wake_word = phrase.trim().to_lowercase();
    }

    // 7. Save
    save_settings(store, settings, check)?;
    println!("\nSettings written to {}", store.path().display());
    println!("\nSetup complete! Run `openclaw run` to start a session.");

    Ok(())
}

/// Outcome of the wizard's optional connection test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionCheck {
    Skipped,
    Passed,
    Failed,
}

/// Write the wizard's settings and apply the connection test to `verified`
///
/// A skipped test leaves the flag to `save`, which keeps it only while the
/// connection is unchanged. A failed test always clears it.
fn save_settings(
    store: &SettingsStore,
    mut settings: Settings,
    check: ConnectionCheck,
) -> crate::Result<()> {
    if check == ConnectionCheck::Failed {
        settings.verified = false;
    }

    store.save(&settings)?;
    if check == ConnectionCheck::Passed {
        store.record_verified(&settings)?;
    }
    Ok(())
}

/// Test the webhook and report the result; returns whether it succeeded
async fn test_connection(webhook_url: &str, auth_token: &str) -> bool {
    let gateway = match WebhookGateway::new(crate::config::MAX_REQUEST_TIMEOUT) {
        Ok(g) => g,
        Err(e) => {
            println!("Failed: {e}");
            return false;
        }
    };

    let token = (!auth_token.is_empty()).then(|| SecretString::from(auth_token.to_string()));
    match gateway.test_connection(webhook_url, token.as_ref()).await {
        Ok(ack) => {
            println!("Connected ({} in {} ms)", ack.status, ack.latency.as_millis());
            true
        }
        Err(e) => {
            println!("Failed: {e}");
            false
        }
    }
}
