use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::json;
use wadjet_core::config::{AppConfig, LoadOptions};
use wadjet_slack::signature::{sign, SIGNATURE_HEADER, TIMESTAMP_HEADER};

use super::CommandResult;

const COMMAND: &str = "sign";

#[derive(Debug, Clone, Default)]
pub struct SignRequest {
    pub secret: Option<String>,
    pub timestamp: Option<i64>,
    pub body: String,
}

/// Prints the headers that make `body` pass verification at `timestamp`.
pub fn run(request: SignRequest) -> CommandResult {
    let secret = match request.secret {
        Some(secret) if !secret.trim().is_empty() => secret,
        _ => match configured_secret() {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                return CommandResult::failure(
                    COMMAND,
                    "missing_secret",
                    "no signing secret given: pass --secret or set WADJET_SLACK_SIGNING_SECRET",
                    2,
                );
            }
            Err(message) => {
                return CommandResult::failure(COMMAND, "config_validation", message, 2);
            }
        },
    };

    let timestamp = request.timestamp.unwrap_or_else(|| Utc::now().timestamp());
    let signature = match sign(&secret, timestamp, request.body.as_bytes()) {
        Ok(signature) => signature,
        Err(error) => return CommandResult::failure(COMMAND, "signing", error.to_string(), 1),
    };

    CommandResult::success_with_data(
        COMMAND,
        format!("signed {} body bytes at timestamp {timestamp}", request.body.len()),
        Some(json!({
            "headers": {
                TIMESTAMP_HEADER: timestamp.to_string(),
                SIGNATURE_HEADER: signature,
            },
            "body": request.body,
        })),
    )
}

fn configured_secret() -> Result<Option<String>, String> {
    let config = AppConfig::load(LoadOptions::default())
        .map_err(|error| format!("config validation failed: {error}"))?;
    Ok(config.slack.signing_secret.map(|secret| secret.expose_secret().to_string()))
}
