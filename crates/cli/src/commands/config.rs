use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use toml::Value as TomlValue;
use wadjet_core::config::{AppConfig, LoadOptions};

use super::CommandResult;

const COMMAND: &str = "config";

pub fn run(config_path: Option<PathBuf>) -> CommandResult {
    let options = LoadOptions {
        require_file: config_path.is_some(),
        config_path: config_path.clone(),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let file_path = config_path.or_else(detect_config_path);
    let file_doc = load_config_file_doc(file_path.as_deref());
    let sources = Sources { file_path: file_path.as_deref(), file_doc: file_doc.as_ref() };

    let secret = if config.slack.signing_enabled() { "<redacted>" } else { "<unset>" };
    let entries = [
        (
            "server.listen_address",
            config.server.listen_address.clone(),
            &["WADJET_SERVER_LISTEN_ADDRESS", "WADJET_LISTEN"][..],
        ),
        ("server.slash_path", config.server.slash_path.clone(), &["WADJET_SERVER_SLASH_PATH"][..]),
        (
            "server.request_timeout_secs",
            config.server.request_timeout_secs.to_string(),
            &["WADJET_SERVER_REQUEST_TIMEOUT_SECS"][..],
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["WADJET_SERVER_GRACEFUL_SHUTDOWN_SECS"][..],
        ),
        ("slack.signing_secret", secret.to_string(), &["WADJET_SLACK_SIGNING_SECRET"][..]),
        (
            "slack.timestamp_tolerance_secs",
            config.slack.timestamp_tolerance_secs.to_string(),
            &["WADJET_SLACK_TIMESTAMP_TOLERANCE_SECS"][..],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["WADJET_LOGGING_LEVEL", "WADJET_LOG_LEVEL"][..],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["WADJET_LOGGING_FORMAT", "WADJET_LOG_FORMAT"][..],
        ),
    ];

    let mut data = Map::new();
    for (key, value, env_keys) in entries {
        let mut entry = Map::new();
        entry.insert("value".to_string(), Value::String(value));
        entry.insert("source".to_string(), Value::String(sources.field_source(key, env_keys)));
        data.insert(key.to_string(), Value::Object(entry));
    }

    CommandResult::success_with_data(
        COMMAND,
        "effective config (source precedence: env > file > default)",
        Some(Value::Object(data)),
    )
}

struct Sources<'a> {
    file_path: Option<&'a Path>,
    file_doc: Option<&'a TomlValue>,
}

impl Sources<'_> {
    fn field_source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("wadjet.toml"), PathBuf::from("config/wadjet.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<TomlValue> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<toml::Table>().ok().map(TomlValue::Table)
}

fn contains_path(root: &TomlValue, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
