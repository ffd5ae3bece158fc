use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub slack: SlackConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_address: String,
    pub slash_path: String,
    pub request_timeout_secs: u64,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    /// Unset disables request signing checks entirely (local development only).
    pub signing_secret: Option<SecretString>,
    pub timestamp_tolerance_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub listen_address: Option<String>,
    pub slash_path: Option<String>,
    pub signing_secret: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_address: "0.0.0.0:8080".to_string(),
                slash_path: "/v1/slack/slash".to_string(),
                request_timeout_secs: 30,
                graceful_shutdown_secs: 15,
            },
            slack: SlackConfig { signing_secret: None, timestamp_tolerance_secs: 300 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl SlackConfig {
    pub fn signing_enabled(&self) -> bool {
        self.signing_secret.is_some()
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_address(&self.listen_address)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("wadjet.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(listen_address) = server.listen_address {
                self.server.listen_address = listen_address;
            }
            if let Some(slash_path) = server.slash_path {
                self.server.slash_path = slash_path;
            }
            if let Some(request_timeout_secs) = server.request_timeout_secs {
                self.server.request_timeout_secs = request_timeout_secs;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(signing_secret_value) = slack.signing_secret {
                self.slack.signing_secret = Some(secret_value(signing_secret_value));
            }
            if let Some(timestamp_tolerance_secs) = slack.timestamp_tolerance_secs {
                self.slack.timestamp_tolerance_secs = timestamp_tolerance_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let listen_address =
            read_env("WADJET_SERVER_LISTEN_ADDRESS").or_else(|| read_env("WADJET_LISTEN"));
        if let Some(value) = listen_address {
            self.server.listen_address = value;
        }
        if let Some(value) = read_env("WADJET_SERVER_SLASH_PATH") {
            self.server.slash_path = value;
        }
        if let Some(value) = read_env("WADJET_SERVER_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs =
                parse_u64("WADJET_SERVER_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("WADJET_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("WADJET_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("WADJET_SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("WADJET_SLACK_TIMESTAMP_TOLERANCE_SECS") {
            self.slack.timestamp_tolerance_secs =
                parse_u64("WADJET_SLACK_TIMESTAMP_TOLERANCE_SECS", &value)?;
        }

        let log_level = read_env("WADJET_LOGGING_LEVEL").or_else(|| read_env("WADJET_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("WADJET_LOGGING_FORMAT").or_else(|| read_env("WADJET_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(listen_address) = overrides.listen_address {
            self.server.listen_address = listen_address;
        }
        if let Some(slash_path) = overrides.slash_path {
            self.server.slash_path = slash_path;
        }
        if let Some(signing_secret) = overrides.signing_secret {
            self.slack.signing_secret = Some(secret_value(signing_secret));
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    fn normalize(&mut self) {
        // `:8080` binds every interface, matching the conventional short form.
        let trimmed = self.server.listen_address.trim();
        self.server.listen_address = match trimmed.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => trimmed.to_string(),
        };

        // An empty secret from a file or flag means "unset", same as the env reader.
        let blank_secret = self
            .slack
            .signing_secret
            .as_ref()
            .map(|secret| secret.expose_secret().trim().is_empty())
            .unwrap_or(false);
        if blank_secret {
            self.slack.signing_secret = None;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_slack(&self.slack)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("wadjet.toml"), PathBuf::from("config/wadjet.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn parse_listen_address(value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse::<SocketAddr>().map_err(|_| {
        ConfigError::Validation(format!(
            "server.listen_address `{value}` must be `host:port` (for example `0.0.0.0:8080` or `:8080`)"
        ))
    })
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    parse_listen_address(&server.listen_address)?;

    if !server.slash_path.starts_with('/') {
        return Err(ConfigError::Validation(
            "server.slash_path must start with `/`".to_string(),
        ));
    }

    if server.request_timeout_secs == 0 || server.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "server.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.timestamp_tolerance_secs == 0 || slack.timestamp_tolerance_secs > 3600 {
        return Err(ConfigError::Validation(
            "slack.timestamp_tolerance_secs must be in range 1..=3600".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    slack: Option<SlackPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    listen_address: Option<String>,
    slash_path: Option<String>,
    request_timeout_secs: Option<u64>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    signing_secret: Option<String>,
    timestamp_tolerance_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const WADJET_VARS: &[&str] = &[
        "WADJET_SERVER_LISTEN_ADDRESS",
        "WADJET_LISTEN",
        "WADJET_SERVER_SLASH_PATH",
        "WADJET_SERVER_REQUEST_TIMEOUT_SECS",
        "WADJET_SLACK_SIGNING_SECRET",
        "WADJET_SLACK_TIMESTAMP_TOLERANCE_SECS",
        "WADJET_LOG_LEVEL",
        "WADJET_LOG_FORMAT",
        "TEST_WADJET_SIGNING_SECRET",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn missing_file_options() -> LoadOptions {
        LoadOptions {
            config_path: Some("does-not-exist/wadjet.toml".into()),
            ..LoadOptions::default()
        }
    }

    #[test]
    fn defaults_disable_signing_and_listen_on_8080() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(WADJET_VARS);

        let config = AppConfig::load(missing_file_options())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.server.listen_address == "0.0.0.0:8080", "default listen address")?;
        ensure(config.server.slash_path == "/v1/slack/slash", "default slash path")?;
        ensure(!config.slack.signing_enabled(), "signing should be disabled by default")?;
        ensure(config.slack.timestamp_tolerance_secs == 300, "default tolerance is 5 minutes")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "default format is compact")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(WADJET_VARS);

        env::set_var("TEST_WADJET_SIGNING_SECRET", "from-env-secret");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("wadjet.toml");
            fs::write(
                &path,
                r#"
[server]
listen_address = ":9090"

[slack]
signing_secret = "${TEST_WADJET_SIGNING_SECRET}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let secret = config
                .slack
                .signing_secret
                .as_ref()
                .map(|secret| secret.expose_secret().to_string());
            ensure(
                secret.as_deref() == Some("from-env-secret"),
                "signing secret should be interpolated from environment",
            )?;
            ensure(
                config.server.listen_address == "0.0.0.0:9090",
                "short listen address should be normalized",
            )?;
            Ok(())
        })();

        clear_vars(WADJET_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(WADJET_VARS);

        env::set_var("WADJET_SERVER_LISTEN_ADDRESS", "127.0.0.1:7000");
        env::set_var("WADJET_SLACK_SIGNING_SECRET", "env-secret");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("wadjet.toml");
            fs::write(
                &path,
                r#"
[server]
listen_address = "127.0.0.1:6000"
slash_path = "/slack/commands"

[slack]
signing_secret = "file-secret"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    listen_address: Some("127.0.0.1:5000".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.server.listen_address == "127.0.0.1:5000",
                "override listen address should win",
            )?;
            ensure(config.server.slash_path == "/slack/commands", "file slash path should apply")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            let secret = config
                .slack
                .signing_secret
                .as_ref()
                .map(|secret| secret.expose_secret().to_string());
            ensure(
                secret.as_deref() == Some("env-secret"),
                "env signing secret should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(WADJET_VARS);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(WADJET_VARS);

        env::set_var("WADJET_LOG_LEVEL", "warn");
        env::set_var("WADJET_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(missing_file_options())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(WADJET_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(WADJET_VARS);

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    listen_address: Some("not-an-address".to_string()),
                    ..ConfigOverrides::default()
                },
                ..missing_file_options()
            }) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("server.listen_address")
            );
            ensure(has_message, "validation failure should mention server.listen_address")
        })();

        clear_vars(WADJET_VARS);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(WADJET_VARS);

        env::set_var("WADJET_SLACK_TIMESTAMP_TOLERANCE_SECS", "five-minutes");

        let result = match AppConfig::load(missing_file_options()) {
            Ok(_) => Err("expected invalid override failure".to_string()),
            Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                key == "WADJET_SLACK_TIMESTAMP_TOLERANCE_SECS",
                "error should name the offending variable",
            ),
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(WADJET_VARS);
        result
    }

    #[test]
    fn blank_secret_override_disables_signing() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(WADJET_VARS);

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                signing_secret: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..missing_file_options()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(!config.slack.signing_enabled(), "blank secret should be treated as unset")
    }

    #[test]
    fn missing_required_file_is_an_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(WADJET_VARS);

        let result =
            AppConfig::load(LoadOptions { require_file: true, ..missing_file_options() });
        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "require_file should fail when the file is absent",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(WADJET_VARS);

        env::set_var("WADJET_SLACK_SIGNING_SECRET", "super-secret-signing-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(missing_file_options())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("super-secret-signing-value"),
                "debug output should not contain the signing secret",
            )?;
            ensure(config.slack.signing_enabled(), "signing should be enabled")?;
            Ok(())
        })();

        clear_vars(WADJET_VARS);
        result
    }
}
