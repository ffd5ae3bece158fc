mod bootstrap;
mod health;
mod respond;
mod slash;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use wadjet_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "wadjet-server", about = "Slack slash command gateway")]
struct Args {
    /// HTTP listen address, e.g. `:8080` or `127.0.0.1:8080`.
    #[arg(long, value_name = "ADDRESS")]
    listen: Option<String>,
    /// The Slack signing secret. Leave unset to accept unsigned requests.
    #[arg(long, value_name = "SECRET")]
    slack_signing_secret: Option<String>,
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

impl Args {
    fn load_options(self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config,
            overrides: ConfigOverrides {
                listen_address: self.listen,
                slash_path: None,
                signing_secret: self.slack_signing_secret,
                log_level: self.log_level,
                log_format: self.log_format,
            },
        }
    }
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use wadjet_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Args::parse()).await
}

async fn run(args: Args) -> Result<()> {
    // Logging depends on config, so config errors surface before any subscriber exists.
    let config = AppConfig::load(args.load_options())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config);
    let address = app.config.server.socket_addr()?;
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("could not bind {address}"))?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        listen_address = %address,
        slash_path = %app.config.server.slash_path,
        "wadjet-server listening"
    );

    let shutdown = CancellationToken::new();
    let server = axum::serve(listener, app.router())
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let mut server_task = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server_task => {
            joined.context("server task failed")?.context("server error")?;
            return Ok(());
        }
        signal = wait_for_shutdown() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "wadjet-server stopping"
    );
    shutdown.cancel();

    match tokio::time::timeout(grace, &mut server_task).await {
        Ok(joined) => joined.context("server task failed")?.context("server error")?,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight requests did not finish in time; aborting"
            );
            server_task.abort();
        }
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use wadjet_core::config::LogFormat;

    use super::Args;

    #[test]
    fn flags_become_config_overrides() {
        let args = Args::parse_from([
            "wadjet-server",
            "--listen",
            ":9090",
            "--slack-signing-secret",
            "shh",
            "--log-format",
            "json",
        ]);

        let options = args.load_options();
        assert!(!options.require_file);
        assert_eq!(options.overrides.listen_address.as_deref(), Some(":9090"));
        assert_eq!(options.overrides.signing_secret.as_deref(), Some("shh"));
        assert_eq!(options.overrides.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let args = Args::parse_from(["wadjet-server", "--config", "/etc/wadjet/wadjet.toml"]);
        assert!(args.load_options().require_file);
    }
}
