pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "wadjet",
    about = "Wadjet operator CLI",
    long_about = "Sign test requests for the slash endpoint and inspect effective configuration.",
    after_help = "Examples:\n  wadjet sign --secret s3cr3t --body 'command=%2Ftest&text=hello'\n  wadjet config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Compute the Slack signature headers for a form body")]
    Sign {
        #[arg(long, help = "Signing secret (defaults to the configured slack.signing_secret)")]
        secret: Option<String>,
        #[arg(long, help = "Unix timestamp to sign with (defaults to now)")]
        timestamp: Option<i64>,
        #[arg(long, help = "Form-encoded request body, exactly as it will be sent")]
        body: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config {
        #[arg(long, help = "Explicit config file path")]
        config: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Sign { secret, timestamp, body } => {
            commands::sign::run(commands::sign::SignRequest { secret, timestamp, body })
        }
        Command::Config { config } => commands::config::run(config),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
