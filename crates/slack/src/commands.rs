use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use clap::error::ErrorKind;
use clap::ArgMatches;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use wadjet_core::RequestError;

use crate::blocks::Reply;
use crate::payload::{normalize_command_name, SlashCommand};

/// Everything a handler knows about the request that invoked it.
#[derive(Clone, Debug)]
pub struct CommandContext {
    pub request_id: String,
    pub slash: SlashCommand,
    cancellation: CancellationToken,
}

impl CommandContext {
    pub fn new(
        request_id: impl Into<String>,
        slash: SlashCommand,
        cancellation: CancellationToken,
    ) -> Self {
        Self { request_id: request_id.into(), slash, cancellation }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the request is abandoned or times out.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    pub fn ensure_active(&self) -> Result<(), CommandError> {
        if self.is_cancelled() {
            Err(CommandError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    /// `--help` or similar; not a failure.
    #[error("help requested")]
    HelpRequested,
    #[error("{0}")]
    Usage(String),
    #[error("command cancelled")]
    Cancelled,
    /// Ends the request with this exact status instead of a generic 500.
    #[error(transparent)]
    Abort(#[from] RequestError),
    #[error("could not write command output")]
    Output(#[from] fmt::Error),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Text a handler writes for the user: diagnostics, usage, plain results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Output {
    buffer: String,
}

impl Output {
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl fmt::Write for Output {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buffer.push_str(s);
        Ok(())
    }
}

/// Per-invocation argument parser. Parse failures and help text are written to
/// the invocation's own [`Output`] and returned as errors; nothing here ever
/// exits the process or touches stdout.
#[derive(Debug)]
pub struct FlagSet {
    name: String,
    output: Output,
}

impl FlagSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), output: Output::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&mut self) -> &mut Output {
        &mut self.output
    }

    pub fn captured(&self) -> &str {
        self.output.as_str()
    }

    pub fn into_output(self) -> String {
        self.output.into_string()
    }

    /// Parses `args` (without a program name) against `spec`.
    pub fn parse(&mut self, spec: clap::Command, args: &[String]) -> Result<ArgMatches, CommandError> {
        match spec.no_binary_name(true).try_get_matches_from(args) {
            Ok(matches) => Ok(matches),
            Err(error) => {
                let rendered = error.render().to_string();
                self.output.buffer.push_str(&rendered);

                match error.kind() {
                    ErrorKind::DisplayHelp
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                    | ErrorKind::DisplayVersion => Err(CommandError::HelpRequested),
                    _ => Err(CommandError::Usage(summarize_parse_error(&rendered))),
                }
            }
        }
    }
}

fn summarize_parse_error(rendered: &str) -> String {
    let first = rendered.lines().next().unwrap_or_default().trim();
    first.strip_prefix("error: ").unwrap_or(first).to_owned()
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Registry key, without the leading slash.
    fn name(&self) -> &str;

    async fn run(
        &self,
        ctx: CommandContext,
        flags: &mut FlagSet,
        args: Vec<String>,
    ) -> Result<Option<Reply>, CommandError>;
}

#[derive(Default)]
pub struct CommandRegistryBuilder {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A later registration under the same name replaces the earlier one.
    pub fn register<H>(&mut self, handler: H) -> &mut Self
    where
        H: CommandHandler + 'static,
    {
        let name = normalize_command_name(handler.name());
        self.handlers.insert(name, Arc::new(handler));
        self
    }

    pub fn build(&mut self) -> CommandRegistry {
        CommandRegistry { handlers: std::mem::take(&mut self.handlers) }
    }
}

/// Command name to handler. Built once at startup; there is no way to change
/// it afterwards, so it can be shared across requests without locking.
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(&normalize_command_name(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&normalize_command_name(name))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry").field("commands", &self.names()).finish()
    }
}
