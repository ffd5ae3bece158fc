//! Runs one slash command invocation and turns its outcome into a response.
//!
//! ```text
//! SlashCommand → tokenize → registry lookup → handler task (FlagSet + Output)
//!                                                   ↓
//!                                 synthesize(reply, captured output, error)
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wadjet_core::RequestError;

use crate::blocks::Reply;
use crate::commands::{CommandContext, CommandError, CommandRegistry, FlagSet};
use crate::payload::SlashCommand;
use crate::tokenize::{self, TokenizeError};

/// Result of a handler that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub reply: Option<Reply>,
    pub output: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Arguments(#[from] TokenizeError),
    #[error("unrecognized command {0:?}")]
    UnrecognizedCommand(String),
    #[error("error running command {command:?}: {source}")]
    Command {
        command: String,
        #[source]
        source: CommandError,
    },
    #[error("command {command:?} aborted: {error}")]
    Aborted { command: String, error: RequestError },
    #[error("error running command {command:?}: timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },
    #[error("error running command {command:?}: unexpected error: handler panicked")]
    Panicked { command: String },
}

impl From<DispatchError> for RequestError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Arguments(error) => error.into(),
            DispatchError::UnrecognizedCommand(_) => RequestError::bad_request(value.to_string()),
            DispatchError::Aborted { error, .. } => error,
            DispatchError::Command { .. }
            | DispatchError::TimedOut { .. }
            | DispatchError::Panicked { .. } => RequestError::internal(value.to_string()),
        }
    }
}

/// What the HTTP layer should send back. Exactly one variant per request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlashResponse {
    /// 200 with no body; the command may answer later via `response_url`.
    Empty,
    Reply(Reply),
    Error(RequestError),
}

impl SlashResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Empty | Self::Reply(_) => 200,
            Self::Error(error) => error.status_code(),
        }
    }
}

/// A structured reply always wins; captured output is the fallback; silence
/// is last. Zero-length output counts as silence.
pub fn synthesize(outcome: Result<Invocation, DispatchError>) -> SlashResponse {
    match outcome {
        Err(error) => SlashResponse::Error(error.into()),
        Ok(Invocation { reply: Some(reply), .. }) => SlashResponse::Reply(reply),
        Ok(Invocation { output, .. }) if output.is_empty() => SlashResponse::Empty,
        Ok(Invocation { output, .. }) => SlashResponse::Reply(Reply::ephemeral(output)),
    }
}

pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Tokenizes, looks up and runs `slash`.
    ///
    /// The handler runs on its own task with a fresh [`FlagSet`], so a panic
    /// is contained to this invocation and reported as a 500.
    pub async fn dispatch(
        &self,
        slash: SlashCommand,
        request_id: &str,
        cancellation: CancellationToken,
    ) -> Result<Invocation, DispatchError> {
        let command = slash.name();
        let args = tokenize::split(&slash.text)?;
        let handler = self
            .registry
            .get(&command)
            .ok_or_else(|| DispatchError::UnrecognizedCommand(command.clone()))?;

        debug!(
            event_name = "slash.dispatch.start",
            correlation_id = %request_id,
            command = %command,
            arg_count = args.len(),
            "dispatching slash command"
        );

        let ctx = CommandContext::new(request_id, slash, cancellation.clone());
        let mut flags = FlagSet::new(command.clone());
        let mut task = tokio::spawn(async move {
            let result = handler.run(ctx, &mut flags, args).await;
            (result, flags.into_output())
        });

        let joined = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                cancellation.cancel();
                task.abort();
                warn!(
                    event_name = "slash.dispatch.timeout",
                    correlation_id = %request_id,
                    command = %command,
                    timeout_secs = self.timeout.as_secs(),
                    "slash command timed out"
                );
                return Err(DispatchError::TimedOut {
                    command,
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let (result, output) = joined.map_err(|error| join_failure(&command, error))?;
        match result {
            Ok(reply) => Ok(Invocation { command, reply, output }),
            Err(CommandError::HelpRequested) => Ok(Invocation { command, reply: None, output }),
            Err(CommandError::Abort(error)) => Err(DispatchError::Aborted { command, error }),
            Err(source) => Err(DispatchError::Command { command, source }),
        }
    }
}

fn join_failure(command: &str, error: JoinError) -> DispatchError {
    if error.is_panic() {
        DispatchError::Panicked { command: command.to_owned() }
    } else {
        DispatchError::Command { command: command.to_owned(), source: CommandError::Cancelled }
    }
}
