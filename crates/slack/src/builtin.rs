use std::fmt::Write as _;

use async_trait::async_trait;
use clap::{Arg, ArgAction};

use crate::blocks::Reply;
use crate::commands::{CommandContext, CommandError, CommandHandler, CommandRegistry, FlagSet};

/// `/test [ARGS]...`: writes the arguments it received back to the caller.
pub struct TestCommand;

impl TestCommand {
    fn spec() -> clap::Command {
        clap::Command::new("test")
            .about("Echo the parsed arguments back to the caller")
            .disable_version_flag(true)
            .arg(
                Arg::new("args")
                    .value_name("ARGS")
                    .num_args(0..)
                    .action(ArgAction::Append)
                    .trailing_var_arg(true),
            )
    }
}

#[async_trait]
impl CommandHandler for TestCommand {
    fn name(&self) -> &str {
        "test"
    }

    async fn run(
        &self,
        _ctx: CommandContext,
        flags: &mut FlagSet,
        args: Vec<String>,
    ) -> Result<Option<Reply>, CommandError> {
        let matches = flags.parse(Self::spec(), &args)?;
        let rest: Vec<String> =
            matches.get_many::<String>("args").map(|values| values.cloned().collect()).unwrap_or_default();

        write!(flags.output(), "Args: {rest:?}")?;
        Ok(None)
    }
}

pub fn default_registry() -> CommandRegistry {
    CommandRegistry::builder().register(TestCommand).build()
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::{default_registry, TestCommand};
    use crate::commands::{CommandContext, CommandError, CommandHandler, FlagSet};
    use crate::payload::SlashCommand;

    fn context() -> CommandContext {
        let slash = SlashCommand::from_form(b"command=%2Ftest&text=").expect("slash");
        CommandContext::new("req-test", slash, CancellationToken::new())
    }

    #[tokio::test]
    async fn echoes_empty_argument_list() {
        let mut flags = FlagSet::new("test");
        let reply = TestCommand.run(context(), &mut flags, Vec::new()).await.expect("run");

        assert!(reply.is_none());
        assert_eq!(flags.captured(), "Args: []");
    }

    #[tokio::test]
    async fn echoes_arguments_in_order() {
        let mut flags = FlagSet::new("test");
        let args = vec!["a".to_owned(), "b c".to_owned(), "d".to_owned()];
        TestCommand.run(context(), &mut flags, args).await.expect("run");

        assert_eq!(flags.captured(), r#"Args: ["a", "b c", "d"]"#);
    }

    #[tokio::test]
    async fn help_flag_writes_usage() {
        let mut flags = FlagSet::new("test");
        let error =
            TestCommand.run(context(), &mut flags, vec!["--help".to_owned()]).await.expect_err("help");

        assert!(matches!(error, CommandError::HelpRequested));
        assert!(flags.captured().contains("Usage: test"));
    }

    #[test]
    fn default_registry_contains_test_command() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["test"]);
    }
}
