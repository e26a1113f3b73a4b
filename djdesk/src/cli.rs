// djdesk/src/cli.rs
//! Command-line surface.
use clap::{ArgAction, Parser, Subcommand};
use djdesk_common::error::Result;
use djdesk_common::Config;

pub mod bundle;
pub mod launch;
pub mod task;
pub mod watch;

use crate::cli::bundle::BundleArgs;
use crate::cli::launch::LaunchArgs;
use crate::cli::task::TaskArgs;
use crate::cli::watch::WatchArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "djdesk", bin_name = "djdesk")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the self-contained django-bundle directory
    Bundle(BundleArgs),
    /// Start the Django server and open the app
    Launch(LaunchArgs),
    /// Follow a workspace's status snapshot
    Watch(WatchArgs),
    /// Queue a task run for a workspace
    Task(TaskArgs),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Bundle(command) => command.run(config).await,
            Self::Launch(command) => command.run(config).await,
            Self::Watch(command) => command.run(config).await,
            Self::Task(command) => command.run(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djdesk_core::InterpreterSource;

    #[test]
    fn bundle_defaults_to_host_and_download() {
        let args = CliArgs::try_parse_from(["djdesk", "bundle"]).unwrap();
        match args.command {
            Command::Bundle(bundle) => {
                assert!(bundle.platform.is_none());
                assert!(bundle.arch.is_none());
                assert_eq!(bundle.interpreter, InterpreterSource::Download);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn verbosity_is_global() {
        let args = CliArgs::try_parse_from([
            "djdesk", "task", "--workspace", "polls", "--preset", "check", "-vv",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert!(matches!(args.command, Command::Task(_)));
    }

    #[test]
    fn unknown_interpreter_source_is_rejected() {
        assert!(CliArgs::try_parse_from(["djdesk", "bundle", "--interpreter", "conda"]).is_err());
        let args =
            CliArgs::try_parse_from(["djdesk", "bundle", "--interpreter", "host-venv"]).unwrap();
        let Command::Bundle(bundle) = args.command else {
            panic!("expected bundle");
        };
        assert_eq!(bundle.interpreter, InterpreterSource::HostVenv);
    }
}
