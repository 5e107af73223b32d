use crate::config::BackendKind;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "groundwork")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative provisioning for docker and kubernetes", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create every declared resource that does not exist
    Up(RunArgs),

    /// Update existing resources, creating any that are missing
    Patch(RunArgs),

    /// Delete declared resources in reverse order
    Down(DownArgs),

    /// Show which declared resources exist
    Status(StatusArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Flags shared by every manifest command
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Manifest file (default: ./groundwork.toml)
    #[arg(short, long, env = "GROUNDWORK_MANIFEST")]
    pub file: Option<PathBuf>,

    /// Only act on matching resources: kind or kind.name
    #[arg(short, long)]
    pub target: Option<String>,

    /// Only act on resources of one backend
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Always query the backend instead of reusing observed state
    #[arg(long)]
    pub no_cache: bool,

    /// Parallel jobs within one stage (overrides settings.jobs)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Show what would change without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DownArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Print a JSON report instead of a table
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_down_with_target() {
        let cli = Cli::try_parse_from([
            "groundwork",
            "down",
            "--yes",
            "--target",
            "container.web",
            "--backend",
            "docker",
        ])
        .unwrap();
        let Command::Down(args) = cli.command else {
            panic!("expected down");
        };
        assert!(args.yes);
        assert_eq!(args.run.common.target.as_deref(), Some("container.web"));
        assert_eq!(args.run.common.backend, Some(BackendKind::Docker));
    }

    #[test]
    fn test_parse_global_verbosity() {
        let cli = Cli::try_parse_from(["groundwork", "up", "-vv", "--dry-run", "-j", "4"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Up(args) = cli.command else {
            panic!("expected up");
        };
        assert!(args.dry_run);
        assert_eq!(args.common.jobs, Some(4));
    }
}
