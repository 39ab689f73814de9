// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines global output flags and the deploy and rollback subcommands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lakeship")]
#[command(about = "Deployment orchestration for the ETL data platform")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output, for CI
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long = "project-dir", global = true, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Configuration file (defaults to lakeship.yml in the project directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy the platform to an environment
    Deploy {
        /// Target environment: dev, staging, or production
        environment: String,

        /// Skip the pre-deploy test suite and smoke tests
        #[arg(long)]
        skip_tests: bool,

        /// Continue past test failures and skip the production prompt
        #[arg(long)]
        force: bool,

        /// Plan only: run read-only checks and report what would change
        #[arg(long)]
        dry_run: bool,

        /// Do not build or push container images
        #[arg(long)]
        no_build: bool,

        /// Deployment tag (defaults to the short commit id)
        #[arg(long)]
        tag: Option<String>,
    },

    /// Roll an environment back to a previously deployed version
    Rollback {
        /// Target environment: dev, staging, or production
        environment: String,

        /// Version (deployment tag) to restore
        previous_version: String,

        /// Confirm a production rollback without prompting
        #[arg(long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn deploy_parses_flags() {
        let cli = Cli::try_parse_from([
            "lakeship", "deploy", "dev", "--skip-tests", "--no-build", "--tag", "v1",
        ])
        .unwrap();
        match cli.command {
            Commands::Deploy {
                environment,
                skip_tests,
                force,
                dry_run,
                no_build,
                tag,
            } => {
                assert_eq!(environment, "dev");
                assert!(skip_tests && no_build);
                assert!(!force && !dry_run);
                assert_eq!(tag.as_deref(), Some("v1"));
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn rollback_requires_version() {
        assert!(Cli::try_parse_from(["lakeship", "rollback", "staging"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["lakeship", "rollback", "dev", "v1", "--json", "-C", "/tmp"])
            .unwrap();
        assert!(cli.json);
        assert_eq!(cli.project_dir, Some(PathBuf::from("/tmp")));
    }
}
