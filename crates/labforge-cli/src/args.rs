//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Materialize virtual lab environments from exercise specifications
#[derive(Debug, Parser)]
#[command(name = "labforge", version, about)]
pub struct Cli {
    /// Lower the default log level to debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Disable ANSI colors in logs (also set by NO_COLOR)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Print run reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Infrastructure configuration file
    #[arg(long, global = true, value_name = "INFRA_YAML")]
    pub infra: Option<PathBuf>,

    /// Simulated inventory file, created on first use
    #[arg(long, global = true, value_name = "STATE_JSON", default_value = "labforge-state.json")]
    pub state: PathBuf,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Colors are off when asked for on the command line or through `NO_COLOR`
    #[must_use]
    pub fn colors_disabled(&self) -> bool {
        self.no_color || std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Subcommands
#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Load and normalize a specification and print a summary
    Check {
        /// Exercise specification
        spec: PathBuf,
    },
    /// Build the master tree and base networks
    Masters {
        /// Exercise specification
        spec: PathBuf,
    },
    /// Promote the masters and deploy every instance
    Deploy {
        /// Exercise specification
        spec: PathBuf,
    },
    /// Destroy the deployed environment
    Cleanup {
        /// Exercise specification
        spec: PathBuf,
        /// Also destroy the master tree
        #[arg(long)]
        masters: bool,
        /// Also destroy the networks the removed objects used
        #[arg(long)]
        networks: bool,
    },
    /// Print the inventory below the exercise root
    Tree {
        /// Exercise specification
        spec: PathBuf,
    },
}

impl Command {
    /// Specification file of any subcommand
    #[must_use]
    pub fn spec(&self) -> &PathBuf {
        match self {
            Self::Check { spec }
            | Self::Masters { spec }
            | Self::Deploy { spec }
            | Self::Cleanup { spec, .. }
            | Self::Tree { spec } => spec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "labforge", "deploy", "lab.yaml", "--infra", "infra.yaml", "--verbose", "--log-format", "json",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.infra, Some(PathBuf::from("infra.yaml")));
        assert_eq!(cli.command.spec(), &PathBuf::from("lab.yaml"));
    }

    #[test]
    fn cleanup_flags() {
        let cli = Cli::try_parse_from(["labforge", "cleanup", "lab.yaml", "--masters"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Cleanup {
                spec: PathBuf::from("lab.yaml"),
                masters: true,
                networks: false,
            }
        );
        assert_eq!(cli.state, PathBuf::from("labforge-state.json"));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["labforge"]).is_err());
        assert!(Cli::try_parse_from(["labforge", "deploy"]).is_err());
    }
}
