//! CLI argument definitions using clap
//!
//! Commands:
//! - aerodb-attribute init --config <path> --dir <path>
//! - aerodb-attribute inspect --file <path>
//! - aerodb-attribute search --file <path> --term <text>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspection and maintenance tool for boolean attribute files
#[derive(Parser, Debug)]
#[command(name = "aerodb-attribute")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate an attribute configuration and write an empty data file
    Init {
        /// Path to attribute configuration file
        #[arg(long, default_value = "./attribute.json")]
        config: PathBuf,

        /// Directory receiving `<name>.dat`
        #[arg(long)]
        dir: PathBuf,
    },

    /// Print a summary of a data file
    Inspect {
        /// Path to a `.dat` file
        #[arg(long)]
        file: PathBuf,
    },

    /// Run a boolean term against a data file
    Search {
        /// Path to a `.dat` file
        #[arg(long)]
        file: PathBuf,

        /// Term text: "true", "false", "1" or "0"
        #[arg(long)]
        term: String,

        /// Maximum number of matching doc ids to print
        #[arg(long, default_value_t = 1000)]
        limit: usize,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "aerodb-attribute",
            "search",
            "--file",
            "flag.dat",
            "--term",
            "true",
        ])
        .unwrap();

        match cli.command {
            Command::Search { file, term, limit } => {
                assert_eq!(file, PathBuf::from("flag.dat"));
                assert_eq!(term, "true");
                assert_eq!(limit, 1000);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_init_requires_dir() {
        let result = Cli::try_parse_from(["aerodb-attribute", "init", "--config", "a.json"]);
        assert!(result.is_err());
    }
}
