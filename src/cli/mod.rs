//! CLI for boolean attribute files
//!
//! Provides command-line interface for:
//! - init: Validate a configuration and write an empty data file
//! - inspect: Summarize a data file
//! - search: Evaluate a boolean term against a data file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, inspect, inspect_report, run, run_command, search, search_report};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::write_response;
