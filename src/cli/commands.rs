//! CLI command implementations
//!
//! Each command loads what it needs, does one thing, and prints a single
//! JSON response. `*_report` variants return the response body instead of
//! printing it.

use std::path::Path;

use serde_json::{json, Value};

use crate::attribute::{
    dat_path, AttributeConfig, QueryTermSimple, SingleBoolAttribute, TermFieldMatchData,
};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    reserve_stdout();
    run_command(cli.command)
}

/// Keep stdout for the response: log warnings and worse, on stderr.
fn reserve_stdout() {
    Logger::set_stderr_only(true);
    Logger::set_min_severity(Severity::Warn);
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config, dir } => init(&config, &dir),
        Command::Inspect { file } => inspect(&file),
        Command::Search { file, term, limit } => search(&file, &term, limit),
    }
}

/// Validate `config_path` and write an empty attribute to `<dir>/<name>.dat`
///
/// Refuses to overwrite an existing data file.
pub fn init(config_path: &Path, dir: &Path) -> CliResult<()> {
    let config = AttributeConfig::load(config_path)?;
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("attribute", &config.name),
            ("path", &config_path.display().to_string()),
        ],
    );

    let path = dat_path(dir, &config.name);
    if path.exists() {
        return Err(CliError::already_initialized(&path));
    }

    let attribute = SingleBoolAttribute::new(config)?;
    let written = attribute.save_to_dir(dir)?;

    write_response(json!({
        "initialized": true,
        "attribute": attribute.name(),
        "path": written.display().to_string(),
    }))
}

/// Print a summary of a data file
pub fn inspect(file: &Path) -> CliResult<()> {
    write_response(inspect_report(file)?)
}

/// Summary of a data file: doc count, set and cleared bits, sizes
pub fn inspect_report(file: &Path) -> CliResult<Value> {
    let mut attribute = open_attribute(file)?;
    let stat = attribute.update_stat();
    Ok(json!({
        "attribute": attribute.name(),
        "docs": stat.committed_doc_id_limit,
        "set_bits": stat.set_bits,
        "cleared_bits": stat.committed_doc_id_limit - stat.set_bits,
        "used_bytes": stat.used_bytes,
        "estimated_save_bytes": attribute.estimated_save_byte_size(),
    }))
}

/// Print the result of running `term` against a data file
pub fn search(file: &Path, term: &str, limit: usize) -> CliResult<()> {
    write_response(search_report(file, term, limit)?)
}

/// Predicate, estimate and up to `limit` matching doc ids for `term`
pub fn search_report(file: &Path, term: &str, limit: usize) -> CliResult<Value> {
    let attribute = open_attribute(file)?;
    let reader = attribute.reader();
    let context = reader.create_search_context(&QueryTermSimple::from_text(term));

    let mut match_data = TermFieldMatchData::new();
    let hits = {
        let mut iterator = context.create_filter_iterator(&mut match_data, true);
        iterator.hits()
    };
    let truncated = hits.len() > limit;

    Ok(json!({
        "attribute": attribute.name(),
        "term": term,
        "predicate": context.predicate().as_str(),
        "approximate_hits": context.approximate_hits(),
        "total_hits": hits.len(),
        "hits": &hits[..hits.len().min(limit)],
        "truncated": truncated,
    }))
}

/// Load a data file into a fresh attribute named after the file stem
fn open_attribute(file: &Path) -> CliResult<SingleBoolAttribute> {
    let name = file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| {
            CliError::config_error(format!("Cannot derive attribute name: {}", file.display()))
        })?;

    let mut attribute = SingleBoolAttribute::new(AttributeConfig::single_bool(name))?;
    if !attribute.load_from_path(file)? {
        return Err(CliError::no_data(file));
    }
    Ok(attribute)
}
