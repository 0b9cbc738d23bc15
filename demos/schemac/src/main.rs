//! schemac - compiles a message schema without running the engine.
//!
//! ```text
//! schemac check schema.proto         report bad blocks and dangling references
//! schemac accessors schema.proto     accessor tables as JSON
//! schemac normalize                  normalized text of the bundled schema
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use parrot_schema::{AccessorTable, Schema, SchemaError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemac")]
#[command(about = "Compile a Parrot message schema and inspect the result")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Report malformed blocks and references to undeclared types
    Check {
        /// Schema file; the bundled service schema when omitted
        schema: Option<PathBuf>,
    },

    /// Print the accessor table of every message (or just one) as JSON
    Accessors {
        schema: Option<PathBuf>,

        /// Only this message
        #[arg(long, short = 'm')]
        message: Option<String>,
    },

    /// Print the schema back out in normalized form
    Normalize { schema: Option<PathBuf> },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: Option<&PathBuf>) -> Result<(Schema, Vec<SchemaError>)> {
    let source = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => parrot_protocol::SERVICE_SCHEMA_SOURCE.to_string(),
    };
    Ok(Schema::from_source(&source))
}

fn check(path: Option<&PathBuf>) -> Result<()> {
    let (schema, errors) = load(path)?;
    for error in &errors {
        eprintln!("error: {error}");
    }
    let dangling = schema.unresolved_references();
    for (message, field, target) in &dangling {
        eprintln!("error: {message}.{field} refers to undeclared type {target}");
    }

    println!(
        "{} messages, {} enums",
        schema.messages().count(),
        schema.enums().count()
    );
    if !errors.is_empty() || !dangling.is_empty() {
        bail!("{} problem(s) found", errors.len() + dangling.len());
    }
    Ok(())
}

fn accessors(path: Option<&PathBuf>, only: Option<&str>) -> Result<()> {
    let (schema, errors) = load(path)?;
    for error in &errors {
        tracing::warn!(%error, "skipped block");
    }

    let tables: Vec<&AccessorTable> = match only {
        Some(name) => vec![
            schema
                .accessors(name)
                .with_context(|| format!("no message named {name}"))?,
        ],
        None => schema
            .messages()
            .filter_map(|desc| schema.accessors(&desc.name))
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&tables)?);
    Ok(())
}

fn normalize(path: Option<&PathBuf>) -> Result<()> {
    let (schema, errors) = load(path)?;
    for error in &errors {
        tracing::warn!(%error, "skipped block");
    }
    println!("{schema}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Check { schema } => check(schema.as_ref()),
        Command::Accessors { schema, message } => accessors(schema.as_ref(), message.as_deref()),
        Command::Normalize { schema } => normalize(schema.as_ref()),
    }
}
