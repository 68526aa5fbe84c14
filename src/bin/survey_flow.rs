//! survey-flow CLI
//!
//! Classify step-type tokens and assemble tracked collections from the
//! command line.
//!
//! # Usage
//!
//! ```bash
//! # Classify a step-type token
//! survey-flow classify dataGroups.singleChoiceText
//!
//! # Assemble a definition against a persisted store
//! survey-flow assemble --definition config/medication_tracking.yaml --store state.json
//!
//! # Assemble a definition by name from SURVEY_FLOW_CONFIG_DIR
//! survey-flow assemble --definition medication_tracking --format json
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

use survey_flow::{
    AssembledTask, DefaultStepFactory, DefinitionLoader, Diagnostic,
    InclusionDecision, JsonFileStore, MemoryStore, StepKind, Task,
};

#[derive(Parser)]
#[command(name = "survey-flow")]
#[command(about = "Assemble recurring survey and activity tasks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a step-type token
    Classify {
        token: String,
    },

    /// Assemble a tracked collection
    Assemble {
        /// Definition file, or a definition name in the config directory
        #[arg(short, long)]
        definition: String,

        /// JSON store file (created if missing, updated after assembly)
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Assemble as a stand-alone survey
        #[arg(long)]
        top_level: bool,

        /// Evaluate the policy at this RFC 3339 time instead of now
        #[arg(long)]
        at: Option<String>,
    },

    /// List definitions in the config directory
    Definitions {
        /// Config directory
        #[arg(long, env = "SURVEY_FLOW_CONFIG_DIR", default_value = "config")]
        dir: PathBuf,
    },
}

#[derive(Serialize)]
struct AssembleReport<'a> {
    decision: InclusionDecision,
    steps: Vec<&'a str>,
    first_activity_step_identifier: Option<&'a str>,
    diagnostics: Vec<&'a Diagnostic>,
    task: &'a Task,
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("survey_flow=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { token } => cmd_classify(&token, cli.format),
        Commands::Assemble {
            definition,
            store,
            top_level,
            at,
        } => cmd_assemble(&definition, store, top_level, at.as_deref(), cli.format),
        Commands::Definitions { dir } => cmd_definitions(dir, cli.format),
    }
}

fn cmd_classify(token: &str, format: OutputFormat) -> Result<()> {
    let kind = StepKind::classify(Some(token));
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&kind)?),
        OutputFormat::Text => {
            println!("Token:         {}", token);
            println!("Kind:          {:?}", kind);
            if let Some(canonical) = kind.type_token() {
                println!("Canonical:     {}", canonical);
            }
        }
    }
    Ok(())
}

fn cmd_assemble(
    definition: &str,
    store_path: Option<PathBuf>,
    top_level: bool,
    at: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let path = PathBuf::from(definition);
    let collection = if path.is_file() {
        DefinitionLoader::new(".").load_path(&path)?
    } else {
        DefinitionLoader::from_env().load(definition)?
    };

    let now = match at {
        Some(at) => DateTime::parse_from_rfc3339(at)
            .with_context(|| format!("Invalid --at time: {}", at))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let assembled = match store_path {
        Some(store_path) => {
            let mut store = JsonFileStore::open(&store_path)?;
            let assembled = collection.build_task(&DefaultStepFactory, top_level, &mut store, now);
            store
                .flush()
                .with_context(|| format!("Failed to save store {}", store_path.display()))?;
            assembled
        }
        None => {
            let mut store = MemoryStore::new();
            collection.build_task(&DefaultStepFactory, top_level, &mut store, now)
        }
    };

    print_assembled(&assembled, format)
}

fn print_assembled(assembled: &AssembledTask, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let report = AssembleReport {
                decision: assembled.decision,
                steps: assembled.task.step_identifiers(),
                first_activity_step_identifier: assembled.first_activity_step_identifier.as_deref(),
                diagnostics: assembled.diagnostics.iter().collect(),
                task: &assembled.task,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("=== {} ===", assembled.task.identifier);
            println!("Decision:      {}", assembled.decision);
            if let Some(first) = &assembled.first_activity_step_identifier {
                println!("First activity: {}", first);
            }
            println!();
            println!("Steps:");
            for step in &assembled.task.steps {
                println!("  {:<28} {}", step.identifier, step.kind);
                for rule in &step.rules {
                    println!("      -> {}", rule.skip_identifier);
                }
            }
            if !assembled.task.initial_results.is_empty() {
                println!();
                println!("Pre-seeded:    {}", assembled.task.initial_results.len());
            }
            if !assembled.diagnostics.is_empty() {
                println!();
                println!("Diagnostics:");
                for diagnostic in assembled.diagnostics.iter() {
                    println!(
                        "  [{:?}] {}: {}",
                        diagnostic.code,
                        diagnostic.step_identifier.as_deref().unwrap_or("-"),
                        diagnostic.message
                    );
                }
            }
        }
    }
    Ok(())
}

fn cmd_definitions(dir: PathBuf, format: OutputFormat) -> Result<()> {
    let names = DefinitionLoader::new(dir).definitions()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
        OutputFormat::Text => {
            for name in names {
                println!("{}", name);
            }
        }
    }
    Ok(())
}
