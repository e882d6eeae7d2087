//! Evidentia CLI
//!
//! # Usage
//! ```bash
//! evidentia run --standards standards.json --evidence evidence.json [--scope 3.3.1 ...]
//! evidentia audit <RUN_ID> [--standard 3.3.1]
//! evidentia verify-audit <RUN_ID>
//! evidentia validate-standards --standards standards.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use evidentia_core::audit::{AuditStore, SqliteAuditStore};
use evidentia_core::corpus::StandardsCorpus;
use evidentia_core::error::AuditError;
use evidentia_core::model::{EvidenceDocument, Standard};
use evidentia_core::{EvidencePipeline, PipelineConfig, RunRequest};

mod output;

/// Evidentia - evidence mapping and cited compliance narratives
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Audit database (SQLite)
    #[arg(long, value_name = "FILE", default_value = "evidentia-audit.db", global = true)]
    audit_db: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over a standards scope
    Run {
        /// Standards corpus (JSON array)
        #[arg(long, value_name = "FILE")]
        standards: PathBuf,

        /// Evidence corpus (JSON array)
        #[arg(long, value_name = "FILE")]
        evidence: PathBuf,

        /// Pipeline configuration (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Standard ids to process; every standard when omitted
        #[arg(long, num_args = 1..)]
        scope: Vec<String>,

        /// Also process descendants of the scoped standards
        #[arg(long)]
        descendants: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show the audit trail of a run
    Audit {
        run_id: String,

        /// Only records concerning this standard
        #[arg(long)]
        standard: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Recompute the hash chain of a stored run
    VerifyAudit { run_id: String },

    /// List runs recorded in the audit database
    Runs,

    /// Check a standards corpus for structural errors
    ValidateStandards {
        #[arg(long, value_name = "FILE")]
        standards: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {what} from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {what} in {}", path.display()))
}

fn open_store(path: &Path) -> Result<SqliteAuditStore> {
    SqliteAuditStore::open(path)
        .with_context(|| format!("opening audit database {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            standards,
            evidence,
            config,
            scope,
            descendants,
            json,
            output,
        } => {
            let config = match config {
                Some(path) => PipelineConfig::from_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            let standards: Vec<Standard> = read_json(&standards, "standards")?;
            let evidence: Vec<EvidenceDocument> = read_json(&evidence, "evidence")?;

            let store = open_store(&cli.audit_db)?;
            let pipeline = EvidencePipeline::new(config)
                .context("invalid pipeline configuration")?
                .with_audit_store(Arc::new(store));
            pipeline
                .reload_standards(standards)
                .context("standards corpus rejected")?;
            pipeline
                .reload_evidence(evidence)
                .context("evidence corpus rejected")?;

            let scope = if scope.is_empty() {
                pipeline
                    .registry()
                    .standards()
                    .iter()
                    .map(|s| s.id.clone())
                    .collect()
            } else {
                scope
            };

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling run");
                    on_interrupt.cancel();
                }
            });

            let mut request = RunRequest::new(scope).with_cancellation(cancel);
            if descendants {
                request = request.with_descendants();
            }
            let report = pipeline.run(request).await.context("pipeline run aborted")?;

            if let Some(path) = output {
                std::fs::write(&path, report.to_json_pretty()?)
                    .with_context(|| format!("writing report to {}", path.display()))?;
                info!(path = %path.display(), "report written");
            }
            if json {
                println!("{}", report.to_json_pretty()?);
            } else {
                output::print_report(&report);
            }
        }
        Commands::Audit {
            run_id,
            standard,
            json,
        } => {
            let trail = open_store(&cli.audit_db)?
                .load(&run_id)
                .with_context(|| format!("loading audit trail for {run_id}"))?;
            let records = match &standard {
                Some(id) => trail.for_standard(id),
                None => trail.into_records(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                output::print_records(&run_id, &records);
            }
        }
        Commands::VerifyAudit { run_id } => {
            match open_store(&cli.audit_db)?.load(&run_id) {
                Ok(trail) => output::print_verification(&run_id, &trail.verify()),
                Err(e @ AuditError::ChainBroken { .. }) => {
                    output::print_chain_error(&run_id, &e);
                    std::process::exit(2);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("loading audit trail for {run_id}"))
                }
            }
        }
        Commands::Runs => {
            for run_id in open_store(&cli.audit_db)?.run_ids()? {
                println!("{run_id}");
            }
        }
        Commands::ValidateStandards { standards } => {
            let list: Vec<Standard> = read_json(&standards, "standards")?;
            match StandardsCorpus::new(list) {
                Ok(corpus) => output::print_standards_summary(&corpus),
                Err(e) => {
                    output::print_validation_error(&e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
