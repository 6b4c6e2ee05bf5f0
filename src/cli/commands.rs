//! CLI command definitions for the spec drift tool
//!
//! Provides Clap-based command definitions for validating live API
//! behavior against OpenAPI constraints, reconciling spec files from a
//! validation report, and inspecting individual spec documents.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::output::{
    InspectionReport, OutputFormat, ProgressIndicator, ReconcileReport, RunReport,
};
use super::ExitCode;
use crate::client::{ProbeClient, ProbeClientConfig};
use crate::config::DriftConfig;
use crate::error::{DriftError, Result};
use crate::limiter::RateLimiter;
use crate::loader::{SpecLoader, SpecValidator, StructuralValidator};
use crate::reconciler::{load_discrepancies, SpecReconciler};
use crate::report::{ReportGenerator, RunSummary};
use crate::runner::ProbeRunner;

/// Spec drift CLI
///
/// Validate live API behavior against OpenAPI constraint declarations
/// and reconcile the spec files when the two disagree.
#[derive(Parser, Debug)]
#[command(name = "spec-drift")]
#[command(about = "Detect and reconcile drift between OpenAPI specs and live API behavior", long_about = None)]
#[command(version)]
pub struct DriftCli {
    /// Output verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: DriftCommands,
}

/// Available drift commands
#[derive(Subcommand, Debug)]
pub enum DriftCommands {
    /// Validate live API behavior against declared constraints
    ///
    /// Loads every spec file in the originals directory, synthesizes
    /// boundary test cases per declared constraint, probes the
    /// configured endpoints, and writes validation reports.
    Validate {
        /// Path to the drift configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Directory containing original spec files (overrides the config)
        #[arg(long)]
        specs_dir: Option<PathBuf>,

        /// Only probe endpoints whose name or resource contains this value
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Generate test cases without sending any probes
        #[arg(long)]
        dry_run: bool,

        /// Output format for run results
        #[arg(long, value_enum, default_value = "table")]
        format: Option<OutputFormat>,

        /// Directory report artifacts are written to (overrides the config)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Reconcile spec files against a validation report
    ///
    /// Applies the configured fix strategy per discrepancy, re-validates
    /// each patched document, and writes the full corrected spec set
    /// plus a CHANGELOG.md to the output directory. Files whose patched
    /// form fails validation are rolled back to their original content.
    Reconcile {
        /// Path to the drift configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Path to the validation report (validation_report.json)
        #[arg(short, long)]
        report: PathBuf,

        /// Directory containing original spec files (overrides the config)
        #[arg(long)]
        originals: Option<PathBuf>,

        /// Directory reconciled specs are written to (overrides the config)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Output format for reconciliation results
        #[arg(long, value_enum, default_value = "table")]
        format: Option<OutputFormat>,

        /// Compute fixes and print the summary without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect a single spec document
    ///
    /// Loads one spec file and displays structural findings plus the
    /// extracted schema and endpoint inventory.
    Inspect {
        /// Path to the spec file to inspect
        #[arg(short, long)]
        spec: PathBuf,

        /// Output format for inspection results
        #[arg(long, value_enum, default_value = "table")]
        format: Option<OutputFormat>,
    },
}

/// Execute the validate command
pub async fn execute_validate(
    config: PathBuf,
    specs_dir: Option<PathBuf>,
    endpoint: Option<String>,
    dry_run: bool,
    format: Option<OutputFormat>,
    output_dir: Option<PathBuf>,
) -> Result<ExitCode> {
    let started = Instant::now();
    let output_format = format.unwrap_or(OutputFormat::Table);

    let mut drift_config = DriftConfig::load(&config)?;
    if let Some(dir) = specs_dir {
        drift_config.specs.original_dir = dir;
    }
    if let Some(dir) = output_dir {
        drift_config.reports.output_dir = dir;
    }

    let client = if dry_run {
        None
    } else {
        let token = DriftConfig::api_token()?;
        let limiter = Arc::new(RateLimiter::new(drift_config.rate_limit.to_limiter_config()));
        let client =
            ProbeClient::new(ProbeClientConfig::from_config(&drift_config, token), limiter)?;

        let mut progress =
            ProgressIndicator::new(format!("Checking API at {}", drift_config.api.base_url));
        if output_format == OutputFormat::Table {
            progress.start();
        }
        if client.test_connection().await {
            progress.success();
        } else {
            progress.failure("unreachable");
            return Err(DriftError::http_error(format!(
                "API at {} is not reachable",
                drift_config.api.base_url
            )));
        }
        Some(client)
    };

    let mut runner = ProbeRunner::new(drift_config.clone(), client);
    let outcome = runner.run(endpoint.as_deref()).await?;

    // Modified/unmodified lists stay empty until a reconcile run.
    let summary = RunSummary::build(
        &outcome,
        &drift_config.specs.original_dir,
        Vec::new(),
        Vec::new(),
    );
    let generator = ReportGenerator::new(drift_config.reports.clone());
    let report_paths =
        generator.generate_all(&summary, &outcome.endpoint_results, &outcome.discrepancies)?;

    let duration_ms = started.elapsed().as_millis() as u64;
    RunReport::new(&summary, &outcome, dry_run, duration_ms, &report_paths)
        .render(output_format)?;

    Ok(ExitCode::from_validation_result(
        !outcome.discrepancies.is_empty(),
        !outcome.structural_findings.is_empty(),
    ))
}

/// Execute the reconcile command
pub fn execute_reconcile(
    config: PathBuf,
    report: PathBuf,
    originals: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    format: Option<OutputFormat>,
    dry_run: bool,
) -> Result<ExitCode> {
    let mut drift_config = DriftConfig::load(&config)?;
    if let Some(dir) = originals {
        drift_config.specs.original_dir = dir;
    }
    if let Some(dir) = output_dir {
        drift_config.specs.output_dir = dir;
    }

    let discrepancies = load_discrepancies(&report)?;

    let mut reconciler = SpecReconciler::new(
        &drift_config.specs.original_dir,
        &drift_config.specs.output_dir,
    )
    .with_config(drift_config.reconciliation.clone());
    reconciler.reconcile_all(&discrepancies)?;

    let mut changelog_path = None;
    if !dry_run {
        reconciler.save_results()?;
        let path = drift_config.specs.output_dir.join("CHANGELOG.md");
        std::fs::write(&path, reconciler.generate_changelog())?;
        changelog_path = Some(path);
    }

    let summary = reconciler.summary();
    ReconcileReport::new(
        &summary,
        reconciler.results(),
        dry_run,
        changelog_path.as_deref(),
    )
    .render(format.unwrap_or(OutputFormat::Table))?;

    // A rollback means the patched document failed validation; surface
    // it as a warning exit.
    Ok(ExitCode::from_validation_result(
        false,
        !summary.rolled_back_files.is_empty(),
    ))
}

/// Execute the inspect command
pub fn execute_inspect(spec: PathBuf, format: Option<OutputFormat>) -> Result<ExitCode> {
    let filename = spec
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            DriftError::invalid_input(format!("not a spec file path: {}", spec.display()))
        })?
        .to_string();
    let parent = spec
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut loader = SpecLoader::new(parent);
    let doc = loader.load(&filename)?;

    let findings = StructuralValidator.validate(&doc);
    let schemas = loader.extract_schemas(&doc);
    let endpoints = loader.extract_endpoints(&doc);

    let report = InspectionReport::new(&filename, findings, &schemas, &endpoints);
    report.render(format.unwrap_or(OutputFormat::Table))?;

    Ok(if report.findings.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::ValidationWarning
    })
}
