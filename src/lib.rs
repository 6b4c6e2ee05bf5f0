//! Spec Drift
//!
//! Detects and reconciles drift between OpenAPI spec files and the
//! validation behavior of the live API they describe.
//!
//! ## Features
//!
//! - **Constraint Validation**: Synthesize boundary test cases for every
//!   declared constraint (length, range, items, pattern, enum, required)
//! - **Live Probing**: Send the synthesized payloads to the real API and
//!   classify accept/reject behavior against the declared expectation
//! - **Discrepancy Taxonomy**: Classify disagreements as spec-stricter,
//!   spec-looser, missing, extra, or mismatched constraints
//! - **Adaptive Rate Limiting**: Sliding-window request pacing with
//!   exponential backoff that adapts to server feedback
//! - **Spec Reconciliation**: Apply deterministic corrections per
//!   discrepancy and re-validate each patched document, rolling back any
//!   file whose patched form fails validation
//! - **Reports**: JSON, Markdown, and self-contained HTML report
//!   artifacts plus a generated CHANGELOG.md for reconciled specs
//! - **Dry Run**: Generate and count test cases without network traffic
//!
//! ## Architecture
//!
//! 1. **Loader** (`loader`): Parses spec documents, extracts schemas,
//!    endpoints, and constraint declarations, and hosts the structural
//!    validation seam.
//!
//! 2. **Validator** (`validator/`): Per-keyword boundary case synthesis
//!    and expectation-vs-behavior comparison.
//!
//! 3. **Limiter** (`limiter`): Sliding-window rate limiter with
//!    server-feedback-adaptive ceiling.
//!
//! 4. **Client** (`client/`): HTTP probe client with retry, backoff, and
//!    Retry-After handling.
//!
//! 5. **Runner** (`runner`): Orchestrates the validate pipeline from
//!    spec files to discrepancies.
//!
//! 6. **Reconciler** (`reconciler/`): Fix strategies, corrected value
//!    computation, and the patch-or-rollback transaction per file.
//!
//! 7. **Report** (`report`): Run summaries and report artifact
//!    generation.
//!
//! 8. **CLI** (`cli/`): Command-line interface with machine-readable
//!    output formats.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Probe the live API against the declared constraints
//! spec-drift validate --config drift.yaml
//!
//! # Count the test cases a run would send, without network traffic
//! spec-drift validate --config drift.yaml --dry-run
//!
//! # Apply fixes from a validation report
//! spec-drift reconcile --config drift.yaml --report reports/validation_report.json
//!
//! # Inspect a single spec document
//! spec-drift inspect --spec specs/original/user.json --format json
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use spec_drift::config::DriftConfig;
//! use spec_drift::runner::ProbeRunner;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DriftConfig::load(std::path::Path::new("drift.yaml")).unwrap();
//!
//!     // No client means dry run: cases are synthesized and counted but
//!     // nothing is sent.
//!     let mut runner = ProbeRunner::new(config, None);
//!     let outcome = runner.run(None).await.unwrap();
//!
//!     println!(
//!         "{} test cases across {} schemas",
//!         outcome.total_cases, outcome.total_schemas
//!     );
//! }
//! ```

// Core modules
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod limiter;
pub mod loader;
pub mod reconciler;
pub mod report;
pub mod runner;
pub mod validator;

// Re-export commonly used types
pub use client::{ProbeClient, ProbeClientConfig, ProbeOutcome};
pub use config::DriftConfig;
pub use error::{DriftError, Result};
pub use limiter::{RateLimitConfig, RateLimiter, RateLimiterStats};
pub use loader::{
    ConstraintDeclaration, EndpointInfo, SchemaInfo, SpecLoader, SpecValidator,
    StructuralValidator,
};
pub use reconciler::{
    load_discrepancies, FixAction, ReconcileStatus, ReconciliationConfig, ReconciliationResult,
    ReconciliationSummary, SpecReconciler,
};
pub use report::{ReportConfig, ReportFormat, ReportGenerator, RunSummary};
pub use runner::{ProbeRunner, RunOutcome};
pub use validator::{
    ConstraintKind, ConstraintValidator, Discrepancy, DiscrepancyType, TestCase,
};

// Re-export CLI types for command-line usage
pub use cli::{DriftCli, DriftCommands, ExitCode, OutputFormat};

/// Tool version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tool identifier
pub const TOOL_NAME: &str = "spec-drift";

/// Run the CLI application
///
/// This is the main entry point for the CLI binary.
///
/// # Example
///
/// ```rust,no_run
/// use clap::Parser;
/// use spec_drift::{run_cli, DriftCli};
///
/// #[tokio::main]
/// async fn main() {
///     let cli = DriftCli::parse();
///     let exit_code = run_cli(cli).await;
///     std::process::exit(exit_code.into());
/// }
/// ```
pub async fn run_cli(cli: DriftCli) -> ExitCode {
    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from_error(&e)
        }
    }
}
