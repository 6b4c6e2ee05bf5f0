//! Spec drift CLI
//!
//! Command-line interface for detecting and reconciling drift between
//! OpenAPI specs and live API validation behavior.
//!
//! # Usage
//!
//! ```bash
//! # Probe the live API against declared constraints
//! spec-drift validate --config drift.yaml
//!
//! # Apply fixes from a validation report
//! spec-drift reconcile --config drift.yaml --report reports/validation_report.json
//!
//! # Inspect a single spec document
//! spec-drift inspect --spec specs/original/user.json
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success - no drift detected
//! - 1: Validation found discrepancies
//! - 2: Validation passed with warnings
//! - 3: Invalid input or arguments
//! - 4: File not found or inaccessible
//! - 5: Schema-related errors
//! - 10: Internal error

use clap::Parser;
use spec_drift::{run_cli, DriftCli};

#[tokio::main]
async fn main() {
    // Parse CLI arguments first; verbosity flags drive the log filter
    let cli = DriftCli::parse();

    let level = if cli.quiet {
        tracing::Level::ERROR
    } else {
        match cli.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_target(false)
        .init();

    // Run the CLI and exit with appropriate code
    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}
