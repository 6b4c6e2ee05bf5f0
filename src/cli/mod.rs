//! CLI module for the spec drift tool
//!
//! This module provides command-line interface functionality for
//! validating live API behavior against OpenAPI constraints, reconciling
//! spec files from a validation report, and inspecting spec documents.

pub mod commands;
pub mod output;

pub use commands::{DriftCli, DriftCommands};
pub use output::OutputFormat;

use crate::error::{DriftError, Result};

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful execution, no drift detected
    Success = 0,
    /// Validation found discrepancies
    ValidationError = 1,
    /// Validation passed with warnings
    ValidationWarning = 2,
    /// Invalid input or arguments
    InvalidInput = 3,
    /// File not found or inaccessible
    FileError = 4,
    /// Schema-related errors
    SchemaError = 5,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Determine exit code from a run's error and warning state
    pub fn from_validation_result(has_errors: bool, has_warnings: bool) -> Self {
        if has_errors {
            ExitCode::ValidationError
        } else if has_warnings {
            ExitCode::ValidationWarning
        } else {
            ExitCode::Success
        }
    }

    /// Map a failed operation to its exit code
    pub fn from_error(error: &DriftError) -> Self {
        match error {
            DriftError::InvalidInput(_) | DriftError::ParseError(_) => ExitCode::InvalidInput,
            DriftError::FileError(_) => ExitCode::FileError,
            DriftError::SchemaError(_) => ExitCode::SchemaError,
            _ => ExitCode::InternalError,
        }
    }
}

/// Run the CLI with the given arguments and return the exit code
pub async fn run(cli: DriftCli) -> Result<ExitCode> {
    match cli.command {
        DriftCommands::Validate {
            config,
            specs_dir,
            endpoint,
            dry_run,
            format,
            output_dir,
        } => {
            commands::execute_validate(config, specs_dir, endpoint, dry_run, format, output_dir)
                .await
        }
        DriftCommands::Reconcile {
            config,
            report,
            originals,
            output_dir,
            format,
            dry_run,
        } => commands::execute_reconcile(config, report, originals, output_dir, format, dry_run),
        DriftCommands::Inspect { spec, format } => commands::execute_inspect(spec, format),
    }
}
