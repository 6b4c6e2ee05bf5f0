//! Output formatting for the spec drift CLI
//!
//! Provides structured output in JSON, YAML, and human-readable table
//! formats with colored console rendering for validation and
//! reconciliation results.

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{DriftError, Result};
use crate::loader::{EndpointInfo, SchemaInfo};
use crate::reconciler::{ReconciliationResult, ReconciliationSummary};
use crate::report::{ReportFormat, RunSummary};
use crate::runner::RunOutcome;
use crate::validator::{Discrepancy, DiscrepancyType};

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table format with colors
    #[default]
    Table,
    /// JSON format for machine processing
    Json,
    /// YAML format for configuration output
    Yaml,
}

/// Renderable view of one validation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<'a> {
    pub summary: &'a RunSummary,
    pub outcome: &'a RunOutcome,
    pub dry_run: bool,
    pub duration_ms: u64,
    /// Report format name to written artifact path.
    pub reports: BTreeMap<String, String>,
}

impl<'a> RunReport<'a> {
    pub fn new(
        summary: &'a RunSummary,
        outcome: &'a RunOutcome,
        dry_run: bool,
        duration_ms: u64,
        report_paths: &BTreeMap<ReportFormat, PathBuf>,
    ) -> Self {
        let reports = report_paths
            .iter()
            .map(|(format, path)| (format.as_str().to_string(), path.display().to_string()))
            .collect();
        Self {
            summary,
            outcome,
            dry_run,
            duration_ms,
            reports,
        }
    }

    /// Render output in the specified format
    pub fn render(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => render_json(self),
            OutputFormat::Yaml => render_yaml(self),
            OutputFormat::Table => self.render_table(),
        }
    }

    fn render_table(&self) -> Result<()> {
        let mut stdout = io::stdout();

        writeln!(stdout).ok();
        writeln!(stdout, "{}", "Validation Results".cyan().bold()).ok();
        writeln!(stdout, "{}", "=".repeat(60)).ok();
        writeln!(stdout).ok();

        let drift = self.summary.total_discrepancies;
        let summary_line = if self.dry_run {
            format!(
                "Dry run: {} test cases generated from {} spec file(s)",
                self.summary.total_cases,
                self.summary.spec_files.len()
            )
        } else if drift == 0 {
            "API behavior matches the declared constraints".to_string()
        } else {
            format!("{} discrepancies between spec and API behavior", drift)
        };
        let icon = if drift == 0 { "+".green() } else { "x".red() };
        writeln!(stdout, "{} {}", icon, summary_line).ok();
        writeln!(stdout).ok();

        writeln!(stdout, "{}", "Statistics:".cyan().bold()).ok();
        writeln!(stdout, "  Spec Files:    {}", self.summary.spec_files.len()).ok();
        writeln!(stdout, "  Endpoints:     {}", self.summary.total_endpoints).ok();
        writeln!(stdout, "  Test Cases:    {}", self.summary.total_cases).ok();
        writeln!(stdout, "  Probes Sent:   {}", self.summary.probes_sent).ok();
        writeln!(stdout, "  Passed:        {}", self.summary.passed.to_string().green()).ok();
        writeln!(stdout, "  Failed:        {}", colored_count(self.summary.failed, "red")).ok();
        writeln!(stdout, "  Errors:        {}", colored_count(self.summary.errors, "yellow")).ok();
        writeln!(stdout, "  Discrepancies: {}", colored_count(drift, "red")).ok();
        writeln!(stdout).ok();

        if !self.outcome.structural_findings.is_empty() {
            writeln!(stdout, "{}", "Structural Findings:".cyan().bold()).ok();
            for (file, findings) in &self.outcome.structural_findings {
                for finding in findings {
                    writeln!(stdout, "  {} {}: {}", "!".yellow(), file.cyan(), finding).ok();
                }
            }
            writeln!(stdout).ok();
        }

        if !self.outcome.discrepancies.is_empty() {
            writeln!(stdout, "{}", "Discrepancies:".cyan().bold()).ok();
            writeln!(stdout, "{}", "-".repeat(60)).ok();

            const CONSOLE_CAP: usize = 20;
            for discrepancy in self.outcome.discrepancies.iter().take(CONSOLE_CAP) {
                render_discrepancy_row(&mut stdout, discrepancy);
            }
            if self.outcome.discrepancies.len() > CONSOLE_CAP {
                writeln!(stdout).ok();
                writeln!(
                    stdout,
                    "{}",
                    format!(
                        "  ... and {} more (see the written reports)",
                        self.outcome.discrepancies.len() - CONSOLE_CAP
                    )
                    .dimmed()
                )
                .ok();
            }
            writeln!(stdout).ok();
        }

        if !self.reports.is_empty() {
            writeln!(stdout, "{}", "Reports:".cyan().bold()).ok();
            for (format, path) in &self.reports {
                writeln!(stdout, "  {:<10} {}", format.dimmed(), path).ok();
            }
            writeln!(stdout).ok();
        }

        writeln!(
            stdout,
            "Completed in {}",
            format_duration(self.duration_ms).dimmed()
        )
        .ok();

        stdout.flush().ok();
        Ok(())
    }
}

/// Renderable view of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport<'a> {
    pub summary: &'a ReconciliationSummary,
    pub files: Vec<FileStatusOutput>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
}

/// Per-file reconciliation status projection.
#[derive(Debug, Clone, Serialize)]
pub struct FileStatusOutput {
    pub filename: String,
    pub status: String,
    pub changes: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

impl FileStatusOutput {
    pub fn from_result(result: &ReconciliationResult) -> Self {
        Self {
            filename: result.filename.clone(),
            status: result.status().as_str().to_string(),
            changes: result.changes.len(),
            validation_errors: result.validation_errors.clone(),
        }
    }
}

impl<'a> ReconcileReport<'a> {
    pub fn new(
        summary: &'a ReconciliationSummary,
        results: &[ReconciliationResult],
        dry_run: bool,
        changelog: Option<&Path>,
    ) -> Self {
        Self {
            summary,
            files: results.iter().map(FileStatusOutput::from_result).collect(),
            dry_run,
            changelog: changelog.map(|p| p.display().to_string()),
        }
    }

    /// Render output in the specified format
    pub fn render(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => render_json(self),
            OutputFormat::Yaml => render_yaml(self),
            OutputFormat::Table => self.render_table(),
        }
    }

    fn render_table(&self) -> Result<()> {
        let mut stdout = io::stdout();

        writeln!(stdout).ok();
        writeln!(stdout, "{}", "Reconciliation Results".cyan().bold()).ok();
        writeln!(stdout, "{}", "=".repeat(60)).ok();
        writeln!(stdout).ok();

        let modified = self.summary.modified_files.len();
        let summary_line = if modified == 0 {
            "No spec files required modification".to_string()
        } else {
            format!(
                "{} of {} spec file(s) modified",
                modified, self.summary.total_files
            )
        };
        writeln!(stdout, "{} {}", "+".green(), summary_line).ok();
        writeln!(stdout).ok();

        writeln!(stdout, "{}", "Statistics:".cyan().bold()).ok();
        writeln!(stdout, "  Total Files:   {}", self.summary.total_files).ok();
        writeln!(stdout, "  Modified:      {}", colored_count(modified, "green")).ok();
        writeln!(
            stdout,
            "  Pass-through:  {}",
            self.summary.unmodified_files.len() - self.summary.rolled_back_files.len()
        )
        .ok();
        writeln!(
            stdout,
            "  Rolled Back:   {}",
            colored_count(self.summary.rolled_back_files.len(), "yellow")
        )
        .ok();
        writeln!(stdout, "  Total Changes: {}", self.summary.total_changes).ok();
        writeln!(stdout).ok();

        if !self.files.is_empty() {
            writeln!(stdout, "{}", "Files:".cyan().bold()).ok();
            writeln!(stdout, "{}", "-".repeat(60)).ok();
            for file in &self.files {
                let (icon, label) = match file.status.as_str() {
                    "fixed" => ("+".green(), "fixed".green().bold()),
                    "rolled-back" => ("!".yellow(), "rolled-back".yellow().bold()),
                    _ => ("-".white(), "pass-through".dimmed()),
                };
                write!(stdout, "{} {} {}", icon, file.filename.cyan(), label).ok();
                if file.changes > 0 {
                    write!(stdout, " {}", format!("({} changes)", file.changes).dimmed()).ok();
                }
                writeln!(stdout).ok();
                for error in &file.validation_errors {
                    writeln!(stdout, "    {} {}", "error:".red(), error).ok();
                }
            }
            writeln!(stdout).ok();
        }

        if let Some(changelog) = &self.changelog {
            writeln!(stdout, "Changelog: {}", changelog.dimmed()).ok();
        }
        if self.dry_run {
            writeln!(stdout, "{}", "Dry run: no files were written".yellow()).ok();
        }

        stdout.flush().ok();
        Ok(())
    }
}

/// Renderable view of a single-spec inspection.
#[derive(Debug, Clone, Serialize)]
pub struct InspectionReport {
    pub file: String,
    pub findings: Vec<String>,
    pub schemas: Vec<SchemaOverview>,
    pub endpoints: Vec<EndpointOverview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaOverview {
    pub name: String,
    pub path: String,
    pub properties: usize,
    pub constraints: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointOverview {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub request_constraints: usize,
}

impl InspectionReport {
    pub fn new(
        file: impl Into<String>,
        findings: Vec<String>,
        schemas: &BTreeMap<String, SchemaInfo>,
        endpoints: &[EndpointInfo],
    ) -> Self {
        let schemas = schemas
            .values()
            .map(|schema| SchemaOverview {
                name: schema.name.clone(),
                path: schema.path.clone(),
                properties: schema
                    .schema
                    .get("properties")
                    .and_then(|p| p.as_object())
                    .map(|p| p.len())
                    .unwrap_or(0),
                constraints: schema.declarations.len(),
            })
            .collect();
        let endpoints = endpoints
            .iter()
            .map(|endpoint| EndpointOverview {
                method: endpoint.method.clone(),
                path: endpoint.path.clone(),
                operation_id: endpoint.operation_id.clone(),
                request_constraints: endpoint
                    .request_schema
                    .as_ref()
                    .map(|s| s.declarations.len())
                    .unwrap_or(0),
            })
            .collect();
        Self {
            file: file.into(),
            findings,
            schemas,
            endpoints,
        }
    }

    /// Render output in the specified format
    pub fn render(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => render_json(self),
            OutputFormat::Yaml => render_yaml(self),
            OutputFormat::Table => self.render_table(),
        }
    }

    fn render_table(&self) -> Result<()> {
        let mut stdout = io::stdout();

        writeln!(stdout).ok();
        writeln!(
            stdout,
            "{} {}",
            "Spec Inspection:".cyan().bold(),
            self.file
        )
        .ok();
        writeln!(stdout, "{}", "=".repeat(60)).ok();
        writeln!(stdout).ok();

        if self.findings.is_empty() {
            writeln!(stdout, "{} No structural findings", "+".green()).ok();
        } else {
            writeln!(stdout, "{}", "Structural Findings:".cyan().bold()).ok();
            for finding in &self.findings {
                writeln!(stdout, "  {} {}", "!".yellow(), finding).ok();
            }
        }
        writeln!(stdout).ok();

        writeln!(
            stdout,
            "{}",
            format!("Schemas ({}):", self.schemas.len()).cyan().bold()
        )
        .ok();
        for schema in &self.schemas {
            writeln!(
                stdout,
                "  {} {}",
                schema.name.bold(),
                format!(
                    "({} properties, {} constraints)",
                    schema.properties, schema.constraints
                )
                .dimmed()
            )
            .ok();
            writeln!(stdout, "    {}", schema.path.dimmed()).ok();
        }
        writeln!(stdout).ok();

        writeln!(
            stdout,
            "{}",
            format!("Endpoints ({}):", self.endpoints.len()).cyan().bold()
        )
        .ok();
        for endpoint in &self.endpoints {
            write!(
                stdout,
                "  {} {}",
                endpoint.method.green().bold(),
                endpoint.path.cyan()
            )
            .ok();
            if let Some(operation_id) = &endpoint.operation_id {
                write!(stdout, " {}", format!("({})", operation_id).dimmed()).ok();
            }
            if endpoint.request_constraints > 0 {
                write!(
                    stdout,
                    " {}",
                    format!("[{} request constraints]", endpoint.request_constraints).dimmed()
                )
                .ok();
            }
            writeln!(stdout).ok();
        }

        stdout.flush().ok();
        Ok(())
    }
}

fn render_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DriftError::SerializationError(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn render_yaml<T: Serialize>(value: &T) -> Result<()> {
    let yaml =
        serde_yaml::to_string(value).map_err(|e| DriftError::SerializationError(e.to_string()))?;
    println!("{}", yaml);
    Ok(())
}

fn render_discrepancy_row(stdout: &mut io::Stdout, discrepancy: &Discrepancy) {
    let (icon, label) = match discrepancy.discrepancy_type {
        DiscrepancyType::SpecStricter | DiscrepancyType::SpecLooser => (
            "x".red().to_string(),
            discrepancy.discrepancy_type.to_string().red().bold().to_string(),
        ),
        DiscrepancyType::MissingConstraint | DiscrepancyType::ExtraConstraint => (
            "!".yellow().to_string(),
            discrepancy.discrepancy_type.to_string().yellow().bold().to_string(),
        ),
        _ => (
            "-".white().to_string(),
            discrepancy.discrepancy_type.to_string(),
        ),
    };

    writeln!(stdout).ok();
    writeln!(
        stdout,
        "{} [{}] {} {}",
        icon,
        discrepancy.constraint_type.dimmed(),
        label,
        discrepancy.property_name
    )
    .ok();
    writeln!(stdout, "  {} {}", "Path:".dimmed(), discrepancy.path.cyan()).ok();
    if !discrepancy.recommendation.is_empty() {
        writeln!(
            stdout,
            "  {} {}",
            "Fix:".dimmed(),
            discrepancy.recommendation.green()
        )
        .ok();
    }
}

fn colored_count(count: usize, color: &str) -> String {
    if count == 0 {
        return count.to_string();
    }
    match color {
        "red" => count.to_string().red().to_string(),
        "yellow" => count.to_string().yellow().to_string(),
        "green" => count.to_string().green().to_string(),
        _ => count.to_string(),
    }
}

/// Progress indicator for long-running operations
pub struct ProgressIndicator {
    message: String,
    started: bool,
}

impl ProgressIndicator {
    /// Create a new progress indicator
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            started: false,
        }
    }

    /// Start the progress indicator
    pub fn start(&mut self) {
        if !self.started {
            print!("{} {}... ", "->".blue(), self.message);
            io::stdout().flush().ok();
            self.started = true;
        }
    }

    /// Complete the progress with success
    pub fn success(&self) {
        if self.started {
            println!("{}", "done".green());
        }
    }

    /// Complete the progress with failure
    pub fn failure(&self, error: &str) {
        if self.started {
            println!("{} ({})", "failed".red(), error);
        }
    }
}

/// Format a duration in human-readable format
pub fn format_duration(ms: u64) -> String {
    if ms >= 60000 {
        let minutes = ms / 60000;
        let seconds = (ms % 60000) / 1000;
        format!("{}m {}s", minutes, seconds)
    } else if ms >= 1000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(500), "500ms");
        assert_eq!(format_duration(1500), "1.50s");
        assert_eq!(format_duration(65000), "1m 5s");
    }

    #[test]
    fn test_file_status_projection() {
        let mut result = ReconciliationResult {
            filename: "user.json".to_string(),
            modified: true,
            changes: vec![],
            fixed_spec: Some(json!({})),
            validation_errors: vec![],
        };
        let output = FileStatusOutput::from_result(&result);
        assert_eq!(output.status, "fixed");
        assert_eq!(output.changes, 0);

        result.validation_errors.push("missing info".to_string());
        let output = FileStatusOutput::from_result(&result);
        assert_eq!(output.status, "rolled-back");
        assert_eq!(output.validation_errors.len(), 1);
    }

    #[test]
    fn test_inspection_report_counts() {
        let schema = SchemaInfo {
            name: "User".to_string(),
            path: "#/components/schemas/User".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "maxLength": 50},
                    "role": {"type": "string"},
                },
            }),
            declarations: vec![],
        };
        let schemas = BTreeMap::from([("User".to_string(), schema)]);
        let endpoints = vec![EndpointInfo {
            path: "/users".to_string(),
            method: "POST".to_string(),
            operation_id: Some("createUser".to_string()),
            request_schema: None,
            response_schemas: BTreeMap::new(),
        }];

        let report = InspectionReport::new("user.json", vec![], &schemas, &endpoints);
        assert_eq!(report.schemas.len(), 1);
        assert_eq!(report.schemas[0].properties, 2);
        assert_eq!(report.endpoints.len(), 1);
        assert_eq!(report.endpoints[0].request_constraints, 0);
    }

    #[test]
    fn test_run_report_serializes_with_report_paths() {
        let outcome = RunOutcome::default();
        let summary = RunSummary::build(&outcome, Path::new("."), vec![], vec![]);
        let paths = BTreeMap::from([(
            ReportFormat::Json,
            PathBuf::from("reports/validation_report.json"),
        )]);

        let report = RunReport::new(&summary, &outcome, true, 12, &paths);
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("summary").is_some());
        assert_eq!(value["dry_run"], json!(true));
        assert_eq!(value["reports"]["json"], json!("reports/validation_report.json"));
    }
}
