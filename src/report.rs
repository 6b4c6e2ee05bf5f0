//! Validation run reports
//!
//! Persists a probe run as `validation_report.{json,md,html}` in the
//! configured formats. The JSON report is the machine-readable handoff:
//! its `discrepancies` array is what the reconciler consumes on a later
//! `reconcile` invocation. Markdown and HTML mirror the same content for
//! humans; the HTML report is a single self-contained file.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::runner::{EndpointRunResult, RunOutcome};
use crate::validator::Discrepancy;

/// Report output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Markdown,
    Html,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "markdown",
            ReportFormat::Html => "html",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report generation settings, usually the `reports` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub formats: Vec<ReportFormat>,
    /// Whether discrepancy records carry their triggering test values.
    pub include_examples: bool,
    /// Per-discrepancy test value cap; the detail listing caps at ten
    /// times this.
    pub max_examples_per_issue: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
            formats: vec![ReportFormat::Json, ReportFormat::Html, ReportFormat::Markdown],
            include_examples: true,
            max_examples_per_issue: 5,
        }
    }
}

impl ReportConfig {
    /// Path the JSON report lands at; the reconcile flow reads this back.
    pub fn json_report_path(&self) -> PathBuf {
        self.output_dir.join("validation_report.json")
    }
}

/// Aggregate facts about one validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    pub total_endpoints: usize,
    pub total_cases: usize,
    pub probes_sent: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub total_discrepancies: usize,
    pub discrepancies_by_type: BTreeMap<String, usize>,
    /// Spec filename to sha256 digest, for pinning what was validated.
    pub spec_files: BTreeMap<String, String>,
    pub modified_files: Vec<String>,
    pub unmodified_files: Vec<String>,
}

impl RunSummary {
    /// Summarize a run. Digests are best-effort; an unreadable file is
    /// logged and skipped.
    pub fn build(
        outcome: &RunOutcome,
        spec_dir: &Path,
        modified_files: Vec<String>,
        unmodified_files: Vec<String>,
    ) -> Self {
        let mut discrepancies_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for discrepancy in &outcome.discrepancies {
            *discrepancies_by_type
                .entry(discrepancy.discrepancy_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let mut spec_files = BTreeMap::new();
        for filename in &outcome.spec_files {
            match sha256_hex(&spec_dir.join(filename)) {
                Ok(digest) => {
                    spec_files.insert(filename.clone(), digest);
                }
                Err(error) => warn!(file = %filename, %error, "could not digest spec file"),
            }
        }

        Self {
            run_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_endpoints: outcome.endpoint_results.len(),
            total_cases: outcome.total_cases,
            probes_sent: outcome.probes_sent,
            passed: outcome.endpoint_results.iter().map(|r| r.passed).sum(),
            failed: outcome.endpoint_results.iter().map(|r| r.failed).sum(),
            errors: outcome.endpoint_results.iter().map(|r| r.errors).sum(),
            total_discrepancies: outcome.discrepancies.len(),
            discrepancies_by_type,
            spec_files,
            modified_files,
            unmodified_files,
        }
    }
}

/// Writes report artifacts in the configured formats.
pub struct ReportGenerator {
    config: ReportConfig,
}

impl ReportGenerator {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Generate every configured format; returns format-to-path.
    pub fn generate_all(
        &self,
        summary: &RunSummary,
        results: &[EndpointRunResult],
        discrepancies: &[Discrepancy],
    ) -> Result<BTreeMap<ReportFormat, PathBuf>> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let mut output_files = BTreeMap::new();
        for format in &self.config.formats {
            let path = match format {
                ReportFormat::Json => self.generate_json(summary, results, discrepancies)?,
                ReportFormat::Markdown => self.generate_markdown(summary, results, discrepancies)?,
                ReportFormat::Html => self.generate_html(summary, results, discrepancies)?,
            };
            info!(format = %format, path = %path.display(), "report written");
            output_files.insert(*format, path);
        }

        Ok(output_files)
    }

    fn generate_json(
        &self,
        summary: &RunSummary,
        results: &[EndpointRunResult],
        discrepancies: &[Discrepancy],
    ) -> Result<PathBuf> {
        let output_path = self.config.json_report_path();

        let capped: Vec<Discrepancy> = discrepancies
            .iter()
            .map(|d| self.cap_examples(d))
            .collect();

        let report = json!({
            "summary": summary,
            "files": summary.spec_files,
            "results": results.iter().map(endpoint_row).collect::<Vec<_>>(),
            "discrepancies": capped,
        });

        let mut text = serde_json::to_string_pretty(&report)?;
        text.push('\n');
        std::fs::write(&output_path, text)?;
        Ok(output_path)
    }

    fn generate_markdown(
        &self,
        summary: &RunSummary,
        results: &[EndpointRunResult],
        discrepancies: &[Discrepancy],
    ) -> Result<PathBuf> {
        let output_path = self.config.output_dir.join("validation_report.md");

        let mut lines = vec![
            "# API Validation Report".to_string(),
            String::new(),
            format!("**Generated:** {}", summary.timestamp),
            format!("**Run:** `{}`", summary.run_id),
            String::new(),
            "## Summary".to_string(),
            String::new(),
            format!("- **Total Endpoints:** {}", summary.total_endpoints),
            format!("- **Total Test Cases:** {}", summary.total_cases),
            format!("- **Probes Sent:** {}", summary.probes_sent),
            format!("- **Passed:** {}", summary.passed),
            format!("- **Failed:** {}", summary.failed),
            format!("- **Errors:** {}", summary.errors),
            format!("- **Discrepancies Found:** {}", summary.total_discrepancies),
            String::new(),
            "### Discrepancies by Type".to_string(),
            String::new(),
        ];

        for (dtype, count) in &summary.discrepancies_by_type {
            lines.push(format!("- {}: {}", dtype, count));
        }

        lines.push(String::new());
        lines.push("## Modified Files".to_string());
        lines.push(String::new());
        if summary.modified_files.is_empty() {
            lines.push("*No files required modification*".to_string());
        } else {
            for file in &summary.modified_files {
                lines.push(format!("- `{}` (fixed)", file));
            }
        }

        lines.push(String::new());
        lines.push("## Unmodified Files (Pass-through)".to_string());
        lines.push(String::new());
        if summary.unmodified_files.is_empty() {
            lines.push("*All files required modification*".to_string());
        } else {
            for file in &summary.unmodified_files {
                lines.push(format!("- `{}`", file));
            }
        }

        lines.push(String::new());
        lines.push("## Discrepancy Details".to_string());
        lines.push(String::new());

        let detail_cap = self.config.max_examples_per_issue * 10;
        for (i, d) in discrepancies.iter().take(detail_cap).enumerate() {
            lines.push(format!("### {}. {} - {}", i + 1, d.path, d.property_name));
            lines.push(String::new());
            lines.push(format!("- **Type:** {}", d.discrepancy_type));
            lines.push(format!("- **Constraint:** {}", d.constraint_type));
            lines.push(format!("- **Spec Value:** `{}`", d.spec_value));
            lines.push(format!("- **API Behavior:** `{}`", d.api_behavior));
            lines.push(String::new());

            if !d.recommendation.is_empty() {
                lines.push(format!("**Recommendation:** {}", d.recommendation));
                lines.push(String::new());
            }
        }

        lines.push(String::new());
        lines.push("## Test Results by Endpoint".to_string());
        lines.push(String::new());
        if results.is_empty() {
            lines.push("*No endpoints were probed*".to_string());
        } else {
            lines.push(
                "| Endpoint | Resource | Status | Cases | Passed | Failed | Errors |".to_string(),
            );
            lines.push(
                "|----------|----------|--------|-------|--------|--------|--------|".to_string(),
            );
            for result in results {
                lines.push(format!(
                    "| `{}` | {} | {} | {} | {} | {} | {} |",
                    result.endpoint,
                    result.resource,
                    result.status(),
                    result.cases,
                    result.passed,
                    result.failed,
                    result.errors
                ));
            }
        }

        std::fs::write(&output_path, lines.join("\n"))?;
        Ok(output_path)
    }

    fn generate_html(
        &self,
        summary: &RunSummary,
        results: &[EndpointRunResult],
        discrepancies: &[Discrepancy],
    ) -> Result<PathBuf> {
        let output_path = self.config.output_dir.join("validation_report.html");

        let mut html = String::with_capacity(16 * 1024);
        html.push_str(HTML_HEAD);
        html.push_str("<body>\n<div class=\"container\">\n");
        html.push_str("<h1>API Validation Report</h1>\n");
        html.push_str(&format!(
            "<p>Generated: {} &middot; Run <code>{}</code></p>\n",
            escape_html(&summary.timestamp),
            summary.run_id
        ));

        html.push_str("<div class=\"card\">\n<h2>Summary</h2>\n<div class=\"stats\">\n");
        for (value, label, class) in [
            (summary.total_endpoints, "Endpoints", ""),
            (summary.total_cases, "Test Cases", ""),
            (summary.probes_sent, "Probes Sent", ""),
            (summary.passed, "Passed", " passed"),
            (summary.failed, "Failed", " failed"),
            (summary.errors, "Errors", " error"),
            (summary.total_discrepancies, "Discrepancies", ""),
        ] {
            html.push_str(&format!(
                "<div class=\"stat\"><div class=\"stat-value{}\">{}</div><div class=\"stat-label\">{}</div></div>\n",
                class, value, label
            ));
        }
        html.push_str("</div>\n</div>\n");

        html.push_str("<div class=\"card\">\n<h2>File Status</h2>\n");
        html.push_str(&format!(
            "<h3>Modified Files ({})</h3>\n<ul>\n",
            summary.modified_files.len()
        ));
        if summary.modified_files.is_empty() {
            html.push_str("<li>No files required modification</li>\n");
        } else {
            for file in &summary.modified_files {
                html.push_str(&format!("<li><code>{}</code> - Fixed</li>\n", escape_html(file)));
            }
        }
        html.push_str(&format!(
            "</ul>\n<h3>Unmodified Files ({})</h3>\n<ul>\n",
            summary.unmodified_files.len()
        ));
        if summary.unmodified_files.is_empty() {
            html.push_str("<li>All files required modification</li>\n");
        } else {
            for file in &summary.unmodified_files {
                html.push_str(&format!(
                    "<li><code>{}</code> - Pass-through</li>\n",
                    escape_html(file)
                ));
            }
        }
        html.push_str("</ul>\n</div>\n");

        if !results.is_empty() {
            html.push_str("<div class=\"card\">\n<h2>Test Results</h2>\n<table>\n");
            html.push_str(
                "<thead><tr><th>Endpoint</th><th>Resource</th><th>Status</th><th>Cases</th>\
                 <th>Passed</th><th>Failed</th><th>Errors</th></tr></thead>\n<tbody>\n",
            );
            for result in results {
                html.push_str(&format!(
                    "<tr><td><code>{}</code></td><td>{}</td><td><span class=\"{}\">{}</span></td>\
                     <td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    escape_html(&result.endpoint),
                    escape_html(&result.resource),
                    result.status(),
                    result.status(),
                    result.cases,
                    result.passed,
                    result.failed,
                    result.errors
                ));
            }
            html.push_str("</tbody>\n</table>\n</div>\n");
        }

        if !discrepancies.is_empty() {
            html.push_str("<div class=\"card\">\n<h2>Discrepancies</h2>\n");
            for d in discrepancies.iter().take(50) {
                html.push_str("<div class=\"issue\">\n");
                html.push_str(&format!(
                    "<h3>{} - {}</h3>\n",
                    escape_html(&d.path),
                    escape_html(&d.property_name)
                ));
                html.push_str(&format!(
                    "<p><strong>Type:</strong> {}</p>\n",
                    d.discrepancy_type
                ));
                html.push_str(&format!(
                    "<p><strong>Constraint:</strong> {}</p>\n",
                    escape_html(&d.constraint_type)
                ));
                html.push_str(&format!(
                    "<p><strong>Spec Value:</strong> <code>{}</code></p>\n",
                    escape_html(&d.spec_value.to_string())
                ));
                html.push_str(&format!(
                    "<p><strong>API Behavior:</strong> <code>{}</code></p>\n",
                    escape_html(&d.api_behavior.to_string())
                ));
                if !d.recommendation.is_empty() {
                    html.push_str(&format!(
                        "<p><strong>Recommendation:</strong> {}</p>\n",
                        escape_html(&d.recommendation)
                    ));
                }
                html.push_str("</div>\n");
            }
            html.push_str("</div>\n");
        }

        html.push_str("</div>\n</body>\n</html>\n");

        std::fs::write(&output_path, html)?;
        Ok(output_path)
    }

    fn cap_examples(&self, discrepancy: &Discrepancy) -> Discrepancy {
        let mut capped = discrepancy.clone();
        if self.config.include_examples {
            capped.test_values.truncate(self.config.max_examples_per_issue);
        } else {
            capped.test_values.clear();
        }
        capped
    }
}

fn sha256_hex(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

fn endpoint_row(result: &EndpointRunResult) -> Value {
    json!({
        "endpoint": result.endpoint,
        "resource": result.resource,
        "status": result.status(),
        "cases": result.cases,
        "passed": result.passed,
        "failed": result.failed,
        "indeterminate": result.indeterminate,
        "errors": result.errors,
    })
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>API Validation Report</title>
<style>
:root {
  --bg: #14141f;
  --card: #1d1d2c;
  --panel: #27273a;
  --accent: #4d9de0;
  --text: #e8e8e8;
  --success: #3bb273;
  --warning: #e1bc29;
  --error: #e15554;
}
body {
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
  background: var(--bg);
  color: var(--text);
  margin: 0;
  padding: 20px;
  line-height: 1.6;
}
.container { max-width: 1100px; margin: 0 auto; }
h1, h2, h3 { color: var(--accent); }
.card {
  background: var(--card);
  border-radius: 8px;
  padding: 20px;
  margin: 20px 0;
  box-shadow: 0 4px 6px rgba(0, 0, 0, 0.3);
}
.stats {
  display: grid;
  grid-template-columns: repeat(auto-fit, minmax(140px, 1fr));
  gap: 14px;
}
.stat {
  background: var(--panel);
  padding: 14px;
  border-radius: 8px;
  text-align: center;
}
.stat-value { font-size: 2em; font-weight: bold; }
.stat-label { color: #9a9ab0; font-size: 0.9em; }
.passed { color: var(--success); }
.failed { color: var(--error); }
.error { color: var(--warning); }
.issue {
  margin: 15px 0;
  padding: 15px;
  background: var(--panel);
  border-radius: 8px;
}
.issue h3 { margin-top: 0; }
table { width: 100%; border-collapse: collapse; margin-top: 10px; }
th, td { text-align: left; padding: 8px 10px; border-bottom: 1px solid var(--panel); }
th { color: var(--accent); }
code {
  background: #32324a;
  padding: 2px 6px;
  border-radius: 4px;
  font-family: 'Monaco', 'Consolas', monospace;
}
ul { padding-left: 20px; }
</style>
</head>
"#;
