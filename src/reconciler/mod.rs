//! Spec reconciliation engine
//!
//! Patches OpenAPI documents so their declared constraints match the
//! validation behavior the live API actually exhibits. Each spec file is
//! handled as an independent transaction with three terminal outcomes:
//!
//! - **pass-through**: no discrepancies map to the file, the original
//!   document is emitted unchanged
//! - **fixed**: fixes applied to a clone, the clone re-validates, the
//!   patched document is committed
//! - **rolled-back**: the patched clone fails structural validation, the
//!   original document is emitted and the errors are recorded
//!
//! A broken file never aborts the batch. Discrepancies whose schema node
//! cannot be located are skipped silently; that is best-effort behavior,
//! not an error.

mod changelog;
mod fixes;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{DriftError, Result};
use crate::loader::{list_spec_files, parse_document, save_document, SpecValidator, StructuralValidator};
use crate::validator::{Discrepancy, DiscrepancyType};

/// Patch action applied for one discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixAction {
    Relax,
    Tighten,
    Add,
    Remove,
}

impl FixAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixAction::Relax => "relax",
            FixAction::Tighten => "tighten",
            FixAction::Add => "add",
            FixAction::Remove => "remove",
        }
    }
}

impl fmt::Display for FixAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied modification, recorded for the changelog and summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub action: FixAction,
    pub path: String,
    pub property: String,
    pub constraint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// Terminal state of one file's reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    PassThrough,
    Fixed,
    RolledBack,
}

impl ReconcileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileStatus::PassThrough => "pass-through",
            ReconcileStatus::Fixed => "fixed",
            ReconcileStatus::RolledBack => "rolled-back",
        }
    }
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation tuning, usually read from the `reconciliation` config
/// section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Advisory resolution order, carried through to reports.
    pub priority: Vec<String>,
    /// Strategy overrides keyed by logical category: `tighter_spec`,
    /// `looser_spec`, `missing_constraint`, `extra_constraint`.
    pub fix_strategies: BTreeMap<String, FixAction>,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            priority: vec![
                "existing".to_string(),
                "discovery".to_string(),
                "inferred".to_string(),
            ],
            fix_strategies: BTreeMap::new(),
        }
    }
}

impl ReconciliationConfig {
    /// Strategy for a discrepancy type; `None` means skip.
    ///
    /// Overrides apply per category, so a partial `fix_strategies` map
    /// keeps the defaults for the categories it does not mention.
    pub fn strategy_for(&self, discrepancy_type: DiscrepancyType) -> Option<FixAction> {
        let (category, default) = match discrepancy_type {
            DiscrepancyType::SpecStricter => ("tighter_spec", FixAction::Relax),
            DiscrepancyType::SpecLooser => ("looser_spec", FixAction::Tighten),
            DiscrepancyType::MissingConstraint => ("missing_constraint", FixAction::Add),
            DiscrepancyType::ExtraConstraint => ("extra_constraint", FixAction::Remove),
            DiscrepancyType::ConstraintMismatch | DiscrepancyType::TypeMismatch => return None,
        };
        Some(self.fix_strategies.get(category).copied().unwrap_or(default))
    }
}

/// Outcome of reconciling a single spec file.
#[derive(Debug, Clone)]
pub struct ReconciliationResult {
    pub filename: String,
    pub modified: bool,
    pub changes: Vec<ChangeEntry>,
    /// The document to emit; `None` only when the file failed to load.
    pub fixed_spec: Option<Value>,
    pub validation_errors: Vec<String>,
}

impl ReconciliationResult {
    fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            modified: false,
            changes: Vec::new(),
            fixed_spec: None,
            validation_errors: Vec::new(),
        }
    }

    /// Terminal state. Load failures surface as rolled-back: errors are
    /// recorded and no patched document exists.
    pub fn status(&self) -> ReconcileStatus {
        if !self.validation_errors.is_empty() {
            ReconcileStatus::RolledBack
        } else if self.modified {
            ReconcileStatus::Fixed
        } else {
            ReconcileStatus::PassThrough
        }
    }
}

/// Aggregate counts over a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationSummary {
    pub total_files: usize,
    pub modified_files: Vec<String>,
    pub unmodified_files: Vec<String>,
    pub rolled_back_files: Vec<String>,
    pub total_changes: usize,
    pub changes_by_file: BTreeMap<String, Vec<ChangeEntry>>,
}

/// Reconciles a directory of original specs against a discrepancy list.
pub struct SpecReconciler {
    original_dir: PathBuf,
    output_dir: PathBuf,
    config: ReconciliationConfig,
    validator: Box<dyn SpecValidator>,
    results: Vec<ReconciliationResult>,
}

impl SpecReconciler {
    pub fn new(original_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            original_dir: original_dir.into(),
            output_dir: output_dir.into(),
            config: ReconciliationConfig::default(),
            validator: Box::new(StructuralValidator),
            results: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: ReconciliationConfig) -> Self {
        self.config = config;
        self
    }

    /// Substitute the validator the commit step re-checks patched
    /// documents with.
    pub fn with_validator(mut self, validator: Box<dyn SpecValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn results(&self) -> &[ReconciliationResult] {
        &self.results
    }

    /// Reconcile every spec file in the originals directory.
    ///
    /// Files are processed in deterministic order (`*.json` sorted, then
    /// `*.yaml`/`*.yml` sorted); each produces exactly one result.
    pub fn reconcile_all(
        &mut self,
        discrepancies: &[Discrepancy],
    ) -> Result<&[ReconciliationResult]> {
        info!(
            dir = %self.original_dir.display(),
            discrepancies = discrepancies.len(),
            "reconciling specs"
        );

        let grouped = group_by_file(discrepancies);

        for filename in list_spec_files(&self.original_dir)? {
            let file_discrepancies = grouped
                .get(filename.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let result = self.reconcile_file(&filename, file_discrepancies);
            self.results.push(result);
        }

        Ok(&self.results)
    }

    fn reconcile_file(&self, filename: &str, discrepancies: &[&Discrepancy]) -> ReconciliationResult {
        let mut result = ReconciliationResult::new(filename);

        let path = self.original_dir.join(filename);
        let original = match std::fs::read_to_string(&path)
            .map_err(DriftError::from)
            .and_then(|text| parse_document(filename, &text))
        {
            Ok(doc) => doc,
            Err(error) => {
                warn!(file = %filename, %error, "failed to load spec");
                result.validation_errors.push(error.to_string());
                return result;
            }
        };

        if discrepancies.is_empty() {
            debug!(file = %filename, "no discrepancies, passing through");
            result.fixed_spec = Some(original);
            return result;
        }

        // Copy-on-write transaction: patch a clone, commit only if the
        // clone still validates.
        let mut patched = original.clone();

        for discrepancy in discrepancies {
            if let Some(change) = self.apply_fix(&mut patched, discrepancy) {
                result.changes.push(change);
                result.modified = true;
            }
        }

        if !result.modified {
            result.fixed_spec = Some(original);
            return result;
        }

        let errors = self.validator.validate(&patched);
        if errors.is_empty() {
            info!(file = %filename, changes = result.changes.len(), "fixes applied");
            result.fixed_spec = Some(patched);
        } else {
            warn!(
                file = %filename,
                errors = errors.len(),
                "patched spec failed validation, rolling back"
            );
            result.validation_errors = errors;
            result.fixed_spec = Some(original);
            result.modified = false;
        }

        result
    }

    fn apply_fix(&self, spec: &mut Value, discrepancy: &Discrepancy) -> Option<ChangeEntry> {
        match self.config.strategy_for(discrepancy.discrepancy_type) {
            Some(FixAction::Relax) => fixes::relax_constraint(spec, discrepancy),
            Some(FixAction::Tighten) => fixes::tighten_constraint(spec, discrepancy),
            Some(FixAction::Add) => fixes::add_constraint(spec, discrepancy),
            Some(FixAction::Remove) => fixes::remove_constraint(spec, discrepancy),
            None => {
                debug!(
                    discrepancy_type = %discrepancy.discrepancy_type,
                    property = %discrepancy.property_name,
                    "no fix strategy, skipping"
                );
                None
            }
        }
    }

    /// Write every surviving document to the output directory, in the
    /// format its filename extension implies.
    pub fn save_results(&self) -> Result<BTreeMap<String, PathBuf>> {
        std::fs::create_dir_all(&self.output_dir)?;

        let mut saved = BTreeMap::new();
        for result in &self.results {
            let Some(doc) = &result.fixed_spec else {
                continue;
            };
            let output_path = self.output_dir.join(&result.filename);
            save_document(&output_path, doc)?;
            debug!(file = %result.filename, status = %result.status(), "saved spec");
            saved.insert(result.filename.clone(), output_path);
        }

        Ok(saved)
    }

    pub fn summary(&self) -> ReconciliationSummary {
        let mut summary = ReconciliationSummary {
            total_files: self.results.len(),
            modified_files: Vec::new(),
            unmodified_files: Vec::new(),
            rolled_back_files: Vec::new(),
            total_changes: 0,
            changes_by_file: BTreeMap::new(),
        };

        for result in &self.results {
            match result.status() {
                ReconcileStatus::Fixed => {
                    summary.modified_files.push(result.filename.clone());
                    summary.total_changes += result.changes.len();
                    summary
                        .changes_by_file
                        .insert(result.filename.clone(), result.changes.clone());
                }
                ReconcileStatus::PassThrough => {
                    summary.unmodified_files.push(result.filename.clone());
                }
                ReconcileStatus::RolledBack => {
                    summary.unmodified_files.push(result.filename.clone());
                    summary.rolled_back_files.push(result.filename.clone());
                }
            }
        }

        summary
    }

    /// Render the markdown changelog for this run.
    pub fn generate_changelog(&self) -> String {
        changelog::render(&self.results)
    }
}

/// Group discrepancies by the filename prefix of their `path` field
/// (everything before the first `:`).
fn group_by_file(discrepancies: &[Discrepancy]) -> HashMap<&str, Vec<&Discrepancy>> {
    let mut grouped: HashMap<&str, Vec<&Discrepancy>> = HashMap::new();
    for discrepancy in discrepancies {
        grouped
            .entry(discrepancy.filename())
            .or_default()
            .push(discrepancy);
    }
    grouped
}

/// Read the discrepancy list out of a validation report.
///
/// A missing report is an empty list, not an error; a present but
/// unparseable one propagates.
pub fn load_discrepancies(report_path: &Path) -> Result<Vec<Discrepancy>> {
    if !report_path.exists() {
        debug!(path = %report_path.display(), "no validation report found");
        return Ok(Vec::new());
    }

    let text = std::fs::read_to_string(report_path)?;
    let report: Value = serde_json::from_str(&text)?;

    match report.get("discrepancies") {
        Some(list) => Ok(serde_json::from_value(list.clone())?),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    struct RejectEverything;

    impl SpecValidator for RejectEverything {
        fn validate(&self, _doc: &Value) -> Vec<String> {
            vec!["injected failure".to_string()]
        }
    }

    fn user_spec() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": { "title": "Users", "version": "1.0.0" },
            "paths": { "/api/v1/users": {} },
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "minLength": 10, "maxLength": 50 },
                            "role": { "type": "string", "enum": ["admin", "viewer"] }
                        }
                    }
                }
            }
        })
    }

    fn write_spec(dir: &Path, filename: &str, doc: &Value) {
        std::fs::write(dir.join(filename), serde_json::to_string_pretty(doc).unwrap()).unwrap();
    }

    fn discrepancy(
        constraint: &str,
        dtype: DiscrepancyType,
        api_behavior: Value,
    ) -> Discrepancy {
        Discrepancy {
            path: format!("user.json:User/name/{}", constraint),
            property_name: "User/name".to_string(),
            constraint_type: constraint.to_string(),
            discrepancy_type: dtype,
            spec_value: Value::Null,
            api_behavior,
            test_values: Vec::new(),
            recommendation: String::new(),
        }
    }

    #[test]
    fn test_strategy_defaults() {
        let config = ReconciliationConfig::default();
        assert_eq!(
            config.strategy_for(DiscrepancyType::SpecStricter),
            Some(FixAction::Relax)
        );
        assert_eq!(
            config.strategy_for(DiscrepancyType::SpecLooser),
            Some(FixAction::Tighten)
        );
        assert_eq!(
            config.strategy_for(DiscrepancyType::MissingConstraint),
            Some(FixAction::Add)
        );
        assert_eq!(
            config.strategy_for(DiscrepancyType::ExtraConstraint),
            Some(FixAction::Remove)
        );
        assert_eq!(config.strategy_for(DiscrepancyType::TypeMismatch), None);
        assert_eq!(config.strategy_for(DiscrepancyType::ConstraintMismatch), None);
    }

    #[test]
    fn test_strategy_partial_override_keeps_other_defaults() {
        let mut config = ReconciliationConfig::default();
        config
            .fix_strategies
            .insert("tighter_spec".to_string(), FixAction::Remove);

        assert_eq!(
            config.strategy_for(DiscrepancyType::SpecStricter),
            Some(FixAction::Remove)
        );
        assert_eq!(
            config.strategy_for(DiscrepancyType::SpecLooser),
            Some(FixAction::Tighten)
        );
    }

    #[test]
    fn test_group_by_file_splits_on_first_colon() {
        let discrepancies = vec![
            discrepancy("maxLength", DiscrepancyType::SpecStricter, json!(80)),
            Discrepancy {
                path: "other.yaml:Widget".to_string(),
                ..discrepancy("minLength", DiscrepancyType::SpecLooser, json!(2))
            },
        ];

        let grouped = group_by_file(&discrepancies);
        assert_eq!(grouped["user.json"].len(), 1);
        assert_eq!(grouped["other.yaml"].len(), 1);
    }

    #[test]
    fn test_relax_max_length_end_to_end() {
        let dir = tempdir().unwrap();
        write_spec(dir.path(), "user.json", &user_spec());

        let mut reconciler = SpecReconciler::new(dir.path(), dir.path().join("out"));
        let discrepancies = vec![discrepancy(
            "maxLength",
            DiscrepancyType::SpecStricter,
            json!(80),
        )];

        let results = reconciler.reconcile_all(&discrepancies).unwrap();
        assert_eq!(results.len(), 1);

        let result = &results[0];
        assert_eq!(result.status(), ReconcileStatus::Fixed);
        assert!(result.modified);
        assert_eq!(result.changes.len(), 1);

        let change = &result.changes[0];
        assert_eq!(change.action, FixAction::Relax);
        assert_eq!(change.old_value, Some(json!(50)));
        assert_eq!(change.new_value, Some(json!(80)));

        let patched = result.fixed_spec.clone().unwrap();
        assert_eq!(
            patched.pointer("/components/schemas/User/properties/name/maxLength"),
            Some(&json!(80))
        );

        let saved = reconciler.save_results().unwrap();
        let text = std::fs::read_to_string(&saved["user.json"]).unwrap();
        let reloaded: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reloaded, patched);
    }

    #[test]
    fn test_relax_is_idempotent() {
        let reconciler = SpecReconciler::new("in", "out");
        let mut doc = user_spec();
        let d = discrepancy("minLength", DiscrepancyType::SpecStricter, json!(5));

        let first = reconciler.apply_fix(&mut doc, &d);
        assert_eq!(first.unwrap().new_value, Some(json!(5)));

        // Same observation again: the bound is already at 5.
        let second = reconciler.apply_fix(&mut doc, &d);
        assert!(second.is_none());
    }

    #[test]
    fn test_enum_relax_preserves_declared_order() {
        let reconciler = SpecReconciler::new("in", "out");
        let mut doc = user_spec();
        let d = Discrepancy {
            property_name: "User/role".to_string(),
            ..discrepancy(
                "enum",
                DiscrepancyType::SpecStricter,
                json!(["admin", "operator"]),
            )
        };

        reconciler.apply_fix(&mut doc, &d).unwrap();
        assert_eq!(
            doc.pointer("/components/schemas/User/properties/role/enum"),
            Some(&json!(["admin", "viewer", "operator"]))
        );
    }

    #[test]
    fn test_tighten_enum_replaces_with_observed() {
        let reconciler = SpecReconciler::new("in", "out");
        let mut doc = user_spec();
        let d = Discrepancy {
            property_name: "User/role".to_string(),
            ..discrepancy("enum", DiscrepancyType::SpecLooser, json!(["admin"]))
        };

        reconciler.apply_fix(&mut doc, &d).unwrap();
        assert_eq!(
            doc.pointer("/components/schemas/User/properties/role/enum"),
            Some(&json!(["admin"]))
        );
    }

    #[test]
    fn test_add_and_remove_constraint() {
        let reconciler = SpecReconciler::new("in", "out");
        let mut doc = user_spec();

        let add = discrepancy("pattern", DiscrepancyType::MissingConstraint, json!("^[a-z]+$"));
        let change = reconciler.apply_fix(&mut doc, &add).unwrap();
        assert_eq!(change.action, FixAction::Add);
        assert_eq!(
            doc.pointer("/components/schemas/User/properties/name/pattern"),
            Some(&json!("^[a-z]+$"))
        );

        // Adding over an existing key is a no-op.
        assert!(reconciler.apply_fix(&mut doc, &add).is_none());

        let remove = discrepancy("minLength", DiscrepancyType::ExtraConstraint, Value::Null);
        let change = reconciler.apply_fix(&mut doc, &remove).unwrap();
        assert_eq!(change.action, FixAction::Remove);
        assert_eq!(change.old_value, Some(json!(10)));
        assert!(doc
            .pointer("/components/schemas/User/properties/name/minLength")
            .is_none());
    }

    #[test]
    fn test_pass_through_without_discrepancies() {
        let dir = tempdir().unwrap();
        write_spec(dir.path(), "user.json", &user_spec());

        let mut reconciler = SpecReconciler::new(dir.path(), dir.path().join("out"));
        let results = reconciler.reconcile_all(&[]).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status(), ReconcileStatus::PassThrough);
        assert_eq!(results[0].fixed_spec, Some(user_spec()));
    }

    #[test]
    fn test_rollback_restores_original() {
        let dir = tempdir().unwrap();
        write_spec(dir.path(), "user.json", &user_spec());

        let mut reconciler = SpecReconciler::new(dir.path(), dir.path().join("out"))
            .with_validator(Box::new(RejectEverything));
        let discrepancies = vec![discrepancy(
            "maxLength",
            DiscrepancyType::SpecStricter,
            json!(80),
        )];

        let results = reconciler.reconcile_all(&discrepancies).unwrap();
        let result = &results[0];

        assert_eq!(result.status(), ReconcileStatus::RolledBack);
        assert!(!result.modified);
        assert_eq!(result.validation_errors, vec!["injected failure".to_string()]);
        // The emitted document is the untouched original.
        assert_eq!(result.fixed_spec, Some(user_spec()));

        let saved = reconciler.save_results().unwrap();
        let text = std::fs::read_to_string(&saved["user.json"]).unwrap();
        let reloaded: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reloaded, user_spec());
    }

    #[test]
    fn test_unresolvable_property_is_skipped() {
        let dir = tempdir().unwrap();
        write_spec(dir.path(), "user.json", &user_spec());

        let mut reconciler = SpecReconciler::new(dir.path(), dir.path().join("out"));
        let discrepancies = vec![Discrepancy {
            property_name: "Missing/field".to_string(),
            ..discrepancy("maxLength", DiscrepancyType::SpecStricter, json!(80))
        }];

        let results = reconciler.reconcile_all(&discrepancies).unwrap();
        assert_eq!(results[0].status(), ReconcileStatus::PassThrough);
        assert!(results[0].changes.is_empty());
    }

    #[test]
    fn test_summary_counts() {
        let dir = tempdir().unwrap();
        write_spec(dir.path(), "a.json", &user_spec());
        write_spec(dir.path(), "b.json", &user_spec());

        let mut reconciler = SpecReconciler::new(dir.path(), dir.path().join("out"));
        let discrepancies = vec![Discrepancy {
            path: "a.json:User/name/maxLength".to_string(),
            ..discrepancy("maxLength", DiscrepancyType::SpecStricter, json!(80))
        }];

        reconciler.reconcile_all(&discrepancies).unwrap();
        let summary = reconciler.summary();

        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.modified_files, vec!["a.json"]);
        assert_eq!(summary.unmodified_files, vec!["b.json"]);
        assert!(summary.rolled_back_files.is_empty());
        assert_eq!(summary.total_changes, 1);
        assert_eq!(summary.changes_by_file["a.json"].len(), 1);
    }

    #[test]
    fn test_load_discrepancies_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let loaded = load_discrepancies(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_load_discrepancies_fills_defaults() {
        let dir = tempdir().unwrap();
        let report_path = dir.path().join("validation_report.json");
        std::fs::write(
            &report_path,
            r#"{
                "summary": {},
                "discrepancies": [
                    {
                        "path": "user.json:User/name/maxLength",
                        "constraint_type": "maxLength",
                        "discrepancy_type": "spec_stricter",
                        "api_behavior": 80
                    }
                ]
            }"#,
        )
        .unwrap();

        let loaded = load_discrepancies(&report_path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].discrepancy_type, DiscrepancyType::SpecStricter);
        assert_eq!(loaded[0].api_behavior, json!(80));
        assert!(loaded[0].property_name.is_empty());
        assert!(loaded[0].test_values.is_empty());
    }
}
