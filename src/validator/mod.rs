//! Constraint validation against observed API behavior
//!
//! This module synthesizes boundary-value test cases from declared OpenAPI
//! constraints and classifies mismatches between the declared expectation
//! and the observed accept/reject behavior of a live API.
//!
//! # Architecture
//!
//! - [`ConstraintKind`] - closed set of supported constraint keywords
//! - [`TestCase`] - a probe value with its expected verdict
//! - [`ConstraintValidator`] - case generation and outcome comparison
//! - [`Discrepancy`] / [`DiscrepancyType`] - classified mismatches
//!
//! Case generation is pure: no I/O, no shared state. Dispatch is a single
//! exhaustive `match` over [`ConstraintKind`], so adding a keyword without
//! a generator fails to compile.
//!
//! # Example
//!
//! ```rust
//! use spec_drift::validator::{ConstraintKind, ConstraintValidator};
//! use serde_json::json;
//!
//! let validator = ConstraintValidator::new();
//! let cases = validator.generate_test_cases(ConstraintKind::MinLength, &json!(5));
//! assert!(cases.iter().any(|c| c.name == "minLength_exact_5"));
//!
//! // API accepted a value the spec marks invalid -> the spec is stricter
//! let case = &cases.iter().find(|c| !c.expected_valid).unwrap();
//! let discrepancy = validator.compare_results(case, true).unwrap();
//! ```

mod generators;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::DriftError;

/// Marker key used to represent omission of a field in a test payload.
///
/// A test case value of `{"_omit_field": "name"}` instructs the probe
/// runner to remove `name` from the request body instead of setting it.
pub const OMIT_FIELD_MARKER: &str = "_omit_field";

/// Sentinel string guaranteed (checked) to be outside any declared enum.
pub const INVALID_ENUM_SENTINEL: &str = "INVALID_ENUM_VALUE_12345";

/// Supported OpenAPI constraint keywords.
///
/// The set is closed on purpose: every keyword the loader extracts has a
/// generator, and the reconciler knows how to relax or tighten it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    #[serde(rename = "minLength")]
    MinLength,
    #[serde(rename = "maxLength")]
    MaxLength,
    #[serde(rename = "pattern")]
    Pattern,
    #[serde(rename = "minimum")]
    Minimum,
    #[serde(rename = "maximum")]
    Maximum,
    #[serde(rename = "exclusiveMinimum")]
    ExclusiveMinimum,
    #[serde(rename = "exclusiveMaximum")]
    ExclusiveMaximum,
    #[serde(rename = "minItems")]
    MinItems,
    #[serde(rename = "maxItems")]
    MaxItems,
    #[serde(rename = "uniqueItems")]
    UniqueItems,
    #[serde(rename = "enum")]
    Enum,
    #[serde(rename = "type")]
    Type,
    #[serde(rename = "required")]
    Required,
}

impl ConstraintKind {
    /// All supported keywords, in extraction order.
    pub const ALL: [ConstraintKind; 13] = [
        ConstraintKind::MinLength,
        ConstraintKind::MaxLength,
        ConstraintKind::Pattern,
        ConstraintKind::Minimum,
        ConstraintKind::Maximum,
        ConstraintKind::ExclusiveMinimum,
        ConstraintKind::ExclusiveMaximum,
        ConstraintKind::MinItems,
        ConstraintKind::MaxItems,
        ConstraintKind::UniqueItems,
        ConstraintKind::Enum,
        ConstraintKind::Type,
        ConstraintKind::Required,
    ];

    /// The OpenAPI keyword as it appears in a schema document.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::MinLength => "minLength",
            ConstraintKind::MaxLength => "maxLength",
            ConstraintKind::Pattern => "pattern",
            ConstraintKind::Minimum => "minimum",
            ConstraintKind::Maximum => "maximum",
            ConstraintKind::ExclusiveMinimum => "exclusiveMinimum",
            ConstraintKind::ExclusiveMaximum => "exclusiveMaximum",
            ConstraintKind::MinItems => "minItems",
            ConstraintKind::MaxItems => "maxItems",
            ConstraintKind::UniqueItems => "uniqueItems",
            ConstraintKind::Enum => "enum",
            ConstraintKind::Type => "type",
            ConstraintKind::Required => "required",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintKind {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstraintKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DriftError::invalid_input(format!("unknown constraint keyword: {}", s)))
    }
}

/// A synthesized probe value with its expected verdict.
///
/// `name` encodes the constraint keyword and the boundary variant
/// (`minLength_exact_5`, `maxLength_above_10`, ...); the text before the
/// first `_` recovers the keyword when a case round-trips through a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub value: Value,
    pub expected_valid: bool,
    pub description: String,
}

impl TestCase {
    /// Create a case the spec declares valid.
    pub fn valid(name: impl Into<String>, value: Value, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            expected_valid: true,
            description: description.into(),
        }
    }

    /// Create a case the spec declares invalid.
    pub fn invalid(name: impl Into<String>, value: Value, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            expected_valid: false,
            description: description.into(),
        }
    }

    /// The constraint keyword encoded in the case name.
    pub fn constraint_token(&self) -> &str {
        self.name.split('_').next().unwrap_or("")
    }

    /// If this case represents field omission, the field to omit.
    pub fn omitted_field(&self) -> Option<&str> {
        self.value
            .as_object()
            .and_then(|obj| obj.get(OMIT_FIELD_MARKER))
            .and_then(Value::as_str)
    }
}

/// Classification of a declared-vs-observed mismatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    /// Spec rejects a value the API accepts.
    SpecStricter,
    /// Spec accepts a value the API rejects.
    SpecLooser,
    /// API enforces a constraint the spec does not declare.
    MissingConstraint,
    /// Spec declares a constraint the API does not enforce.
    ExtraConstraint,
    /// Declared and enforced values disagree.
    #[default]
    ConstraintMismatch,
    /// Declared and observed types disagree.
    TypeMismatch,
}

impl DiscrepancyType {
    /// The snake_case tag used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyType::SpecStricter => "spec_stricter",
            DiscrepancyType::SpecLooser => "spec_looser",
            DiscrepancyType::MissingConstraint => "missing_constraint",
            DiscrepancyType::ExtraConstraint => "extra_constraint",
            DiscrepancyType::ConstraintMismatch => "constraint_mismatch",
            DiscrepancyType::TypeMismatch => "type_mismatch",
        }
    }
}

impl fmt::Display for DiscrepancyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared-vs-observed mismatch.
///
/// `path` is `<filename>:<schema-path>`; the text before the first `:` is
/// the spec filename the reconciler groups by. `compare_results` leaves
/// `path`, `property_name` and `recommendation` empty for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub property_name: String,
    #[serde(default)]
    pub constraint_type: String,
    #[serde(default)]
    pub discrepancy_type: DiscrepancyType,
    #[serde(default)]
    pub spec_value: Value,
    #[serde(default)]
    pub api_behavior: Value,
    #[serde(default)]
    pub test_values: Vec<Value>,
    #[serde(default)]
    pub recommendation: String,
}

impl Discrepancy {
    /// Attach the spec location a discrepancy was observed at.
    pub fn with_location(mut self, path: impl Into<String>, property: impl Into<String>) -> Self {
        self.path = path.into();
        self.property_name = property.into();
        self
    }

    /// Attach a remediation suggestion.
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    /// The spec filename portion of `path` (everything before the first `:`).
    pub fn filename(&self) -> &str {
        self.path.split(':').next().unwrap_or("")
    }
}

/// Synthesizes boundary test cases and classifies probe outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintValidator;

impl ConstraintValidator {
    pub fn new() -> Self {
        Self
    }

    /// Generate boundary-value test cases for one declared constraint.
    ///
    /// A constraint value of the wrong JSON type produces no cases; the
    /// keyword is skipped with a debug log rather than failing the run.
    pub fn generate_test_cases(&self, kind: ConstraintKind, value: &Value) -> Vec<TestCase> {
        match kind {
            ConstraintKind::MinLength => generators::min_length(value),
            ConstraintKind::MaxLength => generators::max_length(value),
            ConstraintKind::Pattern => generators::pattern(value),
            ConstraintKind::Minimum => generators::minimum(value),
            ConstraintKind::Maximum => generators::maximum(value),
            ConstraintKind::ExclusiveMinimum => generators::exclusive_minimum(value),
            ConstraintKind::ExclusiveMaximum => generators::exclusive_maximum(value),
            ConstraintKind::MinItems => generators::min_items(value),
            ConstraintKind::MaxItems => generators::max_items(value),
            ConstraintKind::UniqueItems => generators::unique_items(value),
            ConstraintKind::Enum => generators::enum_members(value),
            ConstraintKind::Type => generators::type_examples(value),
            ConstraintKind::Required => generators::required_fields(value),
        }
    }

    /// Compare a test case's expectation with the observed API verdict.
    ///
    /// Agreement yields `None`. Expected-invalid-but-accepted means the
    /// spec is stricter than the API; expected-valid-but-rejected means
    /// the spec is looser.
    pub fn compare_results(&self, case: &TestCase, api_accepted: bool) -> Option<Discrepancy> {
        if case.expected_valid == api_accepted {
            return None;
        }

        let discrepancy_type = if case.expected_valid {
            DiscrepancyType::SpecLooser
        } else {
            DiscrepancyType::SpecStricter
        };

        Some(Discrepancy {
            path: String::new(),
            property_name: String::new(),
            constraint_type: case.constraint_token().to_string(),
            discrepancy_type,
            spec_value: Value::Bool(case.expected_valid),
            api_behavior: Value::Bool(api_accepted),
            test_values: vec![case.value.clone()],
            recommendation: String::new(),
        })
    }
}
