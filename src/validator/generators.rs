//! Boundary-value case synthesis, one function per constraint keyword.
//!
//! Generators are total: a constraint value of the wrong JSON type yields
//! an empty case list and a debug log, never an error. String lengths use
//! repeated `a`, arrays repeated `"item"`, so failures read predictably in
//! reports.

use regex::Regex;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, warn};

use super::{TestCase, INVALID_ENUM_SENTINEL, OMIT_FIELD_MARKER};

/// Fixed candidates for non-matching pattern samples. Each is verified
/// against the compiled pattern before use.
const NON_MATCHING_CANDIDATES: [&str; 6] = [
    "123test",   // starts with a digit
    "-test",     // starts with a hyphen
    "TEST_NAME", // uppercase and underscore
    "test name", // contains a space
    "",          // empty
    "test!@#",   // special characters
];

/// Numeric constraint value preserving the integer-ness of the bound.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn from_value(value: &Value) -> Option<Num> {
        if let Some(i) = value.as_i64() {
            Some(Num::Int(i))
        } else {
            value.as_f64().map(Num::Float)
        }
    }

    fn plus_one(self) -> Num {
        match self {
            Num::Int(i) => Num::Int(i.saturating_add(1)),
            Num::Float(f) => Num::Float(f + 1.0),
        }
    }

    fn minus_one(self) -> Num {
        match self {
            Num::Int(i) => Num::Int(i.saturating_sub(1)),
            Num::Float(f) => Num::Float(f - 1.0),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn json(self) -> Value {
        match self {
            Num::Int(i) => json!(i),
            Num::Float(f) => json!(f),
        }
    }
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Num::Int(i) => write!(f, "{}", i),
            Num::Float(x) => write!(f, "{}", x),
        }
    }
}

fn skipped(keyword: &str, value: &Value) -> Vec<TestCase> {
    debug!(
        constraint = keyword,
        value = %value,
        "constraint value has unexpected type, skipping"
    );
    Vec::new()
}

fn repeated_string(len: usize) -> Value {
    json!("a".repeat(len))
}

fn repeated_items(len: usize) -> Value {
    Value::Array(vec![json!("item"); len])
}

pub(super) fn min_length(value: &Value) -> Vec<TestCase> {
    let Some(min) = value.as_u64() else {
        return skipped("minLength", value);
    };
    let min = min as usize;

    let mut tests = vec![TestCase::valid(
        format!("minLength_exact_{}", min),
        repeated_string(min),
        format!("String of exactly {} characters", min),
    )];

    if min > 0 {
        tests.push(TestCase::invalid(
            format!("minLength_below_{}", min),
            repeated_string(min - 1),
            format!("String of {} characters (below minimum)", min - 1),
        ));
        tests.push(TestCase::invalid(
            "minLength_empty",
            json!(""),
            "Empty string",
        ));
    }

    tests.push(TestCase::valid(
        format!("minLength_above_{}", min),
        repeated_string(min + 5),
        format!("String of {} characters (above minimum)", min + 5),
    ));

    tests
}

pub(super) fn max_length(value: &Value) -> Vec<TestCase> {
    let Some(max) = value.as_u64() else {
        return skipped("maxLength", value);
    };
    let max = max as usize;

    vec![
        TestCase::valid(
            format!("maxLength_exact_{}", max),
            repeated_string(max),
            format!("String of exactly {} characters", max),
        ),
        TestCase::invalid(
            format!("maxLength_above_{}", max),
            repeated_string(max + 1),
            format!("String of {} characters (above maximum)", max + 1),
        ),
        TestCase::invalid(
            format!("maxLength_overflow_{}", max),
            repeated_string(max + 100),
            format!("String of {} characters (overflow)", max + 100),
        ),
        TestCase::valid("maxLength_empty", json!(""), "Empty string"),
    ]
}

/// Mirrors `re.match` semantics: the pattern must match starting at the
/// first byte, anchored or not.
fn matches_at_start(regex: &Regex, input: &str) -> bool {
    regex.find(input).is_some_and(|m| m.start() == 0)
}

/// Heuristic samples expected to match common naming patterns. The first
/// branch covers the resource-name patterns seen throughout real specs.
fn matching_samples(pattern: &str) -> &'static [&'static str] {
    if pattern == r"^[a-z][a-z0-9-]*$" || pattern == r"^[a-z0-9][a-z0-9-]*$" {
        &["test-name", "my-resource-1", "a", "abc123"]
    } else if pattern.contains("^[a-zA-Z]") {
        &["TestName", "myResource", "ABC"]
    } else if pattern.contains("^[0-9]") {
        &["123", "1test", "999"]
    } else {
        &["test", "test123", "test-123"]
    }
}

pub(super) fn pattern(value: &Value) -> Vec<TestCase> {
    let Some(pattern) = value.as_str() else {
        return skipped("pattern", value);
    };

    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(error) => {
            warn!(pattern, %error, "invalid regex pattern, skipping constraint");
            return Vec::new();
        }
    };

    let mut tests = Vec::new();

    // Heuristic samples are trusted; wrong guesses surface as spec_looser
    // discrepancies a human reviews rather than silent gaps.
    for (i, sample) in matching_samples(pattern).iter().take(3).enumerate() {
        tests.push(TestCase::valid(
            format!("pattern_valid_{}", i),
            json!(sample),
            format!("String matching pattern: {}", sample),
        ));
    }

    for (i, sample) in NON_MATCHING_CANDIDATES.iter().take(3).enumerate() {
        if !matches_at_start(&regex, sample) {
            tests.push(TestCase::invalid(
                format!("pattern_invalid_{}", i),
                json!(sample),
                format!("String not matching pattern: {}", sample),
            ));
        }
    }

    tests
}

pub(super) fn minimum(value: &Value) -> Vec<TestCase> {
    let Some(min) = Num::from_value(value) else {
        return skipped("minimum", value);
    };

    vec![
        TestCase::valid(
            format!("minimum_exact_{}", min),
            min.json(),
            format!("Value exactly at minimum ({})", min),
        ),
        TestCase::invalid(
            format!("minimum_below_{}", min),
            min.minus_one().json(),
            format!("Value below minimum ({})", min.minus_one()),
        ),
        TestCase::valid(
            format!("minimum_above_{}", min),
            min.plus_one().json(),
            format!("Value above minimum ({})", min.plus_one()),
        ),
    ]
}

pub(super) fn maximum(value: &Value) -> Vec<TestCase> {
    let Some(max) = Num::from_value(value) else {
        return skipped("maximum", value);
    };

    vec![
        TestCase::valid(
            format!("maximum_exact_{}", max),
            max.json(),
            format!("Value exactly at maximum ({})", max),
        ),
        TestCase::invalid(
            format!("maximum_above_{}", max),
            max.plus_one().json(),
            format!("Value above maximum ({})", max.plus_one()),
        ),
        TestCase::valid(
            format!("maximum_below_{}", max),
            max.minus_one().json(),
            format!("Value below maximum ({})", max.minus_one()),
        ),
    ]
}

pub(super) fn exclusive_minimum(value: &Value) -> Vec<TestCase> {
    let Some(min) = Num::from_value(value) else {
        return skipped("exclusiveMinimum", value);
    };
    let just_above = min.as_f64() + 0.001;

    vec![
        TestCase::invalid(
            format!("exclusiveMinimum_exact_{}", min),
            min.json(),
            format!("Value at exclusive minimum ({})", min),
        ),
        TestCase::valid(
            format!("exclusiveMinimum_above_{}", min),
            json!(just_above),
            format!("Value just above exclusive minimum ({})", just_above),
        ),
    ]
}

pub(super) fn exclusive_maximum(value: &Value) -> Vec<TestCase> {
    let Some(max) = Num::from_value(value) else {
        return skipped("exclusiveMaximum", value);
    };
    let just_below = max.as_f64() - 0.001;

    vec![
        TestCase::invalid(
            format!("exclusiveMaximum_exact_{}", max),
            max.json(),
            format!("Value at exclusive maximum ({})", max),
        ),
        TestCase::valid(
            format!("exclusiveMaximum_below_{}", max),
            json!(just_below),
            format!("Value just below exclusive maximum ({})", just_below),
        ),
    ]
}

pub(super) fn min_items(value: &Value) -> Vec<TestCase> {
    let Some(min) = value.as_u64() else {
        return skipped("minItems", value);
    };
    let min = min as usize;

    let mut tests = vec![TestCase::valid(
        format!("minItems_exact_{}", min),
        repeated_items(min),
        format!("Array with exactly {} items", min),
    )];

    if min > 0 {
        tests.push(TestCase::invalid(
            format!("minItems_below_{}", min),
            repeated_items(min - 1),
            format!("Array with {} items", min - 1),
        ));
        tests.push(TestCase::invalid(
            "minItems_empty",
            json!([]),
            "Empty array",
        ));
    }

    tests
}

pub(super) fn max_items(value: &Value) -> Vec<TestCase> {
    let Some(max) = value.as_u64() else {
        return skipped("maxItems", value);
    };
    let max = max as usize;

    vec![
        TestCase::valid(
            format!("maxItems_exact_{}", max),
            repeated_items(max),
            format!("Array with exactly {} items", max),
        ),
        TestCase::invalid(
            format!("maxItems_above_{}", max),
            repeated_items(max + 1),
            format!("Array with {} items", max + 1),
        ),
        TestCase::valid("maxItems_empty", json!([]), "Empty array"),
    ]
}

pub(super) fn unique_items(value: &Value) -> Vec<TestCase> {
    match value.as_bool() {
        Some(true) => vec![
            TestCase::valid(
                "uniqueItems_unique",
                json!(["a", "b", "c"]),
                "Array with unique items",
            ),
            TestCase::invalid(
                "uniqueItems_duplicate",
                json!(["a", "b", "a"]),
                "Array with duplicate items",
            ),
        ],
        // uniqueItems: false constrains nothing
        Some(false) => Vec::new(),
        None => skipped("uniqueItems", value),
    }
}

pub(super) fn enum_members(value: &Value) -> Vec<TestCase> {
    let Some(members) = value.as_array() else {
        return skipped("enum", value);
    };

    let mut tests = Vec::new();

    for (i, member) in members.iter().take(3).enumerate() {
        tests.push(TestCase::valid(
            format!("enum_valid_{}", i),
            member.clone(),
            format!("Valid enum value: {}", member),
        ));
    }

    let sentinel = Value::String(INVALID_ENUM_SENTINEL.to_string());
    if !members.contains(&sentinel) {
        tests.push(TestCase::invalid(
            "enum_invalid",
            sentinel,
            format!("Invalid enum value: {}", INVALID_ENUM_SENTINEL),
        ));
    }

    tests
}

pub(super) fn type_examples(value: &Value) -> Vec<TestCase> {
    let Some(type_name) = value.as_str() else {
        return skipped("type", value);
    };

    let (valid, invalid): (Value, [Value; 2]) = match type_name {
        "string" => (json!("test_string"), [json!(123), json!(true)]),
        "integer" => (json!(42), [json!("not_int"), json!(3.14)]),
        "number" => (json!(3.14), [json!("not_number"), json!(true)]),
        "boolean" => (json!(true), [json!("not_bool"), json!(1)]),
        "array" => (json!(["item"]), [json!("not_array"), json!({})]),
        "object" => (json!({"key": "value"}), [json!("not_object"), json!([])]),
        other => {
            debug!(declared = other, "no counter-example table for type");
            return Vec::new();
        }
    };

    let mut tests = vec![TestCase::valid(
        format!("type_valid_{}", type_name),
        valid,
        format!("Valid {} value", type_name),
    )];

    for (i, counter_example) in invalid.into_iter().enumerate() {
        tests.push(TestCase::invalid(
            format!("type_invalid_{}_{}", type_name, i),
            counter_example,
            format!("Invalid type (expected {})", type_name),
        ));
    }

    tests
}

pub(super) fn required_fields(value: &Value) -> Vec<TestCase> {
    let Some(fields) = value.as_array() else {
        return skipped("required", value);
    };

    fields
        .iter()
        .filter_map(Value::as_str)
        .map(|field| {
            TestCase::invalid(
                format!("required_missing_{}", field),
                json!({ OMIT_FIELD_MARKER: field }),
                format!("Missing required field: {}", field),
            )
        })
        .collect()
}
