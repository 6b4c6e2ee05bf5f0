//! Patch computation for individual discrepancies.
//!
//! Each fix resolves the target schema node, computes a corrected
//! constraint value from the old value and the observed API behavior,
//! and mutates the (cloned) document in place. Unresolvable nodes and
//! unusable observed values skip the fix; the transaction in `mod.rs`
//! decides whether the file as a whole commits.

use serde_json::{json, Map, Value};
use tracing::debug;

use super::{ChangeEntry, FixAction};
use crate::validator::Discrepancy;

pub(super) fn relax_constraint(spec: &mut Value, discrepancy: &Discrepancy) -> Option<ChangeEntry> {
    let schema = locate_schema(spec, discrepancy)?;
    let constraint = discrepancy.constraint_type.as_str();
    let old_value = schema.get(constraint).cloned();

    let Some(new_value) = relaxed_value(constraint, old_value.as_ref(), &discrepancy.api_behavior)
    else {
        debug!(
            constraint,
            property = %discrepancy.property_name,
            "unusable observed value, skipping relax"
        );
        return None;
    };

    if old_value.as_ref() == Some(&new_value) {
        return None;
    }

    schema.insert(constraint.to_string(), new_value.clone());
    Some(ChangeEntry {
        action: FixAction::Relax,
        path: discrepancy.path.clone(),
        property: discrepancy.property_name.clone(),
        constraint: constraint.to_string(),
        old_value,
        new_value: Some(new_value),
    })
}

pub(super) fn tighten_constraint(
    spec: &mut Value,
    discrepancy: &Discrepancy,
) -> Option<ChangeEntry> {
    let schema = locate_schema(spec, discrepancy)?;
    let constraint = discrepancy.constraint_type.as_str();
    let old_value = schema.get(constraint).cloned();

    let Some(new_value) = tightened_value(constraint, old_value.as_ref(), &discrepancy.api_behavior)
    else {
        debug!(
            constraint,
            property = %discrepancy.property_name,
            "unusable observed value, skipping tighten"
        );
        return None;
    };

    if old_value.as_ref() == Some(&new_value) {
        return None;
    }

    schema.insert(constraint.to_string(), new_value.clone());
    Some(ChangeEntry {
        action: FixAction::Tighten,
        path: discrepancy.path.clone(),
        property: discrepancy.property_name.clone(),
        constraint: constraint.to_string(),
        old_value,
        new_value: Some(new_value),
    })
}

pub(super) fn add_constraint(spec: &mut Value, discrepancy: &Discrepancy) -> Option<ChangeEntry> {
    let schema = locate_schema(spec, discrepancy)?;
    let constraint = discrepancy.constraint_type.as_str();

    if schema.contains_key(constraint) {
        return None;
    }

    let new_value = discrepancy.api_behavior.clone();
    schema.insert(constraint.to_string(), new_value.clone());
    Some(ChangeEntry {
        action: FixAction::Add,
        path: discrepancy.path.clone(),
        property: discrepancy.property_name.clone(),
        constraint: constraint.to_string(),
        old_value: None,
        new_value: Some(new_value),
    })
}

pub(super) fn remove_constraint(
    spec: &mut Value,
    discrepancy: &Discrepancy,
) -> Option<ChangeEntry> {
    let schema = locate_schema(spec, discrepancy)?;
    let constraint = discrepancy.constraint_type.as_str();

    let old_value = schema.remove(constraint)?;
    Some(ChangeEntry {
        action: FixAction::Remove,
        path: discrepancy.path.clone(),
        property: discrepancy.property_name.clone(),
        constraint: constraint.to_string(),
        old_value: Some(old_value),
        new_value: None,
    })
}

fn locate_schema<'a>(
    spec: &'a mut Value,
    discrepancy: &Discrepancy,
) -> Option<&'a mut Map<String, Value>> {
    match find_schema_mut(spec, &discrepancy.property_name) {
        Some(schema) => Some(schema),
        None => {
            debug!(
                property = %discrepancy.property_name,
                "schema node not found, skipping fix"
            );
            None
        }
    }
}

/// Resolve a property path to the mutable schema node it names.
///
/// An exact `components/schemas` name wins; otherwise the path is walked
/// segment by segment, preferring a same-named child over a
/// `properties.<segment>` child at each step.
fn find_schema_mut<'a>(doc: &'a mut Value, property_path: &str) -> Option<&'a mut Map<String, Value>> {
    let pointer = resolve_pointer(doc, property_path)?;
    doc.pointer_mut(&pointer)?.as_object_mut()
}

fn resolve_pointer(doc: &Value, property_path: &str) -> Option<String> {
    let schemas = doc.pointer("/components/schemas")?;

    if schemas.get(property_path).is_some() {
        return Some(format!("/components/schemas/{}", escape(property_path)));
    }

    let mut pointer = String::from("/components/schemas");
    let mut current = schemas;

    for segment in property_path.split('/') {
        if let Some(child) = current.get(segment) {
            pointer.push('/');
            pointer.push_str(&escape(segment));
            current = child;
        } else if let Some(child) = current.get("properties").and_then(|p| p.get(segment)) {
            pointer.push_str("/properties/");
            pointer.push_str(&escape(segment));
            current = child;
        } else {
            return None;
        }
    }

    current.is_object().then_some(pointer)
}

// JSON pointer escaping per RFC 6901.
fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn relaxed_value(constraint: &str, old: Option<&Value>, observed: &Value) -> Option<Value> {
    match constraint {
        "minLength" | "minimum" => relax_lower_bound(old, observed),
        "maxLength" | "maximum" => relax_upper_bound(old, observed),
        "enum" => enum_union(old, observed),
        _ => Some(observed.clone()),
    }
}

fn tightened_value(constraint: &str, old: Option<&Value>, observed: &Value) -> Option<Value> {
    match constraint {
        "minLength" | "minimum" => tighten_lower_bound(old, observed),
        "maxLength" | "maximum" => tighten_upper_bound(old, observed),
        "enum" => observed.as_array().map(|_| observed.clone()),
        _ => Some(observed.clone()),
    }
}

/// min(old, observed); a missing old bound counts as 0.
///
/// The winning side's `Value` is cloned as-is so integer bounds stay
/// integers.
fn relax_lower_bound(old: Option<&Value>, observed: &Value) -> Option<Value> {
    let observed_num = observed.as_f64()?;
    match old {
        Some(old_value) => {
            let old_num = old_value.as_f64()?;
            Some(if observed_num < old_num {
                observed.clone()
            } else {
                old_value.clone()
            })
        }
        None => Some(if observed_num < 0.0 {
            observed.clone()
        } else {
            json!(0)
        }),
    }
}

/// max(old, observed); a missing old bound counts as 0.
fn relax_upper_bound(old: Option<&Value>, observed: &Value) -> Option<Value> {
    let observed_num = observed.as_f64()?;
    match old {
        Some(old_value) => {
            let old_num = old_value.as_f64()?;
            Some(if observed_num > old_num {
                observed.clone()
            } else {
                old_value.clone()
            })
        }
        None => Some(if observed_num > 0.0 {
            observed.clone()
        } else {
            json!(0)
        }),
    }
}

/// max(old, observed); a missing old bound loses to any observation.
fn tighten_lower_bound(old: Option<&Value>, observed: &Value) -> Option<Value> {
    let observed_num = observed.as_f64()?;
    match old {
        Some(old_value) => {
            let old_num = old_value.as_f64()?;
            Some(if observed_num > old_num {
                observed.clone()
            } else {
                old_value.clone()
            })
        }
        None => Some(observed.clone()),
    }
}

/// min(old, observed); a missing old bound loses to any observation.
fn tighten_upper_bound(old: Option<&Value>, observed: &Value) -> Option<Value> {
    let observed_num = observed.as_f64()?;
    match old {
        Some(old_value) => {
            let old_num = old_value.as_f64()?;
            Some(if observed_num < old_num {
                observed.clone()
            } else {
                old_value.clone()
            })
        }
        None => Some(observed.clone()),
    }
}

/// Declared members in declared order, then observed members the
/// declaration was missing, in observed order.
fn enum_union(old: Option<&Value>, observed: &Value) -> Option<Value> {
    let observed_members = observed.as_array()?;

    let Some(declared) = old.and_then(Value::as_array) else {
        return Some(observed.clone());
    };

    let mut union = declared.clone();
    for member in observed_members {
        if !union.contains(member) {
            union.push(member.clone());
        }
    }
    Some(Value::Array(union))
}
