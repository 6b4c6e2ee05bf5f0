//! Markdown changelog rendering for reconciliation runs.

use chrono::Utc;
use serde_json::Value;

use super::{ChangeEntry, FixAction, ReconciliationResult};

pub(super) fn render(results: &[ReconciliationResult]) -> String {
    let mut lines = vec![
        "# Specification Changes".to_string(),
        String::new(),
        format!("Generated: {}", Utc::now().to_rfc3339()),
        String::new(),
    ];

    let modified: Vec<_> = results.iter().filter(|r| r.modified).collect();

    if modified.is_empty() {
        lines.push("*No modifications were required.*".to_string());
        return lines.join("\n");
    }

    for result in modified {
        lines.push(format!("## {}", result.filename));
        lines.push(String::new());
        for change in &result.changes {
            lines.push(render_change(change));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn render_change(change: &ChangeEntry) -> String {
    let old = display_value(change.old_value.as_ref());
    let new = display_value(change.new_value.as_ref());

    match change.action {
        FixAction::Relax => format!(
            "- **Relaxed** `{}` on `{}`: `{}` → `{}`",
            change.constraint, change.property, old, new
        ),
        FixAction::Tighten => format!(
            "- **Tightened** `{}` on `{}`: `{}` → `{}`",
            change.constraint, change.property, old, new
        ),
        FixAction::Add => format!(
            "- **Added** `{}` to `{}`: `{}`",
            change.constraint, change.property, new
        ),
        FixAction::Remove => format!(
            "- **Removed** `{}` from `{}` (was `{}`)",
            change.constraint, change.property, old
        ),
    }
}

// Strings render bare; everything else as compact JSON.
fn display_value(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(action: FixAction, old: Option<Value>, new: Option<Value>) -> ChangeEntry {
        ChangeEntry {
            action,
            path: "user.json:User/name/maxLength".to_string(),
            property: "User/name".to_string(),
            constraint: "maxLength".to_string(),
            old_value: old,
            new_value: new,
        }
    }

    fn result_with(changes: Vec<ChangeEntry>) -> ReconciliationResult {
        ReconciliationResult {
            filename: "user.json".to_string(),
            modified: true,
            changes,
            fixed_spec: None,
            validation_errors: Vec::new(),
        }
    }

    #[test]
    fn test_render_without_modifications() {
        let text = render(&[]);
        assert!(text.starts_with("# Specification Changes"));
        assert!(text.contains("Generated: "));
        assert!(text.ends_with("*No modifications were required.*"));
    }

    #[test]
    fn test_render_bullet_wording() {
        assert_eq!(
            render_change(&entry(FixAction::Relax, Some(json!(50)), Some(json!(80)))),
            "- **Relaxed** `maxLength` on `User/name`: `50` → `80`"
        );
        assert_eq!(
            render_change(&entry(FixAction::Tighten, Some(json!(100)), Some(json!(64)))),
            "- **Tightened** `maxLength` on `User/name`: `100` → `64`"
        );
        assert_eq!(
            render_change(&entry(FixAction::Add, None, Some(json!("^[a-z]+$")))),
            "- **Added** `maxLength` to `User/name`: `^[a-z]+$`"
        );
        assert_eq!(
            render_change(&entry(FixAction::Remove, Some(json!(["a", "b"])), None)),
            "- **Removed** `maxLength` from `User/name` (was `[\"a\",\"b\"]`)"
        );
    }

    #[test]
    fn test_render_groups_by_file() {
        let text = render(&[result_with(vec![entry(
            FixAction::Relax,
            Some(json!(50)),
            Some(json!(80)),
        )])]);

        assert!(text.contains("## user.json"));
        assert!(text.contains("- **Relaxed** `maxLength`"));
    }
}
