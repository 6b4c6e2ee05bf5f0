//! OpenAPI document loading and constraint extraction
//!
//! Loads spec documents (JSON or YAML by extension) into
//! `serde_json::Value`, extracts per-schema constraint declarations for
//! the closed keyword set in [`ConstraintKind`], resolves local `$ref`s,
//! and provides the structural validation seam the reconciler re-checks
//! patched documents against.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{DriftError, Result};
use crate::validator::ConstraintKind;

/// Recursion cap for `$ref` resolution; cycles give up rather than spin.
const MAX_REF_DEPTH: usize = 32;

/// A declared constraint attached to a schema node.
///
/// `property: None` means the constraint sits on the schema itself
/// (`required`, a top-level `type`, ...); `Some(name)` scopes it to
/// `properties.<name>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDeclaration {
    pub kind: ConstraintKind,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

/// A named schema with its extracted constraint declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    /// Location within the document, e.g. `#/components/schemas/User`.
    pub path: String,
    pub schema: Value,
    pub declarations: Vec<ConstraintDeclaration>,
}

impl SchemaInfo {
    /// Schema-level constraint value by keyword, if declared.
    pub fn constraint(&self, kind: ConstraintKind) -> Option<&Value> {
        self.declarations
            .iter()
            .find(|d| d.kind == kind && d.property.is_none())
            .map(|d| &d.value)
    }
}

/// An operation extracted from the `paths` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub path: String,
    /// Uppercase HTTP method.
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_schema: Option<SchemaInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub response_schemas: BTreeMap<String, SchemaInfo>,
}

/// Structural validation seam.
///
/// The shipped [`StructuralValidator`] covers the checks reconciliation
/// depends on; callers with a stricter external validator substitute it
/// here.
pub trait SpecValidator: Send + Sync {
    /// Structural findings for a document; empty means valid.
    fn validate(&self, doc: &Value) -> Vec<String>;
}

/// Built-in OpenAPI 3.x structural checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl StructuralValidator {
    fn well_typed(kind: ConstraintKind, value: &Value) -> bool {
        match kind {
            ConstraintKind::MinLength
            | ConstraintKind::MaxLength
            | ConstraintKind::MinItems
            | ConstraintKind::MaxItems => value.as_u64().is_some(),
            ConstraintKind::Minimum
            | ConstraintKind::Maximum
            | ConstraintKind::ExclusiveMinimum
            | ConstraintKind::ExclusiveMaximum => value.is_number(),
            ConstraintKind::Pattern => value.is_string(),
            ConstraintKind::UniqueItems => value.is_boolean(),
            ConstraintKind::Enum => value.is_array(),
            ConstraintKind::Required => value
                .as_array()
                .is_some_and(|fields| fields.iter().all(Value::is_string)),
            ConstraintKind::Type => value.as_str().is_some_and(|t| {
                matches!(
                    t,
                    "string" | "integer" | "number" | "boolean" | "array" | "object" | "null"
                )
            }),
        }
    }

    fn check_constraints(location: &str, node: &Map<String, Value>, errors: &mut Vec<String>) {
        for kind in ConstraintKind::ALL {
            if let Some(value) = node.get(kind.as_str()) {
                if !Self::well_typed(kind, value) {
                    errors.push(format!("{}: invalid value for {}", location, kind));
                }
            }
        }
    }

    fn check_schema(location: &str, schema: &Value, errors: &mut Vec<String>) {
        let Some(node) = schema.as_object() else {
            errors.push(format!("{}: schema must be an object", location));
            return;
        };

        Self::check_constraints(location, node, errors);

        if let Some(properties) = node.get("properties") {
            match properties.as_object() {
                Some(properties) => {
                    for (name, prop_schema) in properties {
                        Self::check_schema(
                            &format!("{}/properties/{}", location, name),
                            prop_schema,
                            errors,
                        );
                    }
                }
                None => errors.push(format!("{}: properties must be an object", location)),
            }
        }
    }
}

impl SpecValidator for StructuralValidator {
    fn validate(&self, doc: &Value) -> Vec<String> {
        let mut errors = Vec::new();

        let Some(root) = doc.as_object() else {
            return vec!["document root must be an object".to_string()];
        };

        match root.get("openapi").and_then(Value::as_str) {
            Some(version) if version.starts_with("3.") => {}
            Some(version) => errors.push(format!("unsupported openapi version: {}", version)),
            None => errors.push("missing openapi version field".to_string()),
        }

        match root.get("info").and_then(Value::as_object) {
            Some(info) => {
                if !info.get("title").is_some_and(Value::is_string) {
                    errors.push("info.title must be a string".to_string());
                }
                if !info.get("version").is_some_and(Value::is_string) {
                    errors.push("info.version must be a string".to_string());
                }
            }
            None => errors.push("missing info object".to_string()),
        }

        match root.get("paths") {
            Some(Value::Object(paths)) => {
                for key in paths.keys() {
                    if !key.starts_with('/') {
                        errors.push(format!("path does not start with '/': {}", key));
                    }
                }
            }
            Some(_) => errors.push("paths must be an object".to_string()),
            None => errors.push("missing paths object".to_string()),
        }

        if let Some(schemas) = root
            .get("components")
            .and_then(|c| c.get("schemas"))
        {
            match schemas.as_object() {
                Some(schemas) => {
                    for (name, schema) in schemas {
                        Self::check_schema(
                            &format!("components/schemas/{}", name),
                            schema,
                            &mut errors,
                        );
                    }
                }
                None => errors.push("components.schemas must be an object".to_string()),
            }
        }

        errors
    }
}

/// Loads and caches OpenAPI documents from a spec directory.
#[derive(Debug, Clone)]
pub struct SpecLoader {
    spec_dir: PathBuf,
    cache: HashMap<String, Value>,
}

impl SpecLoader {
    pub fn new(spec_dir: impl Into<PathBuf>) -> Self {
        Self {
            spec_dir: spec_dir.into(),
            cache: HashMap::new(),
        }
    }

    pub fn spec_dir(&self) -> &Path {
        &self.spec_dir
    }

    /// Load one document, memoized per filename.
    pub fn load(&mut self, filename: &str) -> Result<Value> {
        if let Some(doc) = self.cache.get(filename) {
            return Ok(doc.clone());
        }

        let path = self.spec_dir.join(filename);
        if !path.exists() {
            return Err(DriftError::file_error(format!(
                "spec file not found: {}",
                path.display()
            )));
        }

        let text = std::fs::read_to_string(&path)?;
        let doc = parse_document(filename, &text)?;
        self.cache.insert(filename.to_string(), doc.clone());
        Ok(doc)
    }

    /// Load every spec file in the directory, skipping unparseable ones.
    pub fn load_all(&mut self) -> Result<BTreeMap<String, Value>> {
        let mut docs = BTreeMap::new();
        for filename in list_spec_files(&self.spec_dir)? {
            match self.load(&filename) {
                Ok(doc) => {
                    debug!(file = %filename, "loaded spec");
                    docs.insert(filename, doc);
                }
                Err(error) => warn!(file = %filename, %error, "failed to load spec"),
            }
        }
        Ok(docs)
    }

    /// Extract all named schemas from `components/schemas`.
    pub fn extract_schemas(&self, doc: &Value) -> BTreeMap<String, SchemaInfo> {
        let mut schemas = BTreeMap::new();

        if let Some(defs) = doc
            .pointer("/components/schemas")
            .and_then(Value::as_object)
        {
            for (name, schema) in defs {
                schemas.insert(
                    name.clone(),
                    parse_schema(name, &format!("#/components/schemas/{}", name), schema),
                );
            }
        }

        schemas
    }

    /// Extract operations with their request/response schemas.
    pub fn extract_endpoints(&self, doc: &Value) -> Vec<EndpointInfo> {
        let mut endpoints = Vec::new();

        let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
            return endpoints;
        };

        for (path, path_item) in paths {
            for method in ["get", "post", "put", "patch", "delete"] {
                let Some(operation) = path_item.get(method) else {
                    continue;
                };

                let request_schema = operation
                    .pointer("/requestBody/content/application~1json/schema")
                    .map(|schema| {
                        parse_schema(
                            &format!("{}_{}_request", method, path),
                            &format!("{}/{}/requestBody", path, method),
                            schema,
                        )
                    });

                let mut response_schemas = BTreeMap::new();
                if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
                    for (status, response) in responses {
                        if let Some(schema) =
                            response.pointer("/content/application~1json/schema")
                        {
                            response_schemas.insert(
                                status.clone(),
                                parse_schema(
                                    &format!("{}_{}_response_{}", method, path, status),
                                    &format!("{}/{}/responses/{}", path, method, status),
                                    schema,
                                ),
                            );
                        }
                    }
                }

                endpoints.push(EndpointInfo {
                    path: path.clone(),
                    method: method.to_uppercase(),
                    operation_id: operation
                        .get("operationId")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    request_schema,
                    response_schemas,
                });
            }
        }

        endpoints
    }

    /// Resolve a local `#/` reference to its target node.
    pub fn find_schema_by_ref<'a>(&self, doc: &'a Value, reference: &str) -> Option<&'a Value> {
        let rest = reference.strip_prefix("#/")?;
        let mut current = doc;
        for part in rest.split('/') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Recursively inline local `$ref`s, depth-capped for cycle safety.
    pub fn resolve_refs(&self, doc: &Value, schema: &Value) -> Value {
        self.resolve_refs_inner(doc, schema, 0)
    }

    fn resolve_refs_inner(&self, doc: &Value, schema: &Value, depth: usize) -> Value {
        if depth >= MAX_REF_DEPTH {
            debug!("ref resolution depth cap reached, leaving node as-is");
            return schema.clone();
        }

        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            if let Some(target) = self.find_schema_by_ref(doc, reference) {
                return self.resolve_refs_inner(doc, target, depth + 1);
            }
            return schema.clone();
        }

        match schema {
            Value::Object(map) => {
                let resolved = map
                    .iter()
                    .map(|(k, v)| (k.clone(), self.resolve_refs_inner(doc, v, depth + 1)))
                    .collect();
                Value::Object(resolved)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_refs_inner(doc, item, depth + 1))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

fn parse_schema(name: &str, path: &str, schema: &Value) -> SchemaInfo {
    let mut declarations = Vec::new();

    if let Some(node) = schema.as_object() {
        for kind in ConstraintKind::ALL {
            if let Some(value) = node.get(kind.as_str()) {
                declarations.push(ConstraintDeclaration {
                    kind,
                    value: value.clone(),
                    property: None,
                });
            }
        }

        if let Some(properties) = node.get("properties").and_then(Value::as_object) {
            for (prop_name, prop_schema) in properties {
                let Some(prop_node) = prop_schema.as_object() else {
                    continue;
                };
                for kind in ConstraintKind::ALL {
                    if let Some(value) = prop_node.get(kind.as_str()) {
                        declarations.push(ConstraintDeclaration {
                            kind,
                            value: value.clone(),
                            property: Some(prop_name.clone()),
                        });
                    }
                }
            }
        }
    }

    SchemaInfo {
        name: name.to_string(),
        path: path.to_string(),
        schema: schema.clone(),
        declarations,
    }
}

/// Parse a spec document by filename extension (YAML or JSON).
pub fn parse_document(filename: &str, text: &str) -> Result<Value> {
    if filename.ends_with(".yaml") || filename.ends_with(".yml") {
        Ok(serde_yaml::from_str(text)?)
    } else {
        Ok(serde_json::from_str(text)?)
    }
}

/// Serialize a document in the format its path's extension implies.
pub fn save_document(path: &Path, doc: &Value) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let text = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::to_string(doc)?,
        _ => {
            let mut json = serde_json::to_string_pretty(doc)?;
            json.push('\n');
            json
        }
    };

    std::fs::write(path, text)?;
    Ok(())
}

/// Spec filenames in a directory: `*.json` first, then `*.yaml`/`*.yml`,
/// each group sorted for deterministic processing order.
pub fn list_spec_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(DriftError::file_error(format!(
            "spec directory not found: {}",
            dir.display()
        )));
    }

    let mut json_files = Vec::new();
    let mut yaml_files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.ends_with(".json") {
            json_files.push(name);
        } else if name.ends_with(".yaml") || name.ends_with(".yml") {
            yaml_files.push(name);
        }
    }

    json_files.sort();
    yaml_files.sort();
    json_files.extend(yaml_files);
    Ok(json_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_doc() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": { "title": "Test API", "version": "1.0.0" },
            "paths": {
                "/api/v1/users": {
                    "post": {
                        "operationId": "createUser",
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/User" }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": {
                                        "schema": { "type": "object" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": {
                                "type": "string",
                                "minLength": 1,
                                "maxLength": 64,
                                "pattern": "^[a-z][a-z0-9-]*$"
                            },
                            "age": { "type": "integer", "minimum": 0, "multipleOf": 1 }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_extract_schemas_collects_declarations() {
        let loader = SpecLoader::new("specs");
        let schemas = loader.extract_schemas(&sample_doc());
        let user = &schemas["User"];

        assert_eq!(user.path, "#/components/schemas/User");
        assert_eq!(user.constraint(ConstraintKind::Type), Some(&json!("object")));
        assert_eq!(
            user.constraint(ConstraintKind::Required),
            Some(&json!(["name"]))
        );

        let name_decls: Vec<_> = user
            .declarations
            .iter()
            .filter(|d| d.property.as_deref() == Some("name"))
            .collect();
        assert_eq!(name_decls.len(), 4);
        assert!(name_decls
            .iter()
            .any(|d| d.kind == ConstraintKind::MinLength && d.value == json!(1)));
    }

    #[test]
    fn test_extract_schemas_ignores_unsupported_keywords() {
        let loader = SpecLoader::new("specs");
        let schemas = loader.extract_schemas(&sample_doc());
        // multipleOf is outside the closed keyword set
        assert!(schemas["User"]
            .declarations
            .iter()
            .all(|d| d.kind.as_str() != "multipleOf"));
    }

    #[test]
    fn test_extract_endpoints() {
        let loader = SpecLoader::new("specs");
        let endpoints = loader.extract_endpoints(&sample_doc());
        assert_eq!(endpoints.len(), 1);

        let endpoint = &endpoints[0];
        assert_eq!(endpoint.method, "POST");
        assert_eq!(endpoint.path, "/api/v1/users");
        assert_eq!(endpoint.operation_id.as_deref(), Some("createUser"));
        assert!(endpoint.request_schema.is_some());
        assert!(endpoint.response_schemas.contains_key("200"));
    }

    #[test]
    fn test_find_schema_by_ref() {
        let loader = SpecLoader::new("specs");
        let doc = sample_doc();
        let user = loader
            .find_schema_by_ref(&doc, "#/components/schemas/User")
            .unwrap();
        assert_eq!(user.pointer("/properties/name/minLength"), Some(&json!(1)));

        assert!(loader
            .find_schema_by_ref(&doc, "#/components/schemas/Missing")
            .is_none());
        assert!(loader.find_schema_by_ref(&doc, "external.yaml#/X").is_none());
    }

    #[test]
    fn test_resolve_refs_inlines_target() {
        let loader = SpecLoader::new("specs");
        let doc = sample_doc();
        let schema = json!({ "$ref": "#/components/schemas/User" });

        let resolved = loader.resolve_refs(&doc, &schema);
        assert_eq!(resolved.pointer("/required"), Some(&json!(["name"])));
    }

    #[test]
    fn test_resolve_refs_terminates_on_cycles() {
        let loader = SpecLoader::new("specs");
        let doc = json!({
            "components": {
                "schemas": {
                    "A": { "$ref": "#/components/schemas/B" },
                    "B": { "$ref": "#/components/schemas/A" }
                }
            }
        });
        let schema = json!({ "$ref": "#/components/schemas/A" });

        // Must not recurse forever; the depth cap leaves a ref in place.
        let resolved = loader.resolve_refs(&doc, &schema);
        assert!(resolved.get("$ref").is_some());
    }

    #[test]
    fn test_load_by_extension_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"openapi": "3.0.0", "paths": {}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("b.yaml"), "openapi: '3.0.0'\npaths: {}\n").unwrap();

        let mut loader = SpecLoader::new(dir.path());
        let a = loader.load("a.json").unwrap();
        assert_eq!(a["openapi"], json!("3.0.0"));
        let b = loader.load("b.yaml").unwrap();
        assert_eq!(b["openapi"], json!("3.0.0"));

        assert!(matches!(
            loader.load("missing.json"),
            Err(DriftError::FileError(_))
        ));
    }

    #[test]
    fn test_list_spec_files_orders_json_before_yaml() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "c.yaml", "notes.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        let files = list_spec_files(dir.path()).unwrap();
        assert_eq!(files, vec!["a.json", "b.json", "c.yaml"]);
    }

    #[test]
    fn test_save_document_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let doc = sample_doc();

        let json_path = dir.path().join("out.json");
        save_document(&json_path, &doc).unwrap();
        let text = std::fs::read_to_string(&json_path).unwrap();
        assert_eq!(parse_document("out.json", &text).unwrap(), doc);

        let yaml_path = dir.path().join("out.yaml");
        save_document(&yaml_path, &doc).unwrap();
        let text = std::fs::read_to_string(&yaml_path).unwrap();
        assert_eq!(parse_document("out.yaml", &text).unwrap(), doc);
    }

    #[test]
    fn test_structural_validator_accepts_minimal_doc() {
        let errors = StructuralValidator.validate(&sample_doc());
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_structural_validator_reports_missing_sections() {
        let errors = StructuralValidator.validate(&json!({ "info": {} }));
        assert!(errors.iter().any(|e| e.contains("openapi version")));
        assert!(errors.iter().any(|e| e.contains("info.title")));
        assert!(errors.iter().any(|e| e.contains("paths")));
    }

    #[test]
    fn test_structural_validator_flags_ill_typed_constraints() {
        let mut doc = sample_doc();
        *doc.pointer_mut("/components/schemas/User/properties/name/minLength")
            .unwrap() = json!("five");

        let errors = StructuralValidator.validate(&doc);
        assert!(errors
            .iter()
            .any(|e| e.contains("properties/name") && e.contains("minLength")));
    }

    #[test]
    fn test_structural_validator_flags_bad_path_keys() {
        let doc = json!({
            "openapi": "3.1.0",
            "info": { "title": "t", "version": "1" },
            "paths": { "users": {} }
        });
        let errors = StructuralValidator.validate(&doc);
        assert!(errors.iter().any(|e| e.contains("does not start with '/'")));
    }
}
