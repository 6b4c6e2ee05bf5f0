//! Validation pipeline orchestration
//!
//! Drives a full probe run: load the spec directory, surface structural
//! findings, extract constraint declarations, synthesize boundary test
//! cases, and (outside dry-run) send each case to its configured endpoint
//! and classify the outcome. The product is a [`RunOutcome`] the CLI and
//! report generator both consume.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::client::{ProbeClient, ProbeOutcome};
use crate::config::{DriftConfig, EndpointTarget};
use crate::error::Result;
use crate::loader::{ConstraintDeclaration, SpecLoader, SpecValidator, StructuralValidator};
use crate::validator::{ConstraintValidator, Discrepancy, TestCase};

/// Per-endpoint probe tallies.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointRunResult {
    pub endpoint: String,
    pub resource: String,
    pub cases: usize,
    /// Probes whose outcome agreed with the declared expectation.
    pub passed: usize,
    /// Probes that produced a discrepancy.
    pub failed: usize,
    /// Probes with no validation signal (unexpected statuses).
    pub indeterminate: usize,
    /// Probes that failed at the transport level.
    pub errors: usize,
}

impl EndpointRunResult {
    /// Collapsed per-endpoint status for report rows: any discrepancy
    /// wins over transport errors, which win over a clean pass.
    pub fn status(&self) -> &'static str {
        if self.failed > 0 {
            "failed"
        } else if self.errors > 0 {
            "error"
        } else {
            "passed"
        }
    }
}

/// Everything a probe run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    pub spec_files: Vec<String>,
    /// Structural findings per file; empty map means every file parsed
    /// clean.
    pub structural_findings: BTreeMap<String, Vec<String>>,
    pub total_schemas: usize,
    pub total_constraints: usize,
    pub total_cases: usize,
    pub probes_sent: usize,
    pub endpoint_results: Vec<EndpointRunResult>,
    pub discrepancies: Vec<Discrepancy>,
}

/// Orchestrates validation of a spec directory against the live API.
pub struct ProbeRunner {
    config: DriftConfig,
    loader: SpecLoader,
    validator: ConstraintValidator,
    /// `None` in dry-run mode; no network traffic is generated.
    client: Option<ProbeClient>,
}

impl ProbeRunner {
    pub fn new(config: DriftConfig, client: Option<ProbeClient>) -> Self {
        let loader = SpecLoader::new(&config.specs.original_dir);
        Self {
            config,
            loader,
            validator: ConstraintValidator,
            client,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.client.is_none()
    }

    /// Run the pipeline. `endpoint_filter` is a substring match against
    /// endpoint names and resources.
    pub async fn run(&mut self, endpoint_filter: Option<&str>) -> Result<RunOutcome> {
        let mut outcome = RunOutcome::default();

        let specs = self.loader.load_all()?;
        outcome.spec_files = specs.keys().cloned().collect();
        info!(files = specs.len(), "loaded spec directory");

        for (filename, doc) in &specs {
            let findings = StructuralValidator.validate(doc);
            if !findings.is_empty() {
                warn!(file = %filename, findings = findings.len(), "structural findings");
                outcome.structural_findings.insert(filename.clone(), findings);
            }
        }

        for doc in specs.values() {
            let schemas = self.loader.extract_schemas(doc);
            outcome.total_schemas += schemas.len();
            outcome.total_constraints += schemas
                .values()
                .map(|s| s.declarations.len())
                .sum::<usize>();
        }
        info!(
            schemas = outcome.total_schemas,
            constraints = outcome.total_constraints,
            "extracted constraint declarations"
        );

        let targets: Vec<(String, EndpointTarget)> = self
            .config
            .endpoints
            .iter()
            .filter(|(name, target)| matches_filter(endpoint_filter, name, &target.resource))
            .map(|(name, target)| (name.clone(), target.clone()))
            .collect();

        for (name, target) in targets {
            let Some(doc) = specs.get(&target.domain_file) else {
                warn!(endpoint = %name, file = %target.domain_file, "domain file not loaded, skipping");
                continue;
            };

            let schemas = self.loader.extract_schemas(doc);
            let Some(schema) = schemas.get(&target.schema) else {
                warn!(endpoint = %name, schema = %target.schema, "schema not found, skipping");
                continue;
            };

            let cases: Vec<(ConstraintDeclaration, TestCase)> = schema
                .declarations
                .iter()
                .flat_map(|declaration| {
                    self.validator
                        .generate_test_cases(declaration.kind, &declaration.value)
                        .into_iter()
                        .map(move |case| (declaration.clone(), case))
                })
                .collect();

            outcome.total_cases += cases.len();
            debug!(endpoint = %name, cases = cases.len(), "generated boundary cases");

            if let Some(client) = &self.client {
                let result = probe_endpoint(
                    client,
                    &self.validator,
                    &name,
                    &target,
                    &cases,
                    &mut outcome.discrepancies,
                )
                .await;
                outcome.probes_sent += result.cases - result.errors;
                outcome.endpoint_results.push(result);
            }
        }

        if self.is_dry_run() {
            info!(cases = outcome.total_cases, "dry run, skipping live probes");
        } else {
            info!(
                probes = outcome.probes_sent,
                discrepancies = outcome.discrepancies.len(),
                "probe run complete"
            );
        }

        Ok(outcome)
    }
}

fn matches_filter(filter: Option<&str>, name: &str, resource: &str) -> bool {
    match filter {
        Some(needle) => name.contains(needle) || resource.contains(needle),
        None => true,
    }
}

async fn probe_endpoint(
    client: &ProbeClient,
    validator: &ConstraintValidator,
    name: &str,
    target: &EndpointTarget,
    cases: &[(ConstraintDeclaration, TestCase)],
    discrepancies: &mut Vec<Discrepancy>,
) -> EndpointRunResult {
    let mut result = EndpointRunResult {
        endpoint: name.to_string(),
        resource: target.resource.clone(),
        cases: cases.len(),
        passed: 0,
        failed: 0,
        indeterminate: 0,
        errors: 0,
    };

    for (declaration, case) in cases {
        let body = build_probe_body(target.payload_template.as_ref(), declaration, case);

        let outcome = match client.probe(&target.create_path, &body).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(endpoint = %name, case = %case.name, %error, "probe failed");
                result.errors += 1;
                continue;
            }
        };

        let Some(api_accepted) = outcome.accepted() else {
            if let ProbeOutcome::Indeterminate(status) = outcome {
                debug!(endpoint = %name, case = %case.name, status, "no validation signal");
            }
            result.indeterminate += 1;
            continue;
        };

        match validator.compare_results(case, api_accepted) {
            Some(discrepancy) => {
                result.failed += 1;
                let property_path = match &declaration.property {
                    Some(property) => format!("{}/{}", target.schema, property),
                    None => target.schema.clone(),
                };
                let recommendation = recommendation_for(case.constraint_token(), api_accepted);
                discrepancies.push(
                    discrepancy
                        .with_location(
                            format!("{}:{}", target.domain_file, property_path),
                            property_path.clone(),
                        )
                        .with_recommendation(recommendation),
                );
            }
            None => result.passed += 1,
        }
    }

    result
}

/// Assemble the request body for one boundary case.
///
/// Property-scoped constraints overlay the case value onto the payload
/// template; `required` omission cases delete the field instead; a
/// schema-level constraint's value is sent as the whole body.
fn build_probe_body(
    template: Option<&Value>,
    declaration: &ConstraintDeclaration,
    case: &TestCase,
) -> Value {
    let mut body = match template {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    if let Some(field) = case.omitted_field() {
        body.remove(field);
        return Value::Object(body);
    }

    match &declaration.property {
        Some(property) => {
            body.insert(property.clone(), case.value.clone());
            Value::Object(body)
        }
        None => case.value.clone(),
    }
}

fn recommendation_for(constraint: &str, api_accepted: bool) -> String {
    if api_accepted {
        format!(
            "Consider relaxing {} (the API accepts values the spec rejects)",
            constraint
        )
    } else {
        format!(
            "Consider tightening {} (the API rejects values the spec accepts)",
            constraint
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProbeClientConfig;
    use crate::config::{ApiConfig, SpecsConfig};
    use crate::limiter::{RateLimitConfig, RateLimiter};
    use crate::validator::{ConstraintKind, DiscrepancyType};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::method as method_matcher;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_user_spec(dir: &Path) {
        let doc = json!({
            "openapi": "3.0.0",
            "info": { "title": "Users", "version": "1.0.0" },
            "paths": { "/api/v1/users": {} },
            "components": {
                "schemas": {
                    "User": {
                        "properties": {
                            "name": { "minLength": 3 }
                        }
                    }
                }
            }
        });
        std::fs::write(
            dir.join("user.json"),
            serde_json::to_string_pretty(&doc).unwrap(),
        )
        .unwrap();
    }

    fn config_for(spec_dir: &Path) -> DriftConfig {
        let mut config = DriftConfig {
            specs: SpecsConfig {
                original_dir: spec_dir.to_path_buf(),
                output_dir: spec_dir.join("out"),
            },
            ..DriftConfig::default()
        };
        config.endpoints.insert(
            "users".to_string(),
            EndpointTarget {
                resource: "users".to_string(),
                domain_file: "user.json".to_string(),
                schema: "User".to_string(),
                create_path: "/api/v1/users".to_string(),
                payload_template: Some(json!({"name": "default"})),
            },
        );
        config
    }

    fn live_client(server: &MockServer) -> ProbeClient {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            min_request_interval: Duration::from_millis(0),
            initial_backoff: Duration::from_millis(10),
            ..RateLimitConfig::default()
        }));
        ProbeClient::new(
            ProbeClientConfig {
                base_url: server.uri(),
                token: "t".to_string(),
                timeout_ms: 5_000,
                max_retries: 2,
                path_params: BTreeMap::new(),
            },
            limiter,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_dry_run_generates_without_probing() {
        let dir = tempfile::tempdir().unwrap();
        write_user_spec(dir.path());

        let mut runner = ProbeRunner::new(config_for(dir.path()), None);
        let outcome = runner.run(None).await.unwrap();

        assert_eq!(outcome.spec_files, vec!["user.json"]);
        assert!(outcome.structural_findings.is_empty());
        assert_eq!(outcome.total_schemas, 1);
        assert_eq!(outcome.total_constraints, 1);
        // minLength 3: exact, below, empty, above
        assert_eq!(outcome.total_cases, 4);
        assert_eq!(outcome.probes_sent, 0);
        assert!(outcome.endpoint_results.is_empty());
        assert!(outcome.discrepancies.is_empty());
    }

    #[tokio::test]
    async fn test_accept_everything_api_yields_spec_stricter() {
        let dir = tempfile::tempdir().unwrap();
        write_user_spec(dir.path());

        let server = MockServer::start().await;
        Mock::given(method_matcher("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut config = config_for(dir.path());
        config.api = ApiConfig {
            base_url: server.uri(),
            ..ApiConfig::default()
        };
        let client = live_client(&server);

        let mut runner = ProbeRunner::new(config, Some(client));
        let outcome = runner.run(None).await.unwrap();

        assert_eq!(outcome.probes_sent, 4);
        let result = &outcome.endpoint_results[0];
        // exact and above agree; below and empty are accepted against
        // expectation.
        assert_eq!(result.passed, 2);
        assert_eq!(result.failed, 2);
        assert_eq!(result.errors, 0);

        assert_eq!(outcome.discrepancies.len(), 2);
        for discrepancy in &outcome.discrepancies {
            assert_eq!(discrepancy.discrepancy_type, DiscrepancyType::SpecStricter);
            assert_eq!(discrepancy.path, "user.json:User/name");
            assert_eq!(discrepancy.property_name, "User/name");
            assert_eq!(discrepancy.constraint_type, "minLength");
            assert!(discrepancy.recommendation.contains("relaxing"));
        }
    }

    #[tokio::test]
    async fn test_endpoint_filter_skips_non_matching_targets() {
        let dir = tempfile::tempdir().unwrap();
        write_user_spec(dir.path());

        let server = MockServer::start().await;
        let mut runner = ProbeRunner::new(config_for(dir.path()), Some(live_client(&server)));
        let outcome = runner.run(Some("widgets")).await.unwrap();

        assert_eq!(outcome.probes_sent, 0);
        assert!(outcome.endpoint_results.is_empty());
    }

    #[tokio::test]
    async fn test_indeterminate_statuses_are_counted_not_classified() {
        let dir = tempfile::tempdir().unwrap();
        write_user_spec(dir.path());

        let server = MockServer::start().await;
        Mock::given(method_matcher("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut runner = ProbeRunner::new(config_for(dir.path()), Some(live_client(&server)));
        let outcome = runner.run(None).await.unwrap();

        assert_eq!(outcome.endpoint_results[0].indeterminate, 4);
        assert!(outcome.discrepancies.is_empty());
    }

    #[test]
    fn test_build_probe_body_overlays_property_value() {
        let declaration = ConstraintDeclaration {
            kind: ConstraintKind::MinLength,
            value: json!(3),
            property: Some("name".to_string()),
        };
        let case = TestCase::valid("minLength_exact_3", json!("abc"), "len == 3");

        let body = build_probe_body(
            Some(&json!({"name": "default", "role": "admin"})),
            &declaration,
            &case,
        );
        assert_eq!(body, json!({"name": "abc", "role": "admin"}));
    }

    #[test]
    fn test_build_probe_body_removes_omitted_field() {
        let declaration = ConstraintDeclaration {
            kind: ConstraintKind::Required,
            value: json!(["name"]),
            property: None,
        };
        let case = TestCase::invalid(
            "required_missing_name",
            json!({"_omit_field": "name"}),
            "name omitted",
        );

        let body = build_probe_body(
            Some(&json!({"name": "default", "role": "admin"})),
            &declaration,
            &case,
        );
        assert_eq!(body, json!({"role": "admin"}));
    }

    #[test]
    fn test_build_probe_body_schema_level_value_is_whole_body() {
        let declaration = ConstraintDeclaration {
            kind: ConstraintKind::Type,
            value: json!("object"),
            property: None,
        };
        let case = TestCase::invalid("type_invalid_object_0", json!("not_object"), "wrong type");

        let body = build_probe_body(Some(&json!({"name": "default"})), &declaration, &case);
        assert_eq!(body, json!("not_object"));
    }

    #[test]
    fn test_endpoint_result_status_collapse() {
        let mut result = EndpointRunResult {
            endpoint: "create_user".to_string(),
            resource: "users".to_string(),
            cases: 8,
            passed: 8,
            failed: 0,
            indeterminate: 0,
            errors: 0,
        };
        assert_eq!(result.status(), "passed");

        result.errors = 1;
        assert_eq!(result.status(), "error");

        result.failed = 2;
        assert_eq!(result.status(), "failed");
    }
}
