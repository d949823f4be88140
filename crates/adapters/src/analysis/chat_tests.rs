// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kx_core::{IssueCategory, Severity};
use yare::parameterized;

fn request() -> RemediationRequest {
    let resource = Resource::builder()
        .content(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "web", "namespace": "default", "resourceVersion": "7" },
            "spec": { "replicas": 1 }
        }))
        .build();
    RemediationRequest { resource, issue: "no resource limits".into() }
}

#[parameterized(
    openai_default = { ChatProvider::OpenAi, None, "https://api.openai.com/v1/chat/completions" },
    ollama_default = { ChatProvider::Ollama, None, "http://localhost:11434/v1/chat/completions" },
    trailing_slash = { ChatProvider::Ollama, Some("http://gpu:11434/v1/"), "http://gpu:11434/v1/chat/completions" },
)]
fn endpoint_from_config(provider: ChatProvider, base: Option<&str>, expected: &str) {
    let config =
        ChatConfig { provider, base_url: base.map(str::to_string), ..ChatConfig::default() };
    let adapter = ChatAnalysisAdapter::new(config).unwrap();
    assert_eq!(adapter.endpoint, expected);
}

#[test]
fn provider_parses_from_settings_casing() {
    let p: ChatProvider = serde_json::from_str("\"openai\"").unwrap();
    assert_eq!(p, ChatProvider::OpenAi);
    let p: ChatProvider = serde_json::from_str("\"ollama\"").unwrap();
    assert_eq!(p, ChatProvider::Ollama);
}

#[test]
fn condensed_drops_managed_fields() {
    let resource = Resource::builder()
        .content(json!({ "metadata": { "name": "web", "managedFields": [{ "manager": "kubectl" }] } }))
        .build();
    let value = condensed(&resource);
    assert!(value.pointer("/content/metadata/managedFields").is_none());
    assert_eq!(value.pointer("/content/metadata/name"), Some(&json!("web")));
}

#[test]
fn parses_fenced_analysis() {
    let raw = "```json\n{\"summary\": \"ok\", \"issues\": [{\"severity\": \"high\", \"category\": \"security\", \"title\": \"Privileged\", \"description\": \"runs as root\"}]}\n```";
    let result = parse_analysis(raw).unwrap();
    assert_eq!(result.summary, "ok");
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].severity, Severity::High);
    assert_eq!(result.issues[0].category, IssueCategory::Security);
    assert!(!result.degraded);
}

#[test]
fn unwraps_known_wrapper_keys() {
    let raw = r#"{"analysis_result": {"summary": "wrapped", "issues": []}}"#;
    assert_eq!(parse_analysis(raw).unwrap().summary, "wrapped");
}

#[parameterized(
    missing = { r#"{"issues": []}"#, "Analyzed. No specific summary returned by AI model." },
    list    = { r#"{"summary": ["a", "b"]}"#, "a\nb" },
)]
fn coerces_summary(raw: &str, expected: &str) {
    assert_eq!(parse_analysis(raw).unwrap().summary, expected);
}

#[test]
fn unknown_severity_becomes_low_and_bad_issues_are_skipped() {
    let raw = r#"{"summary": "s", "issues": [
        {"severity": "urgent", "category": "best practice", "title": "t", "description": "d"},
        {"severity": "LOW", "title": "no category"}
    ]}"#;
    let result = parse_analysis(raw).unwrap();
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].severity, Severity::Low);
    assert_eq!(result.issues[0].category, IssueCategory::BestPractice);
}

#[test]
fn broken_suggestion_keeps_issue() {
    let raw = r#"{"summary": "s", "issues": [
        {"severity": "MEDIUM", "category": "COST", "title": "t", "description": "d",
         "remediation_suggestion": {"description": "only text"}}
    ]}"#;
    let result = parse_analysis(raw).unwrap();
    assert_eq!(result.issues.len(), 1);
    assert!(result.issues[0].remediation_suggestion.is_none());
}

#[test]
fn invalid_json_is_malformed() {
    let err = parse_analysis("I think the cluster is fine").unwrap_err();
    assert!(matches!(err, AnalysisError::Malformed(_)));
}

#[test]
fn remediation_restores_missing_type_meta() {
    let raw = r#"{"description": "add limits", "action_type": "apply",
                  "manifest": {"spec": {"replicas": 2}}}"#;
    let rem = parse_remediation(raw, &request()).unwrap();
    assert_eq!(rem.action_type, ActionType::Apply);
    assert_eq!(rem.manifest["kind"], "Deployment");
    assert_eq!(rem.manifest["apiVersion"], "apps/v1");
    assert_eq!(rem.manifest["metadata"]["name"], "web");
    assert_eq!(rem.manifest["spec"]["replicas"], 2);
    assert_eq!(rem.target_resource_id, "Deployment/default/web");
}

#[test]
fn remediation_accepts_manifest_as_string() {
    let raw = r#"{"description": "d", "manifest": "{\"apiVersion\": \"v1\", \"kind\": \"Pod\"}"}"#;
    let rem = parse_remediation(raw, &request()).unwrap();
    assert_eq!(rem.manifest["kind"], "Pod");
}

#[test]
fn remediation_without_type_meta_is_rejected() {
    let mut req = request();
    req.resource.content = json!({});
    let err = parse_remediation(r#"{"manifest": {"spec": {}}}"#, &req).unwrap_err();
    assert!(matches!(err, AnalysisError::Malformed(_)));
}
