// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenAI-compatible chat-completions backend (OpenAI or a local Ollama).

use super::{AnalysisAdapter, AnalysisError};
use async_trait::async_trait;
use kx_core::{ActionType, AnalysisResult, Issue, Remediation, RemediationRequest, Resource};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Keys models like to wrap their answer in.
const WRAPPER_KEYS: &[&str] = &["analysis_result", "AnalysisResult", "result", "output", "json"];

const NO_SUMMARY: &str = "Analyzed. No specific summary returned by AI model.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProvider {
    #[serde(rename = "openai")]
    OpenAi,
    #[default]
    Ollama,
}

impl ChatProvider {
    fn default_base_url(&self) -> &'static str {
        match self {
            ChatProvider::OpenAi => OPENAI_BASE_URL,
            ChatProvider::Ollama => OLLAMA_BASE_URL,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            ChatProvider::OpenAi => "gpt-4-turbo",
            ChatProvider::Ollama => "llama3",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub provider: ChatProvider,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: ChatProvider::default(),
            model: None,
            base_url: None,
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

/// Analysis adapter speaking the chat-completions protocol in JSON mode.
#[derive(Clone)]
pub struct ChatAnalysisAdapter {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatAnalysisAdapter {
    pub fn new(config: ChatConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        let base = config.base_url.as_deref().unwrap_or(config.provider.default_base_url());
        Ok(Self {
            client,
            endpoint: endpoint(base),
            model: config.model.unwrap_or_else(|| config.provider.default_model().to_string()),
            api_key: config.api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, AnalysisError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: 0.0,
            response_format: ResponseFormat { format_type: "json_object" },
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let started = Instant::now();
        let response =
            builder.send().await.map_err(|e| AnalysisError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| AnalysisError::Transport(e.to_string()))?;
        tracing::debug!(
            model = %self.model,
            %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat completion returned"
        );

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(AnalysisError::Backend(err.error.message));
            }
            return Err(AnalysisError::Backend(format!("{status}: {body}")));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| AnalysisError::Malformed(format!("unexpected response shape: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AnalysisError::Malformed("empty completion".to_string()))
    }
}

#[async_trait]
impl AnalysisAdapter for ChatAnalysisAdapter {
    async fn analyze_context(&self, resources: &[Resource], query: &str) -> AnalysisResult {
        let context: Vec<Value> = resources.iter().map(condensed).collect();
        let context = serde_json::to_string_pretty(&context).unwrap_or_default();
        let user = format!(
            "Context:\n{context}\n\nUser Query: {query}\n\n\
             Return ONLY a JSON object with a 'summary' string and an 'issues' list \
             following this schema:\n{}",
            example_analysis()
        );
        match self.complete(ANALYST_PROMPT, &user).await.and_then(|raw| parse_analysis(&raw)) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "context analysis degraded");
                AnalysisResult::degraded(e)
            }
        }
    }

    async fn analyze_resource(&self, target: &Resource, context: &[Resource]) -> AnalysisResult {
        let summary: Vec<Value> = context
            .iter()
            .map(|r| json!({ "kind": r.kind, "name": r.name, "namespace": r.namespace, "uid": r.unique_id }))
            .collect();
        let user = format!(
            "CONTEXT SUMMARY:\n{}\n\nTARGET RESOURCE:\n{}\n\n\
             Return ONLY valid JSON with a 'summary' string explaining whether the resource is \
             healthy and an 'issues' list (empty if none). Every improvement mentioned in the \
             summary must appear as an issue. Follow this schema:\n{}",
            serde_json::to_string_pretty(&summary).unwrap_or_default(),
            serde_json::to_string_pretty(&condensed(target)).unwrap_or_default(),
            example_analysis()
        );
        match self.complete(ANALYST_PROMPT, &user).await.and_then(|raw| parse_analysis(&raw)) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(resource = %target.unique_id, error = %e, "resource analysis degraded");
                AnalysisResult::degraded(e)
            }
        }
    }

    async fn generate_remediation(
        &self,
        request: &RemediationRequest,
    ) -> Result<Remediation, AnalysisError> {
        let user = format!(
            "Target Resource:\n{}\n\nIssue to Fix:\n{}\n\n\
             Generate a corrected Kubernetes manifest that resolves the issue. The 'manifest' \
             field MUST be the COMPLETE resource (apiVersion, kind, metadata, spec), unchanged \
             except for the fix. Return a JSON object:\n\
             {{\"description\": \"...\", \"action_type\": \"APPLY\", \"manifest\": {{...}}, \
             \"target_resource_id\": \"{}\"}}",
            serde_json::to_string_pretty(&condensed(&request.resource)).unwrap_or_default(),
            request.issue,
            request.resource.unique_id,
        );
        let raw = self.complete(REMEDIATOR_PROMPT, &user).await?;
        parse_remediation(&raw, request)
    }
}

const ANALYST_PROMPT: &str = "You are a Senior Kubernetes Site Reliability Engineer. Analyze the \
given Kubernetes resources for security, performance, and reliability issues. Output STRICT JSON.";

const REMEDIATOR_PROMPT: &str =
    "You are a Kubernetes Automation Engineer. You fix misconfigurations. Output STRICT JSON.";

fn endpoint(base: &str) -> String {
    format!("{}/chat/completions", base.trim_end_matches('/'))
}

fn example_analysis() -> String {
    let example = json!({
        "summary": "The resource is generally healthy but lacks resource limits.",
        "issues": [{
            "severity": "MEDIUM",
            "category": "PERFORMANCE",
            "title": "Missing Resource Limits",
            "description": "The container 'app' has no resource limits defined.",
            "affected_resource_ids": ["Deployment/default/app"],
            "remediation_suggestion": {
                "description": "Add resources.limits to the container spec.",
                "action_type": "PATCH",
                "manifest": {},
                "target_resource_id": "Deployment/default/app"
            }
        }]
    });
    serde_json::to_string_pretty(&example).unwrap_or_default()
}

/// Resource as JSON with `metadata.managedFields` removed.
pub(crate) fn condensed(resource: &Resource) -> Value {
    let mut value = serde_json::to_value(resource).unwrap_or(Value::Null);
    if let Some(meta) = value.pointer_mut("/content/metadata").and_then(Value::as_object_mut) {
        meta.remove("managedFields");
    }
    value
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Coerce raw model output into an [`AnalysisResult`].
pub(crate) fn parse_analysis(raw: &str) -> Result<AnalysisResult, AnalysisError> {
    let mut data: Value = serde_json::from_str(strip_fences(raw))
        .map_err(|e| AnalysisError::Malformed(format!("invalid JSON output from AI: {e}")))?;

    if data.get("summary").is_none() && data.get("issues").is_none() {
        let inner =
            WRAPPER_KEYS.iter().find_map(|k| data.get(*k).filter(|v| v.is_object())).cloned();
        if let Some(inner) = inner {
            data = inner;
        }
    }

    let summary = match data.get("summary") {
        None | Some(Value::Null) => NO_SUMMARY.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => {
            items.iter().filter_map(Value::as_str).collect::<Vec<_>>().join("\n")
        }
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_default(),
    };

    let issues = data
        .get("issues")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(normalize_issue).collect())
        .unwrap_or_default();

    Ok(AnalysisResult::new(summary, issues))
}

fn normalize_issue(item: &Value) -> Option<Issue> {
    let mut obj: Map<String, Value> = item.as_object()?.clone();

    let severity = obj.get("severity").and_then(Value::as_str).map(str::to_uppercase);
    let severity = match severity.as_deref() {
        Some(s @ ("LOW" | "MEDIUM" | "HIGH" | "CRITICAL")) => s.to_string(),
        _ => "LOW".to_string(),
    };
    obj.insert("severity".into(), Value::String(severity));

    if let Some(category) = obj.get("category").and_then(Value::as_str) {
        let category = category.trim().to_uppercase().replace([' ', '-'], "_");
        obj.insert("category".into(), Value::String(category));
    }

    // A broken suggestion should not cost us the issue itself
    if let Some(suggestion) = obj.remove("remediation_suggestion") {
        let suggestion = normalize_suggestion(suggestion);
        if let Some(s) = suggestion {
            obj.insert("remediation_suggestion".into(), s);
        }
    }

    match serde_json::from_value::<Issue>(Value::Object(obj)) {
        Ok(issue) => Some(issue),
        Err(e) => {
            tracing::debug!(error = %e, "skipping invalid issue");
            None
        }
    }
}

fn normalize_suggestion(mut suggestion: Value) -> Option<Value> {
    let obj = suggestion.as_object_mut()?;
    if let Some(action) = obj.get("action_type").and_then(Value::as_str) {
        let action = action.to_uppercase();
        obj.insert("action_type".into(), Value::String(action));
    }
    serde_json::from_value::<Remediation>(suggestion.clone()).ok().map(|_| suggestion)
}

/// Coerce raw model output into a [`Remediation`] for `request`.
///
/// Missing `apiVersion`, `kind` and `metadata` are restored from the
/// original resource; anything still incomplete is rejected.
pub(crate) fn parse_remediation(
    raw: &str,
    request: &RemediationRequest,
) -> Result<Remediation, AnalysisError> {
    let mut data: Value = serde_json::from_str(strip_fences(raw))
        .map_err(|e| AnalysisError::Malformed(format!("invalid JSON output from AI: {e}")))?;
    let obj = data
        .as_object_mut()
        .ok_or_else(|| AnalysisError::Malformed("expected a JSON object".to_string()))?;

    let mut manifest = match obj.remove("manifest") {
        Some(Value::String(s)) => serde_json::from_str(&s)
            .map_err(|e| AnalysisError::Malformed(format!("manifest is not JSON: {e}")))?,
        Some(v) => v,
        None => Value::Object(Map::new()),
    };
    let fields = manifest
        .as_object_mut()
        .ok_or_else(|| AnalysisError::Malformed("manifest is not an object".to_string()))?;

    let original = &request.resource.content;
    for key in ["apiVersion", "kind", "metadata"] {
        if fields.get(key).map_or(true, Value::is_null) {
            if let Some(v) = original.get(key) {
                tracing::debug!(%key, "restoring manifest field from original resource");
                fields.insert(key.to_string(), v.clone());
            }
        }
    }
    if !fields.get("apiVersion").is_some_and(Value::is_string)
        || !fields.get("kind").is_some_and(Value::is_string)
    {
        return Err(AnalysisError::Malformed("manifest lacks apiVersion or kind".to_string()));
    }

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("AI generated remediation")
        .to_string();
    let action_type = obj
        .get("action_type")
        .and_then(Value::as_str)
        .and_then(|s| serde_json::from_value(Value::String(s.to_uppercase())).ok())
        .unwrap_or(ActionType::Apply);

    Ok(Remediation {
        description,
        action_type,
        manifest,
        target_resource_id: request.resource.unique_id.clone(),
    })
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
