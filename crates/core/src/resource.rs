// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster resources as seen through the Cluster Access Port

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace recorded for resources that carry none (cluster-scoped kinds).
pub const DEFAULT_NAMESPACE: &str = "default";

/// Stable identity of a resource: `{kind}/{namespace}/{name}`.
pub fn unique_id(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}/{namespace}/{name}")
}

/// A single resource fetched from a cluster.
///
/// `content` holds the raw document as returned by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub api_version: String,
    pub content: Value,
    pub unique_id: String,
}

impl Resource {
    pub fn new(
        kind: String,
        name: String,
        namespace: String,
        api_version: String,
        content: Value,
    ) -> Self {
        let namespace = if namespace.is_empty() { DEFAULT_NAMESPACE.to_string() } else { namespace };
        let unique_id = unique_id(&kind, &namespace, &name);
        Self { kind, name, namespace, api_version, content, unique_id }
    }

    /// Opaque change marker (`metadata.resourceVersion`), empty if absent.
    pub fn version_token(&self) -> &str {
        self.content
            .get("metadata")
            .and_then(|m| m.get("resourceVersion"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

crate::builder! {
    pub struct ResourceBuilder => Resource::new {
        into {
            kind: String = "Deployment",
            name: String = "web",
            namespace: String = "default",
            api_version: String = "apps/v1",
        }
        set {
            content: Value = serde_json::json!({ "metadata": { "resourceVersion": "1" } }),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ResourceBuilder {
    /// Set `metadata.resourceVersion` on the content document.
    pub fn version(mut self, version: &str) -> Self {
        if let Some(meta) = self.content.get_mut("metadata").and_then(Value::as_object_mut) {
            meta.insert("resourceVersion".into(), Value::String(version.to_string()));
        }
        self
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
