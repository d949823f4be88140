// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn unique_id_joins_kind_namespace_name() {
    let r = Resource::builder().kind("Service").namespace("shop").name("api").build();
    assert_eq!(r.unique_id, "Service/shop/api");
}

#[test]
fn empty_namespace_falls_back_to_default() {
    let r = Resource::new("Node".into(), "n1".into(), String::new(), "v1".into(), json!({}));
    assert_eq!(r.namespace, "default");
    assert_eq!(r.unique_id, "Node/default/n1");
}

#[test]
fn version_token_reads_resource_version() {
    let r = Resource::builder().version("4711").build();
    assert_eq!(r.version_token(), "4711");
}

#[test]
fn version_token_missing_is_empty() {
    let r = Resource::builder().content(json!({ "spec": {} })).build();
    assert_eq!(r.version_token(), "");
}
