// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::path::Path;

#[test]
fn listed_kinds_are_unique() {
    let mut kinds: Vec<&str> = LISTED_KINDS.iter().map(|(_, _, k, _, _)| *k).collect();
    let total = kinds.len();
    kinds.sort_unstable();
    kinds.dedup();
    assert_eq!(kinds.len(), total);
}

#[tokio::test]
async fn fake_lists_filtered_by_namespace() {
    let fake = FakeClusterAdapter::with_resources(vec![
        Resource::builder().namespace("a").name("x").build(),
        Resource::builder().namespace("b").name("y").build(),
    ]);
    let only_b = fake.list_resources(Some(&["b".to_string()])).await.unwrap();
    assert_eq!(only_b.len(), 1);
    assert_eq!(only_b[0].unique_id, "Deployment/b/y");
    assert_eq!(fake.list_resources(None).await.unwrap().len(), 2);
    assert_eq!(fake.list_calls(), 2);
}

#[tokio::test]
async fn fake_get_resource_by_identity() {
    let fake = FakeClusterAdapter::with_resources(vec![Resource::builder().build()]);
    assert!(fake.get_resource("Deployment", "web", "default").await.unwrap().is_some());
    fake.remove("Deployment/default/web");
    assert!(fake.get_resource("Deployment", "web", "default").await.unwrap().is_none());
}

#[tokio::test]
async fn fake_apply_records_and_rejects() {
    let fake = FakeClusterAdapter::new();
    fake.apply_manifest(&json!({"kind": "Pod"}), "default").await.unwrap();
    fake.reject_apply("admission denied");
    let err = fake.apply_manifest(&json!({}), "default").await.unwrap_err();
    assert!(matches!(err, ClusterError::Rejected(ref s) if s == "admission denied"));
    assert_eq!(fake.applies().len(), 2);
}

#[tokio::test]
async fn fake_connection_recovers_after_n_checks() {
    let fake = FakeClusterAdapter::new();
    fake.disconnect_for(2);
    assert!(!fake.check_connection().await);
    assert!(!fake.check_connection().await);
    assert!(fake.check_connection().await);
}

#[tokio::test]
async fn connector_routes_by_path() {
    let connector = FakeConnector::new();
    let registered = FakeClusterAdapter::with_resources(vec![Resource::builder().build()]);
    connector.register("/tmp/prod.yaml", registered);

    let prod = connector.connect(Some(Path::new("/tmp/prod.yaml"))).await.unwrap();
    assert_eq!(prod.list_resources(None).await.unwrap().len(), 1);

    let other = connector.connect(Some(Path::new("/tmp/shadow.yaml"))).await.unwrap();
    other.apply_manifest(&json!({}), "ns").await.unwrap();
    assert_eq!(connector.fallback().applies().len(), 1);
    assert_eq!(connector.connects().len(), 2);
}
