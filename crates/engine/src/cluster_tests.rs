// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kx_adapters::{FakeClusterAdapter, FakeConnector};
use std::path::Path;

#[tokio::test]
async fn connect_registers_handle() {
    let connector = FakeConnector::new();
    let clusters = ClusterRegistry::new();

    let handle =
        connect_cluster(&connector, &clusters, "prod", Some(PathBuf::from("/k/prod.yaml")))
            .await
            .unwrap();

    assert_eq!(handle.source().id, "prod");
    assert_eq!(handle.source().kubeconfig.as_deref(), Some(Path::new("/k/prod.yaml")));
    assert!(clusters.contains("prod"));
    assert_eq!(connector.connects(), vec![Some(PathBuf::from("/k/prod.yaml"))]);
}

#[tokio::test]
async fn unreachable_cluster_is_not_registered() {
    let connector = FakeConnector::new();
    let cluster = FakeClusterAdapter::new();
    cluster.disconnect_for(1);
    connector.register("/k/dead.yaml", cluster);
    let clusters = ClusterRegistry::new();

    let err = connect_cluster(&connector, &clusters, "dead", Some(PathBuf::from("/k/dead.yaml")))
        .await
        .unwrap_err();

    assert!(matches!(err, ClusterError::Connection(_)));
    assert!(clusters.is_empty());
}

#[tokio::test]
async fn connector_failure_propagates() {
    let connector = FakeConnector::new();
    connector.fail_connect("bad kubeconfig");
    let clusters = ClusterRegistry::new();

    let err = connect_cluster(&connector, &clusters, "x", None).await.unwrap_err();
    assert!(matches!(err, ClusterError::Kubeconfig(_)));
}
