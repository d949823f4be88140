// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::audit::FakeAuditSink;
use kx_adapters::{AnalysisCall, FakeAnalysisAdapter, FakeClusterAdapter};
use kx_core::{FakeClock, Issue, IssueCategory, Severity};
use tempfile::TempDir;

type TestEngine = ScanEngine<FakeAnalysisAdapter, FakeClock>;

struct Harness {
    engine: TestEngine,
    analysis: FakeAnalysisAdapter,
    cluster: FakeClusterAdapter,
    audit: FakeAuditSink,
    clock: FakeClock,
    store: Arc<ScanStore>,
    _dir: TempDir,
}

fn resources() -> Vec<Resource> {
    vec![
        Resource::builder().kind("Deployment").name("web").namespace("default").build(),
        Resource::builder().kind("Service").name("web").namespace("default").api_version("v1").build(),
        Resource::builder().kind("Deployment").name("api").namespace("payments").build(),
        Resource::builder().kind("Pod").name("dns").namespace("kube-system").api_version("v1").build(),
        Resource::builder().kind("ConfigMap").name("cfg").namespace("billing").api_version("v1").build(),
    ]
}

fn harness_with(config: ScanConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ScanStore::new(dir.path().join("scans.json"), dir.path().join("snapshots.json")));
    let analysis = FakeAnalysisAdapter::new();
    let cluster = FakeClusterAdapter::with_resources(resources());
    let audit = FakeAuditSink::new();
    let clock = FakeClock::new();

    let clusters = ClusterRegistry::new();
    clusters.insert(
        "prod".to_string(),
        ClusterHandle { id: "prod".to_string(), kubeconfig: None, adapter: Arc::new(cluster.clone()) },
    );
    let engine = ScanEngine::new(
        ScanDeps {
            analysis: analysis.clone(),
            clusters,
            store: Arc::clone(&store),
            audit: Arc::new(audit.clone()),
        },
        ScanState::default(),
        clock.clone(),
        config,
    );
    Harness { engine, analysis, cluster, audit, clock, store, _dir: dir }
}

fn harness() -> Harness {
    harness_with(ScanConfig::default().ignored_namespaces(vec!["kube-system".to_string()]))
}

async fn wait_terminal(engine: &TestEngine, id: &ScanId) -> ScanSession {
    for _ in 0..2000 {
        if let Some(s) = engine.status(id).filter(|s| s.status.is_terminal()) {
            return s;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("scan {id} never finished");
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition never met");
}

/// Store writes trail the in-memory status; wait for the terminal write.
async fn wait_persisted(store: &ScanStore, id: &ScanId) {
    wait_for(|| {
        store
            .load()
            .is_ok_and(|state| state.sessions.get(id).is_some_and(|s| s.status.is_terminal()))
    })
    .await;
}

fn issue(title: &str, severity: Severity) -> Issue {
    Issue {
        severity,
        category: IssueCategory::Reliability,
        title: title.to_string(),
        description: String::new(),
        remediation_suggestion: None,
        affected_resource_ids: vec![],
        documentation_reference: None,
    }
}

fn context_batches(analysis: &FakeAnalysisAdapter) -> Vec<Vec<String>> {
    analysis
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            AnalysisCall::Context { resource_ids, .. } => Some(resource_ids),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn full_scan_batches_by_namespace_in_discovery_order() {
    let h = harness();
    h.analysis.add_namespace_issue("payments", issue("no probes", Severity::Medium));

    let id = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    let s = wait_terminal(&h.engine, &id).await;

    assert_eq!(s.status, ScanStatus::Completed);
    assert_eq!(
        context_batches(&h.analysis),
        vec![
            vec!["Deployment/default/web".to_string(), "Service/default/web".to_string()],
            vec!["Deployment/payments/api".to_string()],
            vec!["ConfigMap/billing/cfg".to_string()],
        ]
    );
    assert_eq!(s.progress, 100);
    assert_eq!(s.total_queued, 4);
    assert_eq!(s.analyzed_count, 4);
    assert_eq!(s.resources_list.len(), 5);
    assert_eq!(s.resource_status["Pod/kube-system/dns"], ResourceStatus::Ignored);
    assert_eq!(s.resource_status["Deployment/default/web"], ResourceStatus::Analyzed);
    assert_eq!(s.issues.len(), 1);
    assert_eq!(s.summary, "Scan complete. Found 1 issues across 4 resources.");
    assert!(s.snapshot_pending.is_none());
    assert!(s.log.iter().any(|l| l.message == "  - [MEDIUM] no probes"));
    assert!(s.log.iter().any(|l| l.message == "Namespace 'default' Summary: Deployment: 1, Service: 1"));

    let snapshot = h.engine.snapshot("prod").unwrap();
    assert_eq!(snapshot.len(), 4);
    assert!(!snapshot.contains_key("Pod/kube-system/dns"));
    assert_eq!(h.audit.actions(), vec!["scan_completed"]);
}

#[tokio::test]
async fn completed_scan_is_persisted() {
    let h = harness();
    let id = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    wait_terminal(&h.engine, &id).await;
    wait_persisted(&h.store, &id).await;

    let state = h.store.load().unwrap();
    assert_eq!(state.sessions[&id].status, ScanStatus::Completed);
    assert_eq!(state.snapshots["prod"].len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_scans_land_their_final_state_on_disk() {
    let h = harness();
    let ids: Vec<ScanId> =
        (0..4).map(|_| h.engine.start("prod", ScanType::Full, vec![]).unwrap()).collect();
    for id in &ids {
        wait_terminal(&h.engine, id).await;
    }
    for id in &ids {
        wait_persisted(&h.store, id).await;
    }

    let state = h.store.load().unwrap();
    for id in &ids {
        assert_eq!(state.sessions[id], h.engine.status(id).unwrap());
    }
}

#[tokio::test]
async fn smart_scan_twice_queues_nothing_the_second_time() {
    let h = harness();
    let first = h.engine.start("prod", ScanType::Smart, vec![]).unwrap();
    wait_terminal(&h.engine, &first).await;
    let calls = h.analysis.context_calls();

    let second = h.engine.start("prod", ScanType::Smart, vec![]).unwrap();
    let s = wait_terminal(&h.engine, &second).await;

    assert_eq!(s.status, ScanStatus::Completed);
    assert_eq!(s.total_queued, 0);
    assert_eq!(s.summary, NO_CHANGES_SUMMARY);
    assert_eq!(s.progress, 100);
    assert_eq!(h.analysis.context_calls(), calls);
    assert_eq!(s.resource_status["Deployment/default/web"], ResourceStatus::Analyzed);
}

#[tokio::test]
async fn smart_scan_picks_up_changed_resources_only() {
    let h = harness();
    let first = h.engine.start("prod", ScanType::Smart, vec![]).unwrap();
    wait_terminal(&h.engine, &first).await;

    h.cluster.upsert(Resource::builder().kind("Deployment").name("api").namespace("payments").version("2").build());
    let second = h.engine.start("prod", ScanType::Smart, vec![]).unwrap();
    let s = wait_terminal(&h.engine, &second).await;

    assert_eq!(s.total_queued, 1);
    assert_eq!(context_batches(&h.analysis).last().unwrap(), &vec!["Deployment/payments/api".to_string()]);
    assert_eq!(h.engine.snapshot("prod").unwrap()["Deployment/payments/api"], "2");
}

#[tokio::test]
async fn full_scan_never_skips() {
    let h = harness();
    let first = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    wait_terminal(&h.engine, &first).await;
    let second = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    let s = wait_terminal(&h.engine, &second).await;

    assert_eq!(s.total_queued, 4);
    assert_eq!(h.analysis.context_calls(), 6);
}

#[tokio::test]
async fn stop_after_first_batch_keeps_its_issues_and_snapshot() {
    let h = harness();
    let warmup = h.engine.start("prod", ScanType::Smart, vec![]).unwrap();
    wait_terminal(&h.engine, &warmup).await;
    let committed = h.engine.snapshot("prod");

    h.cluster.set_resources(
        resources().into_iter().map(|r| {
            Resource::builder()
                .kind(r.kind)
                .name(r.name)
                .namespace(r.namespace)
                .version("9")
                .build()
        })
        .collect(),
    );
    h.analysis.add_namespace_issue("default", issue("latest tag", Severity::Low));
    h.analysis.add_namespace_issue("payments", issue("no limits", Severity::High));
    let before = h.analysis.context_calls();
    h.analysis.hold_after(before + 1);

    let id = h.engine.start("prod", ScanType::Smart, vec![]).unwrap();
    wait_for(|| h.analysis.context_calls() == before + 2).await;
    h.engine.stop(&id).await.unwrap();
    h.analysis.release();

    let s = h.engine.status(&id).unwrap();
    assert_eq!(s.status, ScanStatus::Stopped);
    assert_eq!(s.issues.iter().map(|i| i.title.as_str()).collect::<Vec<_>>(), vec!["latest tag"]);
    assert!(s.snapshot_pending.is_none());
    assert_eq!(s.log.last().unwrap().message, "Scan stopped by user.");
    assert_eq!(h.engine.snapshot("prod"), committed);
    assert_eq!(h.store.load().unwrap().sessions[&id].status, ScanStatus::Stopped);
    assert_eq!(h.audit.actions(), vec!["scan_completed"]);
}

#[tokio::test]
async fn namespace_failure_is_contained() {
    let h = harness();
    h.analysis.fail_namespace("payments");
    h.analysis.add_namespace_issue("billing", issue("plaintext secret", Severity::Critical));

    let id = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    let s = wait_terminal(&h.engine, &id).await;

    assert_eq!(s.status, ScanStatus::Completed);
    assert_eq!(s.resource_status["Deployment/payments/api"], ResourceStatus::Error);
    assert_eq!(s.resource_status["ConfigMap/billing/cfg"], ResourceStatus::Analyzed);
    assert_eq!(s.issues.len(), 1);
    assert!(s.log.iter().any(|l| l.message.starts_with("Error analyzing namespace payments")));

    let snapshot = h.engine.snapshot("prod").unwrap();
    assert!(!snapshot.contains_key("Deployment/payments/api"));
    assert!(snapshot.contains_key("ConfigMap/billing/cfg"));
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out() {
    let h = harness_with(ScanConfig::default().fetch_timeout(Duration::from_secs(60)));
    h.cluster.set_list_delay(Duration::from_secs(120));

    let id = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    tokio::time::sleep(Duration::from_secs(61)).await;
    let s = wait_terminal(&h.engine, &id).await;

    assert_eq!(s.status, ScanStatus::Failed);
    assert!(s.log.last().unwrap().message.contains("Timed out after 60s"));
    assert_eq!(h.analysis.context_calls(), 0);
    assert!(h.engine.snapshot("prod").is_none());
}

#[tokio::test]
async fn unreachable_cluster_fails_scan() {
    let h = harness();
    h.cluster.fail_list("connection refused");

    let id = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    let s = wait_terminal(&h.engine, &id).await;

    assert_eq!(s.status, ScanStatus::Failed);
    assert!(s.log.last().unwrap().message.contains("connection refused"));
}

#[tokio::test]
async fn kind_filters_limit_listing_and_analysis() {
    let h = harness();
    let id = h.engine.start("prod", ScanType::Full, vec!["deployment".to_string()]).unwrap();
    let s = wait_terminal(&h.engine, &id).await;

    assert!(s.resources_list.iter().all(|r| r.kind == "Deployment"));
    assert_eq!(s.resources_list.len(), 2);
    assert_eq!(s.total_queued, 2);
}

#[tokio::test]
async fn list_is_newest_first() {
    let h = harness();
    let older = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    wait_terminal(&h.engine, &older).await;
    h.clock.advance(Duration::from_secs(5));
    let newer = h.engine.start("prod", ScanType::Smart, vec![]).unwrap();
    wait_terminal(&h.engine, &newer).await;

    let list = h.engine.list();
    assert_eq!(list.iter().map(|s| s.id.clone()).collect::<Vec<_>>(), vec![newer, older]);
    assert_eq!(list[1].total_issues, 0);
    assert_eq!(list[0].scan_type, ScanType::Smart);
}

#[tokio::test]
async fn clear_cache_cancels_and_forgets_everything() {
    let h = harness();
    let done = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    wait_terminal(&h.engine, &done).await;

    h.analysis.hold_after(h.analysis.context_calls());
    let running = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    wait_for(|| h.analysis.context_calls() == 4).await;

    h.engine.clear_cache().await;
    h.analysis.release();

    assert!(h.engine.list().is_empty());
    assert!(h.engine.status(&running).is_none());
    assert!(h.engine.snapshot("prod").is_none());
    assert_eq!(h.store.load().unwrap(), ScanState::default());
}

#[tokio::test]
async fn unknown_ids_are_reported() {
    let h = harness();
    assert!(matches!(
        h.engine.start("staging", ScanType::Full, vec![]),
        Err(ScanError::ClusterNotFound(_))
    ));
    assert!(matches!(h.engine.stop(&ScanId::new()).await, Err(ScanError::NotFound(_))));
}

#[tokio::test]
async fn log_is_bounded() {
    let h = harness_with(ScanConfig::default().log_cap(5));
    let id = h.engine.start("prod", ScanType::Full, vec![]).unwrap();
    let s = wait_terminal(&h.engine, &id).await;

    assert_eq!(s.log.len(), 5);
    assert_eq!(s.log.last().unwrap().message, "Scan completed successfully.");
}
