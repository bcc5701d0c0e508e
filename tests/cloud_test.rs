use std::sync::Arc;

use cloudprep::api::{Cloud, PortSpec, PrepareInput, Protocol};
use cloudprep::gcp::client::mock::{Call, MockComputeClient, Reply};
use cloudprep::gcp::client::{Direction, Firewall, FirewallAllowed, is_not_found};
use cloudprep::gcp::firewall::internal_ingress_rule;
use cloudprep::gcp::{CloudInfo, GcpCloud};
use cloudprep::reporter::{RecordingReporter, Report};

const PROJECT_ID: &str = "test-projectID";
const INFRA_ID: &str = "test-infraID";
const REGION: &str = "test-region";
const INGRESS_RULE_NAME: &str = "test-infraID-submariner-internal-ports-ingress";

fn build_cloud(mock: MockComputeClient) -> (GcpCloud, Arc<MockComputeClient>) {
    let client = Arc::new(mock);
    let cloud = GcpCloud::new(CloudInfo {
        infra_id: INFRA_ID.to_string(),
        region: Some(REGION.to_string()),
        project_id: PROJECT_ID.to_string(),
        client: client.clone(),
    });
    (cloud, client)
}

fn prepare_input() -> PrepareInput {
    PrepareInput {
        internal_ports: vec![
            PortSpec::new(100, Protocol::Tcp),
            PortSpec::new(200, Protocol::Udp),
        ],
    }
}

fn existing_rule() -> Reply<Firewall> {
    Reply::Ok(Firewall {
        name: INGRESS_RULE_NAME.to_string(),
        ..Firewall::default()
    })
}

fn assert_ingress_rule(rule: &Firewall) {
    assert_eq!(rule.name, INGRESS_RULE_NAME);
    assert_eq!(rule.direction, Some(Direction::Ingress));
    assert_eq!(rule.allowed.len(), 2);
    assert_eq!(
        rule.allowed[0],
        FirewallAllowed {
            ip_protocol: "TCP".to_string(),
            ports: vec!["100".to_string()],
        }
    );
    assert_eq!(
        rule.allowed[1],
        FirewallAllowed {
            ip_protocol: "UDP".to_string(),
            ports: vec!["200".to_string()],
        }
    );
}

fn get_call() -> Call {
    Call::Get {
        project_id: PROJECT_ID.to_string(),
        name: INGRESS_RULE_NAME.to_string(),
    }
}

// ── prepare ───────────────────────────────────────────────────────

#[tokio::test]
async fn prepare_inserts_missing_rule() {
    let (cloud, client) = build_cloud(
        MockComputeClient::new()
            .on_get(Reply::NotFound)
            .on_insert(Reply::Ok(())),
    );

    cloud
        .prepare(&prepare_input(), &RecordingReporter::new())
        .await
        .unwrap();

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], get_call());
    match &calls[1] {
        Call::Insert { project_id, rule } => {
            assert_eq!(project_id, PROJECT_ID);
            assert_ingress_rule(rule);
        }
        other => panic!("expected Insert, got {other:?}"),
    }
    assert!(client.updated().is_empty());
}

#[tokio::test]
async fn prepare_returns_error_when_insert_fails() {
    let (cloud, client) = build_cloud(
        MockComputeClient::new()
            .on_get(Reply::NotFound)
            .on_insert(Reply::Fail("fake insert error".to_string())),
    );

    let err = cloud
        .prepare(&prepare_input(), &RecordingReporter::new())
        .await
        .unwrap_err();

    let msg = format!("{err:#}");
    assert!(msg.contains("fake insert error"));
    assert!(msg.contains("error inserting firewall rule"));
    assert_eq!(client.inserted().len(), 1);
}

#[tokio::test]
async fn prepare_updates_existing_rule() {
    let (cloud, client) = build_cloud(
        MockComputeClient::new()
            .on_get(existing_rule())
            .on_update(Reply::Ok(())),
    );

    cloud
        .prepare(&prepare_input(), &RecordingReporter::new())
        .await
        .unwrap();

    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], get_call());
    match &calls[1] {
        Call::Update {
            project_id,
            name,
            rule,
        } => {
            assert_eq!(project_id, PROJECT_ID);
            assert_eq!(name, INGRESS_RULE_NAME);
            assert_ingress_rule(rule);
        }
        other => panic!("expected Update, got {other:?}"),
    }
    assert!(client.inserted().is_empty());
}

#[tokio::test]
async fn prepare_returns_error_when_update_fails() {
    let (cloud, _client) = build_cloud(
        MockComputeClient::new()
            .on_get(existing_rule())
            .on_update(Reply::Fail("fake update error".to_string())),
    );

    let err = cloud
        .prepare(&prepare_input(), &RecordingReporter::new())
        .await
        .unwrap_err();

    let msg = format!("{err:#}");
    assert!(msg.contains("fake update error"));
    assert!(msg.contains("error updating firewall rule"));
}

#[tokio::test]
async fn prepare_returns_error_when_lookup_fails() {
    let (cloud, client) =
        build_cloud(MockComputeClient::new().on_get(Reply::Fail("fake get error".to_string())));

    let err = cloud
        .prepare(&prepare_input(), &RecordingReporter::new())
        .await
        .unwrap_err();

    let msg = format!("{err:#}");
    assert!(msg.contains("fake get error"));
    assert!(msg.contains("error retrieving firewall rule"));
    assert!(!is_not_found(&err));
    // No write was attempted
    assert_eq!(client.calls(), vec![get_call()]);
}

#[tokio::test]
async fn prepare_overwrites_disabled_rule_with_same_ports() {
    let mut current = internal_ingress_rule(PROJECT_ID, INFRA_ID, &prepare_input().internal_ports);
    current.disabled = Some(true);
    current.priority = Some(65535);
    let (cloud, client) = build_cloud(
        MockComputeClient::new()
            .on_get(Reply::Ok(current))
            .on_update(Reply::Ok(())),
    );

    cloud
        .prepare(&prepare_input(), &RecordingReporter::new())
        .await
        .unwrap();

    let updated = client.updated();
    assert_eq!(updated.len(), 1);
    assert_ingress_rule(&updated[0]);
    assert_eq!(updated[0].disabled, Some(false));
    assert!(updated[0].priority.is_none());
}

#[tokio::test]
async fn prepare_updates_rule_that_already_matches() {
    let current = internal_ingress_rule(PROJECT_ID, INFRA_ID, &prepare_input().internal_ports);
    let (cloud, client) = build_cloud(
        MockComputeClient::new()
            .on_get(Reply::Ok(current.clone()))
            .on_update(Reply::Ok(())),
    );

    cloud
        .prepare(&prepare_input(), &RecordingReporter::new())
        .await
        .unwrap();

    assert_eq!(client.calls().len(), 2);
    assert_eq!(client.updated(), vec![current]);
}

#[tokio::test]
async fn prepare_reports_start_and_success() {
    let (cloud, _client) = build_cloud(
        MockComputeClient::new()
            .on_get(Reply::NotFound)
            .on_insert(Reply::Ok(())),
    );
    let reporter = RecordingReporter::new();

    cloud.prepare(&prepare_input(), &reporter).await.unwrap();

    let reports = reporter.reports();
    assert_eq!(reports.len(), 2);
    match (&reports[0], &reports[1]) {
        (Report::Started(start), Report::Succeeded(done)) => {
            assert!(start.contains("100/TCP, 200/UDP"));
            assert!(done.contains(INGRESS_RULE_NAME));
        }
        other => panic!("unexpected reports: {other:?}"),
    }
}

#[tokio::test]
async fn prepare_reports_failure() {
    let (cloud, _client) =
        build_cloud(MockComputeClient::new().on_get(Reply::Fail("fake get error".to_string())));
    let reporter = RecordingReporter::new();

    assert!(cloud.prepare(&prepare_input(), &reporter).await.is_err());

    let reports = reporter.reports();
    assert_eq!(reports.len(), 2);
    assert!(matches!(reports[0], Report::Started(_)));
    match &reports[1] {
        Report::Failed(msg) => assert!(msg.contains("fake get error")),
        other => panic!("expected Failed, got {other:?}"),
    }
}

// ── cleanup ───────────────────────────────────────────────────────

#[tokio::test]
async fn cleanup_deletes_rule() {
    let (cloud, client) = build_cloud(MockComputeClient::new().on_delete(Reply::Ok(())));

    let reporter = RecordingReporter::new();
    cloud.cleanup(&reporter).await.unwrap();

    assert!(
        !reporter
            .reports()
            .iter()
            .any(|r| matches!(r, Report::Warning(_)))
    );
    assert_eq!(
        client.calls(),
        vec![Call::Delete {
            project_id: PROJECT_ID.to_string(),
            name: INGRESS_RULE_NAME.to_string(),
        }]
    );
}

#[tokio::test]
async fn cleanup_succeeds_when_rule_is_gone() {
    let (cloud, _client) = build_cloud(MockComputeClient::new().on_delete(Reply::NotFound));
    let reporter = RecordingReporter::new();

    cloud.cleanup(&reporter).await.unwrap();

    let reports = reporter.reports();
    assert_eq!(reports.len(), 3);
    assert!(matches!(reports[0], Report::Started(_)));
    match &reports[1] {
        Report::Warning(msg) => {
            assert!(msg.contains(INGRESS_RULE_NAME));
            assert!(msg.contains("already deleted"));
        }
        other => panic!("expected Warning, got {other:?}"),
    }
    assert!(matches!(reports[2], Report::Succeeded(_)));
}

#[tokio::test]
async fn cleanup_returns_error_when_delete_fails() {
    let (cloud, _client) = build_cloud(
        MockComputeClient::new().on_delete(Reply::Fail("fake delete error".to_string())),
    );
    let reporter = RecordingReporter::new();

    let err = cloud.cleanup(&reporter).await.unwrap_err();

    let msg = format!("{err:#}");
    assert!(msg.contains("fake delete error"));
    assert!(msg.contains("error deleting firewall rule"));
    assert!(matches!(reporter.reports().last(), Some(Report::Failed(_))));
}

#[tokio::test]
async fn region_is_optional() {
    let client = Arc::new(
        MockComputeClient::new()
            .on_get(Reply::NotFound)
            .on_insert(Reply::Ok(())),
    );
    let cloud = GcpCloud::new(CloudInfo {
        infra_id: INFRA_ID.to_string(),
        region: None,
        project_id: PROJECT_ID.to_string(),
        client: client.clone(),
    });

    cloud
        .prepare(&prepare_input(), &RecordingReporter::new())
        .await
        .unwrap();
    assert_eq!(client.inserted().len(), 1);
}

#[test]
fn internal_rule_name_uses_infra_id() {
    let (cloud, _client) = build_cloud(MockComputeClient::new());
    assert_eq!(cloud.internal_rule_name(), INGRESS_RULE_NAME);
}
