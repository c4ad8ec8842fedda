mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::{items, FakeDownloader, RecordingSink};
use groupsnap_core::GroupState;
use groupsnap_engine::{
    ApiSettings, ListingError, Pipeline, PipelineEvent, QueueStore, ReqwestRemoteApi, RunConfig,
    RunError, SchedulerSettings,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GROUP: &str = "42";

struct Harness {
    _temp: TempDir,
    store: Arc<QueueStore>,
    downloader: Arc<FakeDownloader>,
    pipeline: Pipeline,
}

fn harness(server: &MockServer) -> Harness {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(QueueStore::open(temp.path()).unwrap());
    harness_with_store(server, temp, store)
}

fn harness_with_store(server: &MockServer, temp: TempDir, store: Arc<QueueStore>) -> Harness {
    let api = Arc::new(
        ReqwestRemoteApi::new(ApiSettings {
            base_url: server.uri(),
            ..ApiSettings::default()
        })
        .unwrap(),
    );
    let downloader = Arc::new(FakeDownloader::default());
    let settings = SchedulerSettings {
        pacing: Duration::ZERO,
        ..SchedulerSettings::new(temp.path())
    };
    let pipeline = Pipeline::new(store.clone(), api, downloader.clone(), settings, 3);
    Harness {
        _temp: temp,
        store,
        downloader,
        pipeline,
    }
}

async fn mount_listing(server: &MockServer, expected_group_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/groups/{GROUP}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "id": GROUP, "name": "Trip" }
        })))
        .expect(expected_group_calls)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/groups/{GROUP}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "messages": [
                { "id": "m2", "name": "Ann", "attachments": [
                    { "type": "image", "url": "https://i.groupimg.com/a" },
                    { "type": "image", "url": "https://i.groupimg.com/missing" }
                ]},
                { "id": "m1", "name": "Bo", "attachments": [
                    { "type": "image", "url": "https://i.groupimg.com/b" }
                ]}
            ]}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fresh_run_lists_persists_and_drains() {
    groupsnap_logging::initialize_for_tests();
    let server = MockServer::start().await;
    mount_listing(&server, 1).await;
    let h = harness(&server);

    let report = h.pipeline.run(Some("tok"), GROUP).await.unwrap();

    assert!(!report.resumed);
    assert_eq!(report.group_name, "Trip");
    assert_eq!(report.summary.success, 2);
    assert_eq!(report.summary.failure, 1);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(h.downloader.calls().len(), 3);
    assert!(h.store.get_group(GROUP).unwrap().is_drained());
    assert_eq!(h.store.get_token().as_deref(), Some("tok"));
}

#[tokio::test]
async fn finished_group_is_not_relisted() {
    let server = MockServer::start().await;
    mount_listing(&server, 1).await;
    let h = harness(&server);

    h.pipeline.run(Some("tok"), GROUP).await.unwrap();
    let second = h.pipeline.run(None, GROUP).await.unwrap();

    assert!(second.resumed);
    assert_eq!(second.summary.total(), 0);
    assert_eq!(h.downloader.calls().len(), 3);
}

#[tokio::test]
async fn pending_queue_resumes_without_listing() {
    let server = MockServer::start().await;
    mount_listing(&server, 0).await;

    let temp = TempDir::new().unwrap();
    let store = Arc::new(QueueStore::open(temp.path()).unwrap());
    let mut state = GroupState::new(GROUP, "Trip", "tok");
    state.extend_items(items(&["https://i.groupimg.com/x", "https://i.groupimg.com/y"]));
    store.create_group(state).unwrap();
    store.set_token("tok").unwrap();
    let h = harness_with_store(&server, temp, store);

    let report = h.pipeline.run(None, GROUP).await.unwrap();

    assert!(report.resumed);
    assert_eq!(report.summary.success, 2);
    assert!(h.store.get_group(GROUP).unwrap().is_drained());
}

#[tokio::test]
async fn missing_token_fails_before_any_request() {
    let server = MockServer::start().await;
    mount_listing(&server, 0).await;
    let h = harness(&server);

    let err = h.pipeline.run(None, GROUP).await.unwrap_err();
    assert!(matches!(err, RunError::MissingToken));
}

#[tokio::test]
async fn listing_failure_performs_no_downloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/groups/{GROUP}")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let h = harness(&server);

    let err = h.pipeline.run(Some("expired"), GROUP).await.unwrap_err();

    assert!(matches!(err, RunError::Listing(ListingError::Auth)));
    assert!(h.downloader.calls().is_empty());
    assert!(h.store.get_group(GROUP).is_none());
}

#[tokio::test]
async fn observer_sees_group_lifecycle() {
    let server = MockServer::start().await;
    mount_listing(&server, 1).await;
    let sink = RecordingSink::default();
    let h = harness(&server);
    let pipeline = h.pipeline.with_sink(Arc::new(sink.clone()));

    pipeline.run(Some("tok"), GROUP).await.unwrap();

    let events = sink.take();
    assert!(matches!(
        events.first(),
        Some(PipelineEvent::GroupStarted { pending: 3, resumed: false, .. })
    ));
    match events.last() {
        Some(PipelineEvent::GroupCompleted { summary, .. }) => assert_eq!(summary.total(), 3),
        other => panic!("unexpected last event {other:?}"),
    }
    let completions = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::ItemCompleted { .. }))
        .count();
    assert_eq!(completions, 3);
}

#[test]
fn run_config_defaults_and_validation() {
    let config: RunConfig = ron::from_str(r#"(group_id: "42", token: Some("tok"))"#).unwrap();
    assert_eq!(config.concurrency, 3);
    assert_eq!(config.timeout_secs, 60);
    assert_eq!(config.state_dir(), Path::new("output"));
    assert!(config.validate().is_ok());

    for concurrency in [0, 11] {
        let bad = RunConfig {
            concurrency,
            ..RunConfig::new("42")
        };
        assert!(matches!(bad.validate(), Err(RunError::Config(_))));
    }
    assert!(matches!(
        RunConfig::new("  ").validate(),
        Err(RunError::Config(_))
    ));
}
