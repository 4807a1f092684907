//! The whole application against the loopback server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use entity_sync_core::action::EntityAction;
use entity_sync_core::bulk::BulkActionStatus;
use entity_sync_core::correlation::CallId;
use entity_sync_core::selectors;
use entity_sync_core::transport::{Push, PushVerb};
use entity_sync_domains::App;
use entity_sync_domains::app::{AppAction, AppState};
use entity_sync_domains::loopback::{LoopbackServer, LoopbackTransport};
use entity_sync_domains::models::{Fabric, Machine, Pod, PodOperation, Subnet, Tag};
use entity_sync_domains::selectors::subnets_by_fabric;
use entity_sync_runtime::binding::{BindingPhase, ListQuery};
use entity_sync_runtime::config::SyncConfig;
use entity_sync_testing::init_test_tracing;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(5);

fn seeded() -> LoopbackServer {
    let mut koala = Machine::new("abc123", "koala");
    koala.tags = vec![1];
    let mut wombat = Machine::new("def456", "wombat");
    wombat.status = "Deployed".to_string();

    LoopbackServer::new()
        .with_model(vec![Tag::new(1, "virtual"), Tag::new(2, "gpu")])
        .unwrap()
        .with_model(vec![
            Fabric::new(1, "fabric-1"),
            Fabric::new(2, "1 fabric"),
            Fabric::new(10, "fabric-10"),
        ])
        .unwrap()
        .with_model(vec![
            Subnet::new(1, "10.0.0.0/24").on_fabric(10),
            Subnet::new(2, "10.0.1.0/24").on_fabric(1),
            Subnet::new(3, "10.0.2.0/24").on_fabric(2),
            Subnet::new(4, "10.0.3.0/24"),
        ])
        .unwrap()
        .with_model(vec![koala, wombat])
        .unwrap()
        .with_model(vec![Pod::new(1, "lxd")])
        .unwrap()
}

fn start() -> (App, JoinHandle<()>) {
    init_test_tracing();
    let (transport, requests) = LoopbackTransport::channel();
    let app = App::start(transport, &SyncConfig::default());
    let server = seeded().serve(Arc::clone(app.correlator()), requests);
    (app, server)
}

/// Wait until `check` holds, re-reading state after every broadcast action.
async fn until<F>(app: &App, check: F)
where
    F: Fn(&AppState) -> bool,
{
    let mut actions = app.store.subscribe_actions();
    tokio::time::timeout(WAIT, async {
        loop {
            if app.store.state(&check).await {
                break;
            }
            let _ = actions.recv().await;
        }
    })
    .await
    .expect("state reached in time");
}

async fn fetch_all(app: &App, action: AppAction) {
    app.store.send(action).await.unwrap().wait().await;
}

#[tokio::test]
async fn unscoped_fetches_fill_the_canonical_stores() {
    let (app, _server) = start();

    fetch_all(&app, AppAction::Tag(EntityAction::Fetch { call_id: None, params: json!({}) })).await;

    let (count, loaded, buckets) = app
        .store
        .state(|s| (s.tags.items.len(), s.tags.loaded, s.tags.lists.len()))
        .await;
    assert_eq!((count, loaded, buckets), (2, true, 0));
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn subnets_group_under_fabric_names() {
    let (app, _server) = start();

    fetch_all(&app, AppAction::Fabric(EntityAction::Fetch { call_id: None, params: json!({}) })).await;
    fetch_all(&app, AppAction::Subnet(EntityAction::Fetch { call_id: None, params: json!({}) })).await;

    let labels = app
        .store
        .state(|s| {
            subnets_by_fabric(s)
                .into_iter()
                .map(|g| (g.label, g.items.len()))
                .collect::<Vec<_>>()
        })
        .await;
    assert_eq!(
        labels,
        vec![
            ("1 fabric".to_string(), 1),
            ("fabric-1".to_string(), 1),
            ("fabric-10".to_string(), 1),
            ("None".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn pushes_from_other_clients_reach_the_store() {
    let (app, _server) = start();
    fetch_all(&app, AppAction::Tag(EntityAction::Fetch { call_id: None, params: json!({}) })).await;

    app.correlator().publish(Push::new(
        "tag",
        PushVerb::Create,
        json!({"id": 7, "name": "arm64", "definition": "", "comment": ""}),
    ));
    until(&app, |s| s.tags.items.contains(&7)).await;

    app.correlator()
        .publish(Push::new("tag", PushVerb::Delete, json!({"id": 1})));
    until(&app, |s| !s.tags.items.contains(&1)).await;

    // Pushes for models nobody stores are ignored
    app.correlator()
        .publish(Push::new("zone", PushVerb::Create, json!({"id": 1})));
    assert_eq!(app.store.state(|s| s.tags.items.len()).await, 2);
}

#[tokio::test]
async fn own_mutations_come_back_as_pushes() {
    let (app, _server) = start();

    app.store
        .send(AppAction::Tag(EntityAction::Create {
            params: json!({"name": "arm64", "definition": "", "comment": ""}),
        }))
        .await
        .unwrap();
    until(&app, |s| s.tags.items.contains(&3) && s.tags.saved).await;

    app.store
        .send(AppAction::Tag(EntityAction::Delete { id: 3 }))
        .await
        .unwrap();
    until(&app, |s| !s.tags.items.contains(&3)).await;
}

#[tokio::test]
async fn list_bindings_keep_filtered_views_apart() {
    let (app, _server) = start();

    let mut ready = app.bindings.machine_list.bind(&app.store);
    let mut deployed = app.bindings.machine_list.bind(&app.store);
    ready.bind(Some(ListQuery::new(json!({"status": "Ready"})))).await.unwrap();
    deployed.bind(Some(ListQuery::new(json!({"status": "Deployed"})))).await.unwrap();

    let ready_bucket = ready.resolved(WAIT).await.unwrap();
    let deployed_bucket = deployed.resolved(WAIT).await.unwrap();
    assert_eq!(ready_bucket.items[0].hostname, "koala");
    assert_eq!(deployed_bucket.items[0].hostname, "wombat");
    assert_ne!(ready.call_id(), deployed.call_id());
    assert!(app.store.state(|s| s.machines.items.is_empty()).await);

    let ready_id = ready.call_id().cloned().unwrap();
    ready.release().await.unwrap();
    assert_eq!(ready.phase().await, BindingPhase::TornDown);
    let lists = app
        .store
        .state(|s| (s.machines.lists.contains_key(&ready_id), s.machines.lists.len()))
        .await;
    assert_eq!(lists, (false, 1));
}

#[tokio::test]
async fn detail_bindings_follow_updates_and_unsubscribe() {
    let (app, _server) = start();

    let mut first = app.bindings.machine.bind(&app.store);
    let mut second = app.bindings.machine.bind(&app.store);
    first.bind(Some("def456".to_string())).await.unwrap();
    second.bind(Some("def456".to_string())).await.unwrap();
    assert_eq!(first.resolved(WAIT).await.unwrap().hostname, "wombat");
    assert_eq!(app.bindings.machine.consumers(&"def456".to_string()), 2);

    app.store
        .send(AppAction::Machine(EntityAction::Update {
            params: json!({"system_id": "def456", "hostname": "wombat-2"}),
        }))
        .await
        .unwrap();
    until(&app, |s| {
        s.machines.items.get(&"def456".to_string()).is_some_and(|m| m.hostname == "wombat-2")
    })
    .await;
    assert_eq!(second.read().await.map(|m| m.hostname), Some("wombat-2".to_string()));

    first.release().await.unwrap();
    assert!(app.store.state(|s| s.machines.items.contains(&"def456".to_string())).await);

    second.release().await.unwrap();
    until(&app, |s| !s.machines.items.contains(&"def456".to_string())).await;
    assert_eq!(app.bindings.machine.consumers(&"def456".to_string()), 0);
}

#[tokio::test]
async fn bulk_actions_report_missing_machines() {
    let (app, _server) = start();

    app.store
        .send(AppAction::Machine(EntityAction::BulkAction {
            call_id: CallId::from("lock-1"),
            verb: "lock".to_string(),
            ids: vec!["abc123".to_string(), "gone".to_string()],
            params: json!({}),
        }))
        .await
        .unwrap()
        .wait()
        .await;

    let action = app
        .store
        .state(|s| selectors::bulk_action(&s.machines, &CallId::from("lock-1")).cloned())
        .await
        .unwrap();
    assert_eq!(action.status, BulkActionStatus::Error);
    assert_eq!(action.success_count, 1);
    assert_eq!(action.failed_ids, vec!["gone".to_string()]);
    assert_eq!(action.failure_details["Not found"], vec!["gone".to_string()]);
}

#[tokio::test]
async fn operations_clear_their_flag_when_answered() {
    let (app, _server) = start();
    fetch_all(&app, AppAction::Pod(EntityAction::Fetch { call_id: None, params: json!({}) })).await;

    app.store
        .send(AppAction::Pod(EntityAction::Operate {
            op: PodOperation::Refresh,
            id: 1,
            params: json!({}),
        }))
        .await
        .unwrap()
        .wait()
        .await;
    assert!(!app.store.state(|s| selectors::status(&s.pods, &1, PodOperation::Refresh)).await);

    app.store
        .send(AppAction::Pod(EntityAction::Operate {
            op: PodOperation::Compose,
            id: 9,
            params: json!({}),
        }))
        .await
        .unwrap()
        .wait()
        .await;
    let (composing, errors) = app
        .store
        .state(|s| (selectors::status(&s.pods, &9, PodOperation::Compose), s.pods.errors.clone()))
        .await;
    assert!(!composing);
    assert!(errors.is_some());
}
