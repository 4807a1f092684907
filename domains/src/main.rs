//! Entity sync demo
//!
//! Runs the application store against the in-process loopback server:
//! binds a filtered machine list, runs an operation, watches a push arrive
//! and prints grouped subnets.
//!
//! ```bash
//! RUST_LOG=entity_sync_runtime=debug cargo run --bin entity-sync-demo
//! ```
//!
//! Set `ENTITY_SYNC_METRICS_ADDR` (e.g. `127.0.0.1:9000`) to install the
//! Prometheus recorder and print the rendered metrics on exit.

use anyhow::Context;
use entity_sync_core::action::EntityAction;
use entity_sync_core::selectors::{self, FilterItems};
use entity_sync_domains::App;
use entity_sync_domains::app::AppAction;
use entity_sync_domains::loopback::{LoopbackServer, LoopbackTransport};
use entity_sync_domains::models::{Fabric, Machine, MachineOperation, Pod, Subnet, Tag};
use entity_sync_domains::selectors::{MachineSearch, subnets_by_fabric};
use entity_sync_runtime::binding::ListQuery;
use entity_sync_runtime::config::SyncConfig;
use entity_sync_runtime::metrics::MetricsServer;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn seed() -> anyhow::Result<LoopbackServer> {
    let mut koala = Machine::new("abc123", "koala");
    koala.tags = vec![1];
    koala.pod = Some(1);
    let mut wombat = Machine::new("def456", "wombat");
    wombat.status = "Deployed".to_string();
    wombat.owner = Some("admin".to_string());

    Ok(LoopbackServer::new()
        .with_model(vec![Tag::new(1, "virtual"), Tag::new(2, "gpu")])?
        .with_model(vec![
            Fabric::new(1, "fabric-1"),
            Fabric::new(2, "1 fabric"),
            Fabric::new(10, "fabric-10"),
        ])?
        .with_model(vec![
            Subnet::new(1, "10.0.0.0/24").on_fabric(10),
            Subnet::new(2, "10.0.1.0/24").on_fabric(1),
            Subnet::new(3, "192.168.0.0/24").on_fabric(2),
        ])?
        .with_model(vec![koala, wombat])?
        .with_model(vec![Pod::new(1, "lxd-host")])?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "entity_sync_demo=info,entity_sync_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SyncConfig::from_env().context("loading ENTITY_SYNC_* configuration")?;

    let mut metrics = match std::env::var("ENTITY_SYNC_METRICS_ADDR") {
        Ok(addr) => {
            let mut server = MetricsServer::new(addr.parse().context("parsing ENTITY_SYNC_METRICS_ADDR")?);
            server.start()?;
            Some(server)
        },
        Err(_) => None,
    };

    let (transport, requests) = LoopbackTransport::channel();
    let app = App::start(transport, &config);
    let server = seed()?.serve(Arc::clone(app.correlator()), requests);

    println!("=== Entity Sync Demo ===\n");

    // Reference data, unscoped
    for action in [
        AppAction::Tag(EntityAction::Fetch { call_id: None, params: json!({}) }),
        AppAction::Fabric(EntityAction::Fetch { call_id: None, params: json!({}) }),
        AppAction::Subnet(EntityAction::Fetch { call_id: None, params: json!({}) }),
        AppAction::Pod(EntityAction::Fetch { call_id: None, params: json!({}) }),
    ] {
        app.store.send(action).await?.wait().await;
    }

    // A view bound to ready machines only, in its own bucket
    let mut ready = app.bindings.machine_list.bind(&app.store);
    ready.bind(Some(ListQuery::new(json!({"status": "Ready"})))).await?;
    let bucket = ready.resolved(Duration::from_secs(5)).await?;
    println!(
        "Ready machines: {:?}",
        bucket.items.iter().map(|m| m.hostname.as_str()).collect::<Vec<_>>()
    );
    println!(
        "Canonical machine store untouched: {} items",
        app.store.state(|s| s.machines.items.len()).await
    );

    // A detail view keeps one machine live
    let mut detail = app.bindings.machine.bind(&app.store);
    detail.bind(Some("def456".to_string())).await?;
    let wombat = detail.resolved(Duration::from_secs(5)).await?;
    println!("Detail: {} ({})", wombat.hostname, wombat.status);

    // Operations track their own in-flight flag
    app.store
        .send(AppAction::Machine(EntityAction::Operate {
            op: MachineOperation::Deploy,
            id: "abc123".to_string(),
            params: json!({"osystem": "ubuntu", "distro_series": "noble"}),
        }))
        .await?;
    let deploying = app
        .store
        .state(|s| selectors::status(&s.machines, &"abc123".to_string(), MachineOperation::Deploy))
        .await;
    println!("abc123 deploying: {deploying}");

    // Another client renames a machine; the push reaches the store
    let mut actions = app.store.subscribe_actions();
    app.store
        .send(AppAction::Machine(EntityAction::Update {
            params: json!({"system_id": "def456", "hostname": "wombat-2"}),
        }))
        .await?;
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Ok(action) = actions.recv().await {
            if matches!(action, AppAction::Machine(EntityAction::UpdateNotify { .. })) {
                break;
            }
        }
    })
    .await
    .context("waiting for the update push")?;
    println!("Detail after push: {:?}", detail.read().await.map(|m| m.hostname));

    // Search across stores, memoized
    let search = MachineSearch::new();
    let filter = FilterItems::parse("tags:(=virtual) pod:lxd");
    let hits = app.store.state(|s| search.system_ids(s, &filter)).await;
    println!("Search {filter}: {hits:?}");

    // Natural-order grouping
    let groups = app
        .store
        .state(|s| {
            subnets_by_fabric(s)
                .iter()
                .map(|g| (g.label.clone(), g.count()))
                .collect::<Vec<_>>()
        })
        .await;
    println!("Subnets by fabric: {groups:?}");

    ready.release().await?;
    detail.release().await?;
    app.shutdown().await?;
    server.abort();

    if let Some(metrics) = metrics.take() {
        if let Some(text) = metrics.render() {
            println!("\n=== Metrics ===\n{text}");
        }
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
