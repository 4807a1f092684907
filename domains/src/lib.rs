//! # Entity Sync Domains
//!
//! Concrete entity stores built from the generic reducers, selectors and
//! bindings: tags, fabrics, spaces, subnets, machines, controllers and VM
//! hosts, combined into one application store.
//!
//! ## Example
//!
//! ```no_run
//! use entity_sync_core::action::EntityAction;
//! use entity_sync_domains::app::AppAction;
//! use entity_sync_domains::loopback::{LoopbackServer, LoopbackTransport};
//! use entity_sync_domains::models::Tag;
//! use entity_sync_domains::App;
//! use entity_sync_runtime::config::SyncConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (transport, requests) = LoopbackTransport::channel();
//! let app = App::start(transport, &SyncConfig::default());
//! LoopbackServer::new()
//!     .with_model(vec![Tag::new(1, "virtual")])?
//!     .serve(std::sync::Arc::clone(app.correlator()), requests);
//!
//! app.store
//!     .send(AppAction::Tag(EntityAction::Fetch { call_id: None, params: serde_json::json!({}) }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod bindings;
pub mod loopback;
pub mod models;
pub mod push;
pub mod selectors;

use app::{AppReducer, AppState, AppStore};
use bindings::Bindings;
use entity_sync_core::transport::{Correlator, Transport};
use entity_sync_runtime::config::SyncConfig;
use entity_sync_runtime::{Store, StoreError};
use push::AppRouter;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A running application: the store, its push pump and the binding
/// registries views share.
#[derive(Debug)]
pub struct App {
    /// The application store
    pub store: AppStore,
    /// Binding kinds for views
    pub bindings: Bindings,
    pump: JoinHandle<()>,
}

impl App {
    /// Wire a correlator over `transport`, build the store and start the
    /// push pump.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn start(transport: Arc<dyn Transport>, config: &SyncConfig) -> Self {
        let correlator = Arc::new(Correlator::with_push_capacity(transport, config.push_capacity));
        let environment = config.environment(Arc::clone(&correlator));
        let store = Store::with_config(AppState::default(), AppReducer::new(), environment, config);
        let pump = store.attach_pushes(AppRouter, correlator.subscribe_pushes());
        tracing::info!(request_timeout = ?config.request_timeout, "Entity sync started");

        Self {
            store,
            bindings: Bindings::new(),
            pump,
        }
    }

    /// The correlator responses must be delivered to.
    #[must_use]
    pub fn correlator(&self) -> &Arc<Correlator> {
        self.store.environment().correlator()
    }

    /// Shut the store down and wait for the push pump to stop.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects were still running
    /// when the configured shutdown timeout ran out.
    pub async fn shutdown(self) -> Result<(), StoreError> {
        let result = self.store.shutdown_default().await;
        self.pump.abort();
        if let Err(err) = self.pump.await {
            if !err.is_cancelled() {
                tracing::warn!(error = %err, "Push pump ended abnormally");
            }
        }
        result
    }
}
