//! Prometheus metrics for observability and monitoring.
//!
//! Metric families:
//! - `store.*`: action processing, reducer timing, effect execution, shutdown
//! - `sync.responses.*` / `sync.request.*`: correlated call outcomes and latency
//! - `sync.pushes.*`: push routing
//! - `sync.bindings.*`: binding lifecycle
//!
//! # Example
//!
//! ```rust,no_run
//! use entity_sync_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics exporter.
///
/// Installs the global recorder; the rendered text is served by whatever
/// HTTP layer the application already has.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create an exporter that will be advertised at `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g. by an earlier test), this
    /// logs a warning and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Address the exporter is advertised at.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    // Store
    describe_counter!("store.commands.total", "Actions processed by the store");
    describe_histogram!("store.reducer.duration_seconds", "Time spent in the reducer per action");
    describe_histogram!("store.effects.count", "Effects returned per action");
    describe_counter!("store.effects.executed", "Effects executed, by type");
    describe_counter!("store.shutdown.initiated", "Shutdowns started");
    describe_counter!("store.shutdown.completed", "Shutdowns that drained every effect");
    describe_counter!("store.shutdown.timeout", "Shutdowns that gave up on running effects");
    describe_counter!("store.shutdown.rejected_actions", "Actions rejected during shutdown");

    // Correlated calls
    describe_counter!(
        "sync.responses.total",
        "Correlated call outcomes (success, error, forgotten)"
    );
    describe_histogram!(
        "sync.request.duration_seconds",
        "Time from sending a request to its outcome, by model"
    );

    // Pushes
    describe_counter!("sync.pushes.total", "Pushes by outcome (routed, ignored, undecodable)");
    describe_counter!("sync.pushes.lagged", "Pushes skipped because the pump fell behind");

    // Bindings
    describe_counter!("sync.bindings.requests", "Requests issued by bindings");
    describe_counter!("sync.bindings.unsubscribes", "Unsubscribes issued by the last consumer");
    describe_gauge!("sync.bindings.live", "Call ids currently held by bindings");
}

/// Push pump metrics recorder.
pub struct PushMetrics;

impl PushMetrics {
    /// A push became an action.
    pub fn record_routed() {
        counter!("sync.pushes.total", "outcome" => "routed").increment(1);
    }

    /// A push for a model nobody handles.
    pub fn record_ignored() {
        counter!("sync.pushes.total", "outcome" => "ignored").increment(1);
    }

    /// A push whose payload did not decode.
    pub fn record_undecodable() {
        counter!("sync.pushes.total", "outcome" => "undecodable").increment(1);
    }

    /// The pump fell behind and lost pushes.
    pub fn record_lagged(skipped: u64) {
        counter!("sync.pushes.lagged").increment(skipped);
    }
}

/// Binding metrics recorder.
pub struct BindingMetrics;

impl BindingMetrics {
    /// A binding took a fresh call id.
    pub fn record_bind() {
        gauge!("sync.bindings.live").increment(1.0);
    }

    /// A binding issued (or reissued) its request.
    pub fn record_request() {
        counter!("sync.bindings.requests").increment(1);
    }

    /// A binding released its call id.
    pub fn record_release(unsubscribed: bool) {
        gauge!("sync.bindings.live").decrement(1.0);
        if unsubscribed {
            counter!("sync.bindings.unsubscribes").increment(1);
        }
    }
}
