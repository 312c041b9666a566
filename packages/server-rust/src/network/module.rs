//! Network module with deferred startup.
//!
//! `new()` allocates shared state, `start()` binds the TCP listener and
//! `serve()` accepts connections until the shutdown future resolves. The
//! split lets callers register routers between binding and serving.

use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use axum::middleware::from_fn_with_state;
use axum::routing::{any, get};
use axum::Router;
use hyperroute_core::Representor;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    collection_operation_handler, health_handler, item_operation_handler,
    list_operations_handler, liveness_handler, readiness_handler, AppState,
};
use super::middleware::{admit_request, build_http_layers};
use super::shutdown::ShutdownController;
use crate::service::OperationDispatcher;

/// Assembles routes and middleware around `state`.
///
/// Routes:
/// - `GET /health`, `GET /health/live`, `GET /health/ready`
/// - `GET /api/{resource}` -- operation listing
/// - `* /api/{resource}/{operation}` -- collection dispatch
/// - `* /api/{resource}/{id}/{operation}` -- item dispatch
///
/// Only the `/api` routes are refused while draining; health checks keep answering.
pub fn build_app(state: AppState) -> Router {
    let layers = build_http_layers(&state.config);

    let api = Router::new()
        .route("/api/{resource}", get(list_operations_handler))
        .route("/api/{resource}/{operation}", any(collection_operation_handler))
        .route("/api/{resource}/{id}/{operation}", any(item_operation_handler))
        .route_layer(from_fn_with_state(
            Arc::clone(&state.shutdown),
            admit_request,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(api)
        .layer(layers)
        .with_state(state)
}

/// Owns the HTTP server lifecycle for one dispatcher.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    dispatcher: Arc<OperationDispatcher>,
    representor: Arc<dyn Representor>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    pub fn new(
        config: NetworkConfig,
        dispatcher: Arc<OperationDispatcher>,
        representor: Arc<dyn Representor>,
    ) -> Self {
        Self {
            config,
            listener: None,
            dispatcher,
            representor,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    fn app_state(&self) -> AppState {
        AppState::new(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.representor),
            Arc::clone(&self.shutdown),
            Arc::new(self.config.clone()),
        )
    }

    pub fn build_router(&self) -> Router {
        build_app(self.app_state())
    }

    /// Binds the listener and returns the bound port (OS-assigned for port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight dispatches.
    ///
    /// On the signal the health state moves to `Draining`, new dispatches
    /// get 503, and up to `drain_timeout` is spent waiting for the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .ok_or_else(|| anyhow!("start() must be called before serve()"))?;
        let controller = self.shutdown;

        let signal = {
            let controller = Arc::clone(&controller);
            async move {
                shutdown.await;
                info!("shutdown signal received, draining");
                controller.trigger_shutdown();
            }
        };

        controller.set_ready();
        info!("serving HTTP dispatch routes");

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        // A server that stopped on its own still goes through draining.
        controller.trigger_shutdown();
        if controller.wait_for_drain(self.config.drain_timeout).await {
            info!("all in-flight requests drained");
        } else {
            warn!(
                in_flight = controller.in_flight_count(),
                "drain timeout expired with requests still in flight"
            );
        }
        Ok(())
    }
}
