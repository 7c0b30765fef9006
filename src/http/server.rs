//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the health route and the wrapped application
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Apply configuration reloads by swapping the health engine

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::health::{BuildError, HealthEngine, Registry};
use crate::http::request::{self, RequestIdExt, RequestIdState};
use crate::observability::metrics;

/// Engine shared between request handlers and the reload loop.
pub type SharedEngine = Arc<ArcSwap<HealthEngine>>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build health checks: {0}")]
    Build(#[from] BuildError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
    pub listening_port: u16,
}

/// HTTP server for the health endpoint.
pub struct HttpServer {
    config: AppConfig,
    registry: Registry,
    application: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the built-in backends.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: Registry::builtin(),
            application: Router::new().fallback(no_application),
        }
    }

    /// Use a custom backend registry.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Application receiving every request not addressed to the health path.
    pub fn with_application(mut self, application: Router) -> Self {
        self.application = application;
        self
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build a router for a service listening on `listening_port`.
    pub fn router(&self, listening_port: u16) -> Result<Router, ServerError> {
        let (router, _) = self.assemble(listening_port)?;
        Ok(router)
    }

    fn assemble(&self, listening_port: u16) -> Result<(Router, SharedEngine), ServerError> {
        let engine = HealthEngine::from_config(&self.config.healthcheck, &self.registry)?;
        let engine: SharedEngine = Arc::new(ArcSwap::from_pointee(engine));
        let state = AppState {
            engine: engine.clone(),
            listening_port,
        };
        Ok((self.build_router(state), engine))
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(&self, state: AppState) -> Router {
        let routes = Router::new()
            .route(&self.config.healthcheck.path, get(healthcheck_handler))
            .with_state(state)
            .fallback_service(self.application.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.listener.request_timeout_secs,
            )));

        // Outside the timeout so timed out responses still carry the ID.
        request::wrap(routes, RequestIdState::from_config(&self.config.request_id))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let (app, engine) = self.assemble(addr.port())?;

        tracing::info!(
            address = %addr,
            path = %self.config.healthcheck.path,
            backends = ?self.config.healthcheck.backends,
            detailed = self.config.healthcheck.detailed,
            "HTTP server starting"
        );

        let reloader = tokio::spawn(apply_config_updates(
            engine,
            self.registry.clone(),
            self.config.clone(),
            config_updates,
        ));

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Swap in a freshly built engine for every accepted configuration.
///
/// Only the healthcheck backends are rebuilt. Every other setting is bound
/// at startup; differences from `startup` are reported and otherwise ignored.
async fn apply_config_updates(
    engine: SharedEngine,
    registry: Registry,
    startup: AppConfig,
    mut updates: mpsc::UnboundedReceiver<AppConfig>,
) {
    while let Some(update) = updates.recv().await {
        let pending = restart_required(&startup, &update);
        if !pending.is_empty() {
            tracing::warn!(sections = ?pending, "Configuration changes take effect after restart");
        }

        match HealthEngine::from_config(&update.healthcheck, &registry) {
            Ok(next) => {
                engine.store(Arc::new(next));
                tracing::info!(backends = ?update.healthcheck.backends, "Health checks reloaded");
            }
            Err(e) => {
                tracing::error!(error = %e, "Reloaded configuration rejected, keeping current health checks");
            }
        }
    }
}

/// Settings in `update` that differ from the running server and cannot be
/// applied without a restart.
fn restart_required(startup: &AppConfig, update: &AppConfig) -> Vec<&'static str> {
    let mut sections = Vec::new();
    if update.healthcheck.path != startup.healthcheck.path {
        sections.push("healthcheck.path");
    }
    if update.listener != startup.listener {
        sections.push("listener");
    }
    if update.request_id != startup.request_id {
        sections.push("request_id");
    }
    if update.observability != startup.observability {
        sections.push("observability");
    }
    sections
}

async fn healthcheck_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let accept = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let request_id = request
        .request_id()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string());

    let engine = state.engine.load_full();
    let rendered = engine.respond(state.listening_port, accept.as_deref()).await;

    tracing::debug!(
        request_id = %request_id,
        status = rendered.status.as_u16(),
        content_type = rendered.content_type.as_str(),
        "Healthcheck evaluated"
    );
    metrics::record_response(rendered.status.as_u16());

    rendered.into_response()
}

async fn no_application() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
