use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use sensorhub_core::provider::InsightProvider;
use sensorhub_store::Database;

use crate::broadcast::BroadcastRegistry;
use crate::handlers::{self, HandlerState};
use crate::live;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_send_queue: usize,
    pub insight_max_readings: u32,
    pub insight_temperature: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            max_send_queue: 256,
            insight_max_readings: 200,
            insight_temperature: 0.3,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub handlers: Arc<HandlerState>,
    pub registry: Arc<BroadcastRegistry>,
}

/// Build the Axum router. Every route is served at the root and again under `/api`.
pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        .route(
            "/sensors",
            get(handlers::list_sensors).post(handlers::create_sensor),
        )
        .route("/sensors/data", post(handlers::ingest_reading))
        .route(
            "/sensors/{id}",
            get(handlers::get_sensor).delete(handlers::delete_sensor),
        )
        .route(
            "/sensors/{id}/readings",
            get(handlers::list_readings).delete(handlers::delete_readings),
        )
        .route("/sensors/{id}/insights", get(handlers::sensor_insights))
        .route(
            "/aux-process-data",
            get(handlers::list_process_data).post(handlers::create_process_record),
        )
        .route("/health", get(health_handler))
        .route("/ws", get(live::ws_handler));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Create and start the server.
pub async fn start(
    config: ServerConfig,
    db: Database,
    insight: Option<Arc<dyn InsightProvider>>,
) -> Result<ServerHandle, std::io::Error> {
    let registry = Arc::new(BroadcastRegistry::new(config.max_send_queue));
    let handler_state = HandlerState::new(db).with_insight(
        insight,
        config.insight_max_readings,
        config.insight_temperature,
    );

    let app_state = AppState {
        handlers: Arc::new(handler_state),
        registry: Arc::clone(&registry),
    };

    let router = build_router(app_state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, "sensorhub server started");

    let server = tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router).await {
            tracing::error!(%error, "server stopped");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        registry,
        server,
    })
}

/// Handle returned by `start()`; keeps the serving task alive.
pub struct ServerHandle {
    pub port: u16,
    registry: Arc<BroadcastRegistry>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Number of open live-update connections.
    pub fn connections(&self) -> usize {
        self.registry.count()
    }

    /// Stop accepting requests and drop the serving task.
    pub fn shutdown(self) {
        self.server.abort();
    }
}

/// `GET /health`: a trivial store round-trip plus the live connection count.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.registry.count();
    match state.handlers.db.ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "connections": connections,
            })),
        ),
        Err(error) => {
            tracing::error!(%error, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "connections": connections,
                    "detail": error.to_string(),
                })),
            )
        }
    }
}
