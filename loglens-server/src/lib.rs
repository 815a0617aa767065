// loglens-server - HTTP surface for LogLens
//
// Routes:
//   POST /upload     multipart NDJSON upload, ingested in the background
//   GET  /ws         live stream, one text frame per record
//   GET  /api/stats  hub counters
//   *                static files

mod desc;
mod stream;
mod upload;

pub use desc::{DEFAULT_PORT, DEFAULT_STATIC_DIR, ServerDesc};
pub use upload::UPLOAD_FIELD;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use loglens_core::{Hub, HubHandle, HubStats};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

/// shared by every request handler
#[derive(Clone)]
pub struct AppState {
    hub: HubHandle,
    viewer_outbox: usize,
    write_timeout: Duration,
}

impl AppState {
    pub fn new(hub: HubHandle, desc: &ServerDesc) -> Self {
        Self {
            hub,
            viewer_outbox: desc.hub.viewer_outbox,
            write_timeout: desc.write_timeout,
        }
    }
}

pub fn router(state: AppState, desc: &ServerDesc) -> Router {
    Router::new()
        .route("/upload", post(upload::upload_handler))
        .route("/ws", get(stream::stream_handler))
        .route("/api/stats", get(stats_handler))
        .layer(DefaultBodyLimit::max(desc.max_upload_bytes))
        .fallback_service(ServeDir::new(&desc.static_dir))
        .with_state(state)
}

async fn stats_handler(State(state): State<AppState>) -> Response {
    match state.hub.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// run the server on `listener` until `shutdown` resolves
///
/// starts its own hub; on shutdown every viewer is closed and the hub's
/// final counters are returned
pub async fn serve<F>(listener: TcpListener, desc: &ServerDesc, shutdown: F) -> Result<HubStats>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (hub, hub_task) = Hub::spawn(&desc.hub);
    let app = router(AppState::new(hub.clone(), desc), desc);

    log::info!("LogLens listening on http://{}", listener.local_addr()?);
    log::info!("Serving static files from {}", desc.static_dir.display());

    let closing_hub = hub.clone();
    let signal = async move {
        shutdown.await;
        log::info!("Shutting down, closing all viewers");
        if let Err(e) = closing_hub.shutdown().await {
            log::debug!("Hub already stopped: {}", e);
        }
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signal)
    .await?;

    drop(hub);
    let stats = hub_task.await?;
    log::info!(
        "Hub stopped after {} broadcasts to {} viewers ({} deliveries, {} dropped)",
        stats.broadcasts,
        stats.registered_total,
        stats.deliveries,
        stats.dropped
    );
    Ok(stats)
}
