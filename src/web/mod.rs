//! HTTP adapter for the editor frontend.
//!
//! Maps the editor's routes onto the workspace, the change stream, and the
//! snapshot archiver. Routes:
//!
//! | Method | Path                    | Handler                     |
//! |--------|-------------------------|-----------------------------|
//! | GET    | `/state`                | full state plus layouts     |
//! | POST   | `/upload`               | multipart `images[]`        |
//! | POST   | `/delete-image`         | form field `name` (image id)|
//! | POST   | `/save-pages`           | JSON `{pages, pageCount}`   |
//! | GET    | `/get-pages`            | `{pages}`                   |
//! | GET    | `/pages/stream`         | server-sent change events   |
//! | POST   | `/state/reset`          | clear the workspace         |
//! | GET    | `/state/export`         | snapshot zip download       |
//! | POST   | `/state/import`         | multipart `state` archive   |
//! | POST   | `/templates`            | overlay PNG data URLs       |
//! | POST   | `/layouts/{name}/render`| render a layout template    |
//! | GET    | `/uploads/*`            | uploaded assets             |

mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::archive::SnapshotArchiver;
use crate::error::{CldError, Result};
use crate::stream::StreamConfig;
use crate::workspace::Workspace;

pub use error::ApiError;

/// Upper bound on request bodies (uploads and imported archives).
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<Workspace>,
    pub archiver: Arc<SnapshotArchiver>,
    pub stream: StreamConfig,
}

impl AppState {
    pub fn new(workspace: Arc<Workspace>, stream: StreamConfig) -> Self {
        let archiver = Arc::new(SnapshotArchiver::new(&workspace));
        Self {
            workspace,
            archiver,
            stream,
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.workspace.uploads_dir());

    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/state/reset", post(handlers::reset_state))
        .route("/state/export", get(handlers::export_state))
        .route("/state/import", post(handlers::import_state))
        .route("/upload", post(handlers::upload_images))
        .route("/delete-image", post(handlers::delete_image))
        .route("/save-pages", post(handlers::save_pages))
        .route("/get-pages", get(handlers::get_pages))
        .route("/pages/stream", get(handlers::pages_stream))
        .route("/templates", post(handlers::save_overlays))
        .route("/layouts/{name}/render", post(handlers::render_layout))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| CldError::WebServerFailed {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    let local = listener.local_addr()?;
    info!(addr = %local, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CldError::WebServerFailed {
            addr: local.to_string(),
            reason: e.to_string(),
        })?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
