//! Route handlers. Store and filesystem work runs on the blocking pool.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::io::Write;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Form, Multipart, Path, State};
use axum::http::{HeaderName, header};
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error};

use super::AppState;
use super::error::ApiError;
use crate::archive::validate_archive_name;
use crate::error::{CldError, Result};
use crate::stream::{StreamEvent, stream_changes};
use crate::workspace::{ImageItem, Page};

/// Multipart field names accepted for image uploads.
const UPLOAD_FIELDS: &[&str] = &["images[]", "images"];
/// Multipart field name carrying an import archive.
const ARCHIVE_FIELD: &str = "state";
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";
const STREAM_BUFFER: usize = 8;

async fn blocking<T, F>(f: F) -> std::result::Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError(CldError::Other(format!("blocking task failed: {e}"))))?
        .map_err(ApiError)
}

fn payload_err(e: MultipartError) -> ApiError {
    ApiError(CldError::InvalidPayload(e.body_text()))
}

fn ok() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// === State ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StateResponse {
    images: Vec<ImageItem>,
    pages: Vec<Page>,
    page_count: usize,
    layouts: BTreeMap<String, String>,
    templates: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
}

/// GET /state
pub(super) async fn get_state(
    State(state): State<AppState>,
) -> std::result::Result<Json<StateResponse>, ApiError> {
    let workspace = Arc::clone(&state.workspace);
    let snapshot = blocking(move || workspace.snapshot()).await?;
    let catalog = state.workspace.catalog();

    Ok(Json(StateResponse {
        images: snapshot.images,
        pages: snapshot.pages,
        page_count: snapshot.page_count,
        layouts: catalog.layouts().clone(),
        templates: catalog.templates().clone(),
        styles: catalog.styles().clone(),
    }))
}

/// POST /state/reset
pub(super) async fn reset_state(
    State(state): State<AppState>,
) -> std::result::Result<Json<Value>, ApiError> {
    let workspace = Arc::clone(&state.workspace);
    blocking(move || workspace.reset()).await?;
    Ok(ok())
}

// === Images ===

fn is_image_name(name: &str) -> bool {
    FsPath::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// POST /upload
///
/// Files whose extension is not an accepted image type are skipped.
pub(super) async fn upload_images(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<Vec<ImageItem>>, ApiError> {
    let mut multipart = multipart?;
    let mut received = 0;
    let mut created = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(payload_err)? {
        if !field.name().is_some_and(|name| UPLOAD_FIELDS.contains(&name)) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        received += 1;
        if !is_image_name(&filename) {
            debug!(filename, "Skipping non-image upload");
            continue;
        }

        let bytes = field.bytes().await.map_err(payload_err)?;
        let workspace = Arc::clone(&state.workspace);
        created.push(blocking(move || workspace.save_uploaded_asset(&filename, &bytes)).await?);
    }

    if received == 0 {
        return Err(ApiError(CldError::MissingField("images[]")));
    }
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
pub(super) struct DeleteImageForm {
    name: Option<String>,
}

/// POST /delete-image
pub(super) async fn delete_image(
    State(state): State<AppState>,
    form: std::result::Result<Form<DeleteImageForm>, FormRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let Form(form) = form?;
    let id = form
        .name
        .filter(|id| !id.is_empty())
        .ok_or(CldError::MissingField("name"))?;

    let workspace = Arc::clone(&state.workspace);
    blocking(move || workspace.delete_image(&id)).await?;
    Ok(ok())
}

// === Pages ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SavePagesRequest {
    pages: Vec<Page>,
    /// Accepted for compatibility; the stored count is `pages.len()`.
    #[serde(default)]
    page_count: Option<usize>,
}

/// POST /save-pages
pub(super) async fn save_pages(
    State(state): State<AppState>,
    request: std::result::Result<Json<SavePagesRequest>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let Json(request) = request?;
    if let Some(declared) = request.page_count.filter(|&n| n != request.pages.len()) {
        debug!(declared, actual = request.pages.len(), "Ignoring declared page count");
    }

    let workspace = Arc::clone(&state.workspace);
    blocking(move || workspace.set_pages(&request.pages)).await?;
    Ok(ok())
}

/// GET /get-pages
pub(super) async fn get_pages(
    State(state): State<AppState>,
) -> std::result::Result<Json<Value>, ApiError> {
    let workspace = Arc::clone(&state.workspace);
    let pages = blocking(move || workspace.pages()).await?;
    Ok(Json(json!({ "pages": pages })))
}

/// GET /pages/stream
pub(super) async fn pages_stream(State(state): State<AppState>) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let source = Arc::clone(&state.workspace);
    let config = state.stream;
    tokio::spawn(async move {
        let end = stream_changes(source, tx, config).await;
        debug!(?end, "Change stream closed");
    });

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(sse_frames(rx, to_sse)),
    )
}

/// Encodes stream events as SSE frames. The first event that fails to
/// encode ends the stream, which closes the connection.
fn sse_frames<F>(
    rx: mpsc::Receiver<StreamEvent>,
    mut encode: F,
) -> impl Stream<Item = std::result::Result<Event, Infallible>>
where
    F: FnMut(&StreamEvent) -> Result<Event> + Send + 'static,
{
    ReceiverStream::new(rx).map_while(move |event| match encode(&event) {
        Ok(sse) => Some(Ok(sse)),
        Err(e) => {
            error!(error = %e, "Failed to encode stream event, closing stream");
            None
        }
    })
}

fn to_sse(event: &StreamEvent) -> Result<Event> {
    if let StreamEvent::Retry(delay) = event {
        return Ok(Event::default().retry(*delay));
    }
    let mut sse = Event::default();
    if let Some(name) = event.name() {
        sse = sse.event(name);
    }
    if let Some(data) = event.data()? {
        sse = sse.data(data);
    }
    Ok(sse)
}

// === Snapshots ===

/// GET /state/export
pub(super) async fn export_state(
    State(state): State<AppState>,
) -> std::result::Result<Response, ApiError> {
    let archiver = Arc::clone(&state.archiver);
    let (file_name, bytes) = blocking(move || {
        let exported = archiver.export()?;
        let bytes = std::fs::read(&exported.path);
        if let Err(e) = std::fs::remove_file(&exported.path) {
            debug!(path = %exported.path.display(), error = %e, "Ignoring export cleanup failure");
        }
        Ok((exported.file_name(), bytes?))
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub(super) struct ImportResponse {
    status: &'static str,
    pages: Vec<Page>,
    images: Vec<ImageItem>,
}

/// POST /state/import
pub(super) async fn import_state(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<ImportResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(payload_err)? {
        if field.name() != Some(ARCHIVE_FIELD) {
            continue;
        }
        validate_archive_name(field.file_name().unwrap_or_default())?;
        upload = Some(field.bytes().await.map_err(payload_err)?);
        break;
    }
    let bytes = upload.ok_or(CldError::MissingField(ARCHIVE_FIELD))?;

    let archiver = Arc::clone(&state.archiver);
    let workspace = Arc::clone(&state.workspace);
    let snapshot = blocking(move || {
        let mut staged = tempfile::Builder::new()
            .prefix("cld-upload-")
            .suffix(".zip")
            .tempfile()?;
        staged.write_all(&bytes)?;
        staged.flush()?;
        archiver.import(staged.path())?;
        workspace.snapshot()
    })
    .await?;

    Ok(Json(ImportResponse {
        status: "ok",
        pages: snapshot.pages,
        images: snapshot.images,
    }))
}

// === Layouts ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Overlay {
    name: String,
    data_url: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct OverlayRequest {
    overlays: Vec<Overlay>,
}

fn decode_png_data_url(url: &str) -> Option<Vec<u8>> {
    BASE64.decode(url.strip_prefix(PNG_DATA_URL_PREFIX)?).ok()
}

/// POST /templates
///
/// Overlays with an empty name or a payload that is not a base64 PNG data
/// URL are skipped.
pub(super) async fn save_overlays(
    State(state): State<AppState>,
    request: std::result::Result<Json<OverlayRequest>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let Json(request) = request?;
    let decoded: Vec<(String, Vec<u8>)> = request
        .overlays
        .into_iter()
        .filter_map(|overlay| {
            let name = overlay.name.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let Some(bytes) = decode_png_data_url(&overlay.data_url) else {
                debug!(name, "Skipping overlay without a PNG data URL");
                return None;
            };
            Some((name, bytes))
        })
        .collect();

    let workspace = Arc::clone(&state.workspace);
    let saved = blocking(move || {
        Ok(decoded
            .iter()
            .filter_map(|(name, bytes)| match workspace.save_overlay(name, bytes) {
                Ok(file_name) => Some(file_name),
                Err(e) => {
                    debug!(name, error = %e, "Skipping overlay");
                    None
                }
            })
            .collect::<Vec<_>>())
    })
    .await?;

    Ok(Json(json!({ "saved": saved })))
}

/// POST /layouts/{name}/render
pub(super) async fn render_layout(
    State(state): State<AppState>,
    Path(name): Path<String>,
    data: std::result::Result<Json<Value>, JsonRejection>,
) -> std::result::Result<Html<String>, ApiError> {
    let Json(data) = data?;
    Ok(Html(state.workspace.render_layout(&name, &data)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_name() {
        assert!(is_image_name("cat.png"));
        assert!(is_image_name("CAT.JPEG"));
        assert!(is_image_name("a.b.webp"));
        assert!(!is_image_name("notes.txt"));
        assert!(!is_image_name("png"));
    }

    #[test]
    fn test_decode_png_data_url() {
        assert_eq!(
            decode_png_data_url("data:image/png;base64,iVBORw==").as_deref(),
            Some(&b"\x89PNG"[..])
        );
        assert!(decode_png_data_url("data:image/jpeg;base64,iVBORw==").is_none());
        assert!(decode_png_data_url("data:image/png;base64,***").is_none());
    }

    #[tokio::test]
    async fn test_encode_failure_ends_stream() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(StreamEvent::Retry(std::time::Duration::from_millis(5000)))
            .await
            .unwrap();
        tx.send(StreamEvent::Keepalive).await.unwrap();
        tx.send(StreamEvent::Retry(std::time::Duration::from_millis(5000)))
            .await
            .unwrap();
        drop(tx);

        let frames: Vec<_> = sse_frames(rx, |event| match event {
            StreamEvent::Keepalive => Err(CldError::Serialization("boom".into())),
            other => to_sse(other),
        })
        .collect()
        .await;
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_retry_event_has_no_name() {
        let event = StreamEvent::Retry(std::time::Duration::from_millis(5000));
        assert!(to_sse(&event).is_ok());
        assert!(to_sse(&StreamEvent::Keepalive).is_ok());
    }
}
