use std::io::Cursor;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loglens_core::spawn_ingest;
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;

/// multipart field carrying the NDJSON file
pub const UPLOAD_FIELD: &str = "logfile";

#[derive(Debug, Serialize)]
struct UploadResponse {
    message: String,
    upload_id: Uuid,
    bytes: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
        }),
    )
        .into_response()
}

fn multipart_error(e: MultipartError) -> Response {
    log::warn!("Rejected upload: {}", e.body_text());
    error_response(e.status(), e.body_text())
}

/// accept an NDJSON file and ingest it in the background
///
/// replies as soon as the file is received; records show up on the live
/// stream while ingestion runs
pub(crate) async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_error(e),
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return multipart_error(e),
        };

        let upload_id = Uuid::new_v4();
        let size = bytes.len();
        log::info!(
            "Received {} ({} bytes), ingesting as {}",
            file_name,
            size,
            upload_id
        );

        // detached, the response does not wait for ingestion
        spawn_ingest(
            format!("{} [{}]", file_name, upload_id),
            Cursor::new(bytes),
            state.hub.clone(),
        );

        return (
            StatusCode::OK,
            Json(UploadResponse {
                message: "File received, processing started.".to_string(),
                upload_id,
                bytes: size,
            }),
        )
            .into_response();
    }

    error_response(
        StatusCode::BAD_REQUEST,
        format!("Missing file field `{}`", UPLOAD_FIELD),
    )
}
