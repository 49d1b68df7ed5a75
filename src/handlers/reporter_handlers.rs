//! Reporter HTTP handlers. Streams archive bodies in and out and delegates
//! storage concerns to `ArchiveStore`.

use crate::{
    errors::AppError,
    models::archive::{Archive, ArchiveUrl, StoredArchive},
    services::archive_store::ArchiveStore,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::io;
use tokio_util::io::ReaderStream;
use tracing::info;

/// `GET /api/archives`: every archive in the bucket.
pub async fn list_archives(
    State(store): State<ArchiveStore>,
) -> Result<Json<Vec<ArchiveUrl>>, AppError> {
    Ok(Json(store.list().await?))
}

/// `GET /api/archives/{id}`: the stored bytes, streamed.
pub async fn get_archive(
    State(store): State<ArchiveStore>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let (meta, file) = store.open_reader(&id).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_archive_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// `POST /api/archive`: store the body under a new timestamp key.
pub async fn create_archive(
    State(store): State<ArchiveStore>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let archive = store.put_stream(stream, content_type).await?;
    info!("stored archive {} ({} bytes)", archive.key, archive.size_bytes);

    Ok((
        StatusCode::CREATED,
        Json(StoredArchive { key: archive.key }),
    ))
}

fn set_archive_headers(headers: &mut HeaderMap, meta: &Archive) {
    let content_type = meta
        .content_type
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(meta.size_bytes.max(0)),
    );

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.etag)) {
        headers.insert(header::ETAG, value);
    }

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
