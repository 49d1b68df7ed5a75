//! Frontend archive endpoints. Archive I/O is forwarded to the reporter;
//! nothing is stored here.

use crate::{
    errors::AppError,
    models::archive::ArchiveCreated,
    state::FrontendState,
};
use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct ArchiveQuery {
    #[serde(rename = "archiveUrl")]
    pub archive_url: Option<String>,
}

/// `GET /api/archives[?archiveUrl=...]`
///
/// Without `archiveUrl` (or with an empty one) the reporter's listing is
/// returned. Otherwise the identifier is resolved and whatever the target
/// returns is passed back verbatim.
pub async fn get_archives(
    State(state): State<FrontendState>,
    Query(query): Query<ArchiveQuery>,
) -> Result<Response, AppError> {
    let archive_url = query.archive_url.unwrap_or_default();
    if archive_url.is_empty() {
        let listing = state.reporter.list().await?;
        return Ok(Json(listing).into_response());
    }

    let fetch_url = state.resolver.resolve(&archive_url)?;
    debug!("resolved archive `{}` to {}", archive_url, fetch_url);

    let upstream = state.reporter.fetch(&fetch_url).await?;
    let content_type = HeaderValue::from_str(&upstream.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let mut response = Response::new(Body::from(upstream.body));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    Ok(response)
}

/// `POST /api/archives`: stream the body to the reporter and answer with
/// the key it assigned.
pub async fn create_archive(
    State(state): State<FrontendState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let upstream_body = reqwest::Body::wrap_stream(body.into_data_stream());
    let key = state.reporter.create(upstream_body, content_type).await?;

    Ok((StatusCode::CREATED, Json(ArchiveCreated { url: key })))
}
