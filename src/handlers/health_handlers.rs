//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok"), both services
//! - GET /readyz   -> readiness; the frontend checks its orders database, the
//!   reporter checks its metadata database and disk I/O

use crate::{services::archive_store::ArchiveStore, state::FrontendState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe. Never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz` on the frontend.
pub async fn frontend_readyz(State(state): State<FrontendState>) -> impl IntoResponse {
    let mut checks = HashMap::new();
    checks.insert("database", sqlite_check(&state.orders.db).await);
    ready_response(checks)
}

/// `GET /readyz` on the reporter.
///
/// 1. Runs `SELECT 1` against the metadata database.
/// 2. Performs a write/read/delete under the storage base path.
pub async fn reporter_readyz(State(store): State<ArchiveStore>) -> impl IntoResponse {
    let mut checks = HashMap::new();
    checks.insert("sqlite", sqlite_check(&store.db).await);
    checks.insert("disk", disk_check(&store).await);
    ready_response(checks)
}

async fn sqlite_check(db: &SqlitePool) -> CheckStatus {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(db).await {
        Ok(1) => CheckStatus::ok(),
        Ok(v) => CheckStatus::failed(format!("unexpected result: {}", v)),
        Err(e) => CheckStatus::failed(format!("error: {}", e)),
    }
}

async fn disk_check(store: &ArchiveStore) -> CheckStatus {
    let tmp_path = store
        .base_path
        .join(format!(".readyz-{}", Uuid::new_v4()));

    if let Err(e) = fs::write(&tmp_path, b"readyz").await {
        return CheckStatus::failed(format!("could not write tmp file: {}", e));
    }
    let status = match fs::read(&tmp_path).await {
        Ok(bytes) if bytes == b"readyz" => CheckStatus::ok(),
        Ok(_) => CheckStatus::failed("file content mismatch".to_string()),
        Err(e) => CheckStatus::failed(format!("could not read tmp file: {}", e)),
    };
    match fs::remove_file(&tmp_path).await {
        Err(e) if status.ok => CheckStatus {
            ok: true,
            error: Some(format!("could not remove tmp file: {}", e)),
        },
        _ => status,
    }
}

fn ready_response(checks: HashMap<&'static str, CheckStatus>) -> impl IntoResponse {
    let overall_ok = checks.values().all(|c| c.ok);
    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}
