#![allow(dead_code)]

use axum::Router;
use ecomm_reporter::{
    app,
    services::{
        archive_resolver::{ArchiveResolver, ResolutionPolicy},
        archive_store::{self, ArchiveStore},
        order_service::OrderService,
        reporter_client::ReporterClient,
    },
    state::FrontendState,
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Single-connection in-memory database; every pool gets its own.
pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

/// Serve `router` on an ephemeral loopback port and return its base url.
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub struct Reporter {
    pub base: String,
    pub store: ArchiveStore,
    _dir: TempDir,
}

pub async fn spawn_reporter() -> Reporter {
    let dir = TempDir::new().unwrap();
    let pool = memory_pool().await;
    archive_store::migrate(&pool).await.unwrap();
    let store = ArchiveStore::open(Arc::new(pool), dir.path(), "reports", "local")
        .await
        .unwrap();
    let base = spawn(app::reporter_app(store.clone())).await;
    Reporter {
        base,
        store,
        _dir: dir,
    }
}

pub fn frontend_state(
    reporter_base: &str,
    orders: SqlitePool,
    policy: Arc<dyn ResolutionPolicy>,
) -> FrontendState {
    FrontendState {
        orders: OrderService::new(Arc::new(orders)),
        resolver: ArchiveResolver::new(reporter_base, policy),
        reporter: ReporterClient::new(reporter_base, Duration::from_secs(5)).unwrap(),
    }
}

pub async fn spawn_frontend(state: FrontendState) -> String {
    spawn(app::frontend_app(state, None)).await
}
