//! Startup wiring shared by the binary and the integration tests.

use crate::{
    config::{FrontendConfig, ReporterConfig},
    routes::routes,
    services::{
        archive_resolver::{AllowAll, ArchiveResolver, HostAllowList, ResolutionPolicy},
        archive_store::{self, ArchiveStore},
        order_service::OrderService,
        reporter_client::ReporterClient,
    },
    state::FrontendState,
};
use anyhow::{Context, Result};
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;

/// Connect to the orders database and build the frontend's shared state.
/// An unreachable database is fatal.
pub async fn frontend_state(cfg: &FrontendConfig) -> Result<FrontendState> {
    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await
        .with_context(|| format!("connecting to orders database {}", cfg.database_url))?;

    let policy: Arc<dyn ResolutionPolicy> = if cfg.allowed_archive_hosts.is_empty() {
        tracing::warn!(
            "absolute archive urls are not restricted; set --allowed-archive-host to limit them"
        );
        Arc::new(AllowAll)
    } else {
        Arc::new(HostAllowList::new(cfg.allowed_archive_hosts.iter().cloned()))
    };

    Ok(FrontendState {
        orders: OrderService::new(Arc::new(db)),
        resolver: ArchiveResolver::new(&cfg.reporter_endpoint, policy),
        reporter: ReporterClient::new(&cfg.reporter_endpoint, cfg.reporter_timeout)
            .context("building reporter client")?,
    })
}

pub fn frontend_app(state: FrontendState, spa_build_root: Option<&Path>) -> Router {
    routes::frontend_routes(spa_build_root).with_state(state)
}

/// Open the reporter's metadata database (creating it if needed), apply the
/// schema and open the configured bucket.
pub async fn reporter_store(cfg: &ReporterConfig) -> Result<ArchiveStore> {
    tokio::fs::create_dir_all(&cfg.storage_dir)
        .await
        .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;

    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let opts = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing database url {}", cfg.database_url))?
        .create_if_missing(true);
    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await
        .with_context(|| format!("connecting to metadata database {}", cfg.database_url))?;

    archive_store::migrate(&db).await?;
    let store = ArchiveStore::open(
        Arc::new(db),
        &cfg.storage_dir,
        &cfg.bucket,
        &cfg.static_region,
    )
    .await?;
    Ok(store)
}

pub fn reporter_app(store: ArchiveStore) -> Router {
    routes::reporter_routes().with_state(store)
}

/// Bind `addr` and serve `app` until the process stops. Falls back to
/// loopback when binding all interfaces is not permitted.
pub async fn serve(addr: &str, port: u16, app: Router) -> Result<()> {
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && addr.starts_with("0.0.0.0:") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
