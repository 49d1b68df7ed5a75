//! Defines routes for both services.
//!
//! ## Frontend
//! - `GET  /api/orders`: newest orders as JSON records
//! - `GET  /api/archives`: reporter listing, or one archive via `?archiveUrl=`
//! - `POST /api/archives`: store the body through the reporter
//! - anything else: static SPA files when a build root is configured,
//!   otherwise a redirect to `/`
//!
//! ## Reporter
//! - `GET  /api/archives`: list archive keys
//! - `GET  /api/archives/{id}`: archive bytes
//! - `POST /api/archive`: store a new archive
//!
//! Both expose `/healthz` and `/readyz` and allow any CORS origin.

use crate::{
    handlers::{
        archive_handlers::{create_archive, get_archives},
        health_handlers::{frontend_readyz, healthz, reporter_readyz},
        order_handlers::list_orders,
        reporter_handlers,
    },
    services::archive_store::ArchiveStore,
    state::FrontendState,
};
use axum::{
    Router,
    handler::HandlerWithoutStateExt,
    response::Redirect,
    routing::{get, post},
};
use std::path::Path;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Unknown paths go back to the app root.
async fn redirect_home() -> Redirect {
    Redirect::permanent("/")
}

/// Build the frontend router. With `spa_build_root` set, unmatched paths
/// are served from that directory; anything still unmatched redirects home.
pub fn frontend_routes(spa_build_root: Option<&Path>) -> Router<FrontendState> {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(frontend_readyz))
        .route("/api/orders", get(list_orders))
        .route("/api/archives", get(get_archives).post(create_archive));

    let router = match spa_build_root {
        Some(root) => router
            .fallback_service(ServeDir::new(root).not_found_service(redirect_home.into_service())),
        None => router.fallback(redirect_home),
    };

    router.layer(cors()).layer(TraceLayer::new_for_http())
}

/// Build the reporter router.
pub fn reporter_routes() -> Router<ArchiveStore> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(reporter_readyz))
        .route("/api/archives", get(reporter_handlers::list_archives))
        .route("/api/archives/{id}", get(reporter_handlers::get_archive))
        .route("/api/archive", post(reporter_handlers::create_archive))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
}
