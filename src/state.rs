//! Shared state handed to the frontend's handlers.

use crate::services::{
    archive_resolver::ArchiveResolver, order_service::OrderService,
    reporter_client::ReporterClient,
};

/// Everything a frontend request may touch. Cheap to clone; the pool and
/// HTTP client inside are shared.
#[derive(Clone)]
pub struct FrontendState {
    pub orders: OrderService,
    pub resolver: ArchiveResolver,
    pub reporter: ReporterClient,
}
