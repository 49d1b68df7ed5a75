//! `GET /api/orders`

use crate::{errors::AppError, models::record::Record, state::FrontendState};
use axum::{Json, extract::State};

/// The newest orders, at most 5000, newest first. Query or decode failures
/// come back as `400`.
pub async fn list_orders(
    State(state): State<FrontendState>,
) -> Result<Json<Vec<Record>>, AppError> {
    let orders = state.orders.recent_orders().await?;
    Ok(Json(orders))
}
