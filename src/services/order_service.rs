//! Read-only access to the frontend's `orders` table.

use crate::{
    models::record::Record,
    services::row_marshaller::{self, MarshalError},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Upper bound on rows returned by [`OrderService::recent_orders`].
pub const ORDER_ROW_LIMIT: usize = 5000;

const RECENT_ORDERS_SQL: &str = "SELECT * FROM orders ORDER BY id DESC LIMIT 5000";

#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Query(#[from] sqlx::Error),
    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

#[derive(Clone)]
pub struct OrderService {
    pub db: Arc<SqlitePool>,
}

impl OrderService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// The newest orders by primary id, at most [`ORDER_ROW_LIMIT`] of them.
    ///
    /// The table's columns are not known ahead of time; every row is decoded
    /// through the row marshaller.
    pub async fn recent_orders(&self) -> Result<Vec<Record>, OrderError> {
        let rows = sqlx::query(RECENT_ORDERS_SQL).fetch_all(&*self.db).await?;
        debug!("fetched {} order rows", rows.len());
        Ok(row_marshaller::marshal(&rows)?)
    }
}
