//! Core data models shared by the frontend and the reporter.
//!
//! Buckets and archives map to reporter tables via `sqlx::FromRow`; records
//! are the decoded rows the frontend serves from its orders database.

pub mod archive;
pub mod bucket;
pub mod record;
