//! Two cooperating services for eCommerce reporting.
//!
//! - The **frontend** serves recent orders from its own database and proxies
//!   archive reads and writes to the reporter.
//! - The **reporter** stores opaque archive blobs in a bucket and hands them
//!   back by key.

pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
