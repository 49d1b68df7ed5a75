//! Services behind the HTTP handlers.
//!
//! Frontend: [`order_service`] (with [`row_marshaller`]), [`archive_resolver`]
//! and [`reporter_client`]. Reporter: [`archive_store`].

pub mod archive_resolver;
pub mod archive_store;
pub mod order_service;
pub mod reporter_client;
pub mod row_marshaller;
