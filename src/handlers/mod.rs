pub mod archive_handlers;
pub mod health_handlers;
pub mod order_handlers;
pub mod reporter_handlers;
