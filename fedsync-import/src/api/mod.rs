//! HTTP administration API for fedsync-import

pub mod health;
pub mod import_sync;

pub use health::health_routes;
pub use import_sync::import_routes;
