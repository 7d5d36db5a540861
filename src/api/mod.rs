//! API endpoint modules.

pub mod health;
pub mod jobs;
pub mod openapi;
pub mod websocket;

pub use health::configure_health_routes;
pub use jobs::{PdfExport, configure_routes as configure_job_routes};
pub use openapi::ApiDoc;
pub use websocket::configure_routes as configure_websocket_routes;
