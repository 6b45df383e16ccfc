//! HTTP API handlers for apollo-hv

pub mod health;
pub mod notifications;
pub mod reports;
pub mod verification;

pub use health::health_routes;
pub use notifications::notification_stream;
pub use reports::report_routes;
pub use verification::verification_routes;
