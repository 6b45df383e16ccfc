//! # Apollo Common Library
//!
//! Shared code for the Apollo incident-reporting services:
//! - Record models (reports, verdicts, media blobs)
//! - SQLite schema provisioning and default settings
//! - Notification event type
//! - Bootstrap configuration and root folder resolution

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::NotificationEvent;
