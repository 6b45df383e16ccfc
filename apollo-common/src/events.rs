//! Notification events pushed to the live notification stream
//!
//! Events are ephemeral: they are never persisted and carry only a title
//! and a body. The serialized form is the JSON payload of one SSE `data:`
//! frame.

use serde::{Deserialize, Serialize};

/// A single live notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub title: String,
    pub body: String,
}

impl NotificationEvent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Published once after every verification batch
    pub fn reports_validated() -> Self {
        Self::new(
            "Newly-validated Reports",
            "New reports have been automatically validated by the system.",
        )
    }

    /// Published after a report has been accepted for verification
    pub fn report_submitted(address: &str) -> Self {
        Self::new(
            "Newly-submitted Report",
            format!("A report has been submitted at {}", address),
        )
    }
}
