//! Automated verification on/off switch
//!
//! Written by the control endpoint, read by the scheduler once per
//! iteration and before each report. Starts disabled; nothing persists it.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Process-wide gate for the verification scheduler
#[derive(Debug, Default)]
pub struct VerificationToggle {
    enabled: AtomicBool,
}

impl VerificationToggle {
    /// New toggle, disabled
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self) {
        self.set(true);
    }

    pub fn disable(&self) {
        self.set(false);
    }

    /// Set the state; returns the previous one
    pub fn set(&self, enabled: bool) -> bool {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(
                "Automated verification is now {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        previous
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_starts_disabled() {
        assert!(!VerificationToggle::new().is_enabled());
    }

    #[test]
    fn test_enable_disable() {
        let toggle = VerificationToggle::new();
        toggle.enable();
        assert!(toggle.is_enabled());
        toggle.disable();
        assert!(!toggle.is_enabled());
        assert!(!toggle.set(true));
        assert!(toggle.set(true));
    }

    #[tokio::test]
    async fn test_visible_across_tasks() {
        let toggle = Arc::new(VerificationToggle::new());
        let writer = Arc::clone(&toggle);
        tokio::spawn(async move { writer.enable() }).await.unwrap();
        assert!(toggle.is_enabled());
    }
}
