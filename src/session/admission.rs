//! Admission controller
//!
//! Gatekeeps session creation with a sliding-window rate limiter and a hard
//! concurrent-capacity ceiling. Failure is immediately fatal to the creation
//! call; there is no retry at this layer.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::{Error, Result};

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Session-creation gatekeeper
pub struct AdmissionController {
    max_sessions: usize,
    max_per_minute: usize,
    /// Creation-attempt timestamps within the trailing window, compacted in
    /// place on every admission check.
    window: Mutex<Vec<Instant>>,
}

impl AdmissionController {
    /// Create a controller with the given ceilings
    pub fn new(max_sessions: usize, max_per_minute: usize) -> Self {
        Self {
            max_sessions,
            max_per_minute,
            window: Mutex::new(Vec::new()),
        }
    }

    /// Configured maximum concurrent sessions
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Decide whether a new session may be created.
    ///
    /// The attempt timestamp is recorded after the rate check but before the
    /// capacity check, so a capacity-rejected attempt still consumes rate
    /// budget.
    pub fn admit(&self, live_sessions: usize) -> Result<()> {
        let now = Instant::now();
        let mut window = self
            .window
            .lock()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;

        // In-place compaction, O(current window)
        window.retain(|t| now.duration_since(*t) < RATE_WINDOW);

        if window.len() >= self.max_per_minute {
            return Err(Error::rate_limit_exceeded(format!(
                "{} session creations in the last 60s (limit {})",
                window.len(),
                self.max_per_minute
            )));
        }

        window.push(now);

        if live_sessions >= self.max_sessions {
            return Err(Error::capacity_exceeded(format!(
                "{} live sessions (limit {})",
                live_sessions, self.max_sessions
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_window() {
        let controller = AdmissionController::new(100, 2);

        assert!(controller.admit(0).is_ok());
        assert!(controller.admit(1).is_ok());

        let result = controller.admit(2);
        assert!(matches!(result.unwrap_err(), Error::RateLimitExceeded(_)));

        // Window slides past the earliest timestamps
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(controller.admit(2).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_ceiling() {
        let controller = AdmissionController::new(2, 100);

        assert!(controller.admit(0).is_ok());
        assert!(controller.admit(1).is_ok());

        let result = controller.admit(2);
        assert!(matches!(result.unwrap_err(), Error::CapacityExceeded(_)));

        // One slot freed: exactly one more admission succeeds
        assert!(controller.admit(1).is_ok());
        let result = controller.admit(2);
        assert!(matches!(result.unwrap_err(), Error::CapacityExceeded(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_rejection_consumes_rate_budget() {
        let controller = AdmissionController::new(0, 2);

        // Both attempts bounce off capacity, but their timestamps count
        assert!(matches!(
            controller.admit(0).unwrap_err(),
            Error::CapacityExceeded(_)
        ));
        assert!(matches!(
            controller.admit(0).unwrap_err(),
            Error::CapacityExceeded(_)
        ));
        assert!(matches!(
            controller.admit(0).unwrap_err(),
            Error::RateLimitExceeded(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_window_slide() {
        let controller = AdmissionController::new(100, 2);

        assert!(controller.admit(0).is_ok());
        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(controller.admit(0).is_ok());

        // First timestamp still inside the window
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(matches!(
            controller.admit(0).unwrap_err(),
            Error::RateLimitExceeded(_)
        ));

        // First timestamp expired, second still live
        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(controller.admit(0).is_ok());
    }
}
