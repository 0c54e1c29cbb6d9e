//! Solve Timeout Module
//!
//! Cooperative cancellation/timeout enforcement for one `solve` call (§5).
//!
//! ## Design
//!
//! Uses a combination of:
//! - Atomic flag for cooperative cancellation
//! - Timeout wrapper checked at decision points
//!
//! The CDNL engine checks the flag before each decision and whenever a
//! propagator returns control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The wall-clock budget for a `solve` call was exceeded.
#[derive(Debug, Clone)]
pub struct SolveTimeoutError {
    pub timeout: Duration,
    pub elapsed: Duration,
}

impl std::fmt::Display for SolveTimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "solve exceeded timeout of {:?} (ran for {:?})", self.timeout, self.elapsed)
    }
}

impl std::error::Error for SolveTimeoutError {}

/// Cooperative cancellation/timeout controller for one solving call.
/// Cloneable so the orchestrator and a `SolveCancelHandle` given to the
/// caller share the same underlying flag.
#[derive(Clone)]
pub struct SolveTimeout {
    cancelled: Arc<AtomicBool>,
    start_time: Instant,
    timeout_duration: Option<Duration>,
}

impl SolveTimeout {
    pub fn new(timeout: Option<Duration>) -> Self {
        SolveTimeout {
            cancelled: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
            timeout_duration: timeout,
        }
    }

    pub fn infinite() -> Self {
        SolveTimeout::new(None)
    }

    /// Checked before each decision and on propagator return. Returns `Err`
    /// once cancelled or timed out.
    pub fn check(&self) -> Result<(), SolveTimeoutError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(SolveTimeoutError {
                timeout: self.timeout_duration.unwrap_or(Duration::ZERO),
                elapsed: self.start_time.elapsed(),
            });
        }
        if let Some(timeout) = self.timeout_duration {
            let elapsed = self.start_time.elapsed();
            if elapsed > timeout {
                self.cancelled.store(true, Ordering::Relaxed);
                return Err(SolveTimeoutError { timeout, elapsed });
            }
        }
        Ok(())
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn cancel_handle(&self) -> SolveCancelHandle {
        SolveCancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

impl Default for SolveTimeout {
    fn default() -> Self {
        SolveTimeout::new(None)
    }
}

/// Handle for cancelling a solve call from outside the orchestrator loop.
#[derive(Clone)]
pub struct SolveCancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl SolveCancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_timeout_never_cancels() {
        let timeout = SolveTimeout::new(None);
        assert!(timeout.check().is_ok());
        assert!(!timeout.is_cancelled());
    }

    #[test]
    fn explicit_cancellation_is_observed() {
        let timeout = SolveTimeout::new(Some(Duration::from_secs(10)));
        timeout.cancel();
        assert!(timeout.check().is_err());
    }

    #[test]
    fn cancel_handle_cancels_shared_flag() {
        let timeout = SolveTimeout::new(Some(Duration::from_secs(10)));
        let handle = timeout.cancel_handle();
        handle.cancel();
        assert!(timeout.is_cancelled());
    }

    #[test]
    fn timeout_fires_after_duration_elapses() {
        let timeout = SolveTimeout::new(Some(Duration::from_millis(5)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(timeout.check().is_err());
    }
}
