//! Solve Execution Module
//!
//! Cooperative cancellation for one `solve` call (§5 of the concurrency model):
//! timeout enforcement checked at decision points and on propagator return.

mod timeout;

pub use timeout::{SolveCancelHandle, SolveTimeout, SolveTimeoutError};
