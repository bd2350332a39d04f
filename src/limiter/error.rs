//! Limiter Module Error Types
//!
//! This module defines the error types for one-shot lifecycle operations.
//! Rejected allocations and elapsed token deadlines are ordinary values,
//! not errors; only double-dispose and double-assign violations surface here.

/// Error types for rate lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    /// The rate was already disposed
    #[error("rate is already disposed")]
    AlreadyDisposed,

    /// The rate already has a parent throttler
    #[error("rate is already assigned to a throttler")]
    AlreadyAssigned,
}

/// Error types for throttler lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThrottlerError {
    /// Work was submitted after disposal
    #[error("throttler is disposed and no longer accepts work")]
    Disposed,

    /// The throttler was already disposed
    #[error("throttler is already disposed")]
    AlreadyDisposed,
}
