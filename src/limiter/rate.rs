//! Fixed-Window Rate Counter
//!
//! This module provides `Rate`, a lock-free fixed-window quota counter.
//! At most `quota` allocations are admitted per window; once the window
//! elapses the counter resets and capacity is restored.
//!
//! The window-reset check and the increment are applied as a single
//! compare-and-swap over one packed atomic word, so concurrent callers
//! racing across a window boundary can never over-admit.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use super::error::RateError;

/// Bits of the packed state word reserved for the in-window count. The
/// remaining 40 bits of window-start milliseconds cover ~34 years of
/// process uptime.
const COUNT_BITS: u32 = 24;
const COUNT_MASK: u64 = (1 << COUNT_BITS) - 1;

/// Highest count representable in the packed word, and therefore the
/// quota ceiling. A saturated counter is left untouched; with the quota
/// clamped below it, every further attempt in the window is over quota.
const COUNT_SATURATED: u64 = COUNT_MASK;

fn pack(start_ms: u64, count: u64) -> u64 {
    (start_ms << COUNT_BITS) | count
}

fn unpack(state: u64) -> (u64, u64) {
    (state >> COUNT_BITS, state & COUNT_MASK)
}

/// Fixed-window quota counter
///
/// Cheap to share behind an `Arc`; `allocate` never suspends and is safe
/// under arbitrary concurrent callers.
#[derive(Debug)]
pub struct Rate {
    /// Maximum admissions per window
    quota: u32,

    /// Window length
    window: Duration,

    /// Packed `(window_start_ms << 16) | count`, milliseconds since `anchor`
    state: AtomicU64,

    /// Reference point for window-start timestamps
    anchor: Instant,

    /// Terminal flag, false -> true exactly once
    disposed: AtomicBool,

    /// Non-owning back-reference to the owning throttler, set at most once
    parent: OnceLock<Uuid>,
}

impl Rate {
    /// Create a new rate with the given quota and window.
    ///
    /// The first window starts immediately with a count of zero. Quotas
    /// above 2^24 − 1 are clamped to that ceiling so the packed counter
    /// can always represent one admission past the quota.
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            quota: quota.min(COUNT_MASK as u32),
            window,
            state: AtomicU64::new(pack(0, 0)),
            anchor: Instant::now(),
            disposed: AtomicBool::new(false),
            parent: OnceLock::new(),
        }
    }

    /// Get the configured quota and window.
    pub fn settings(&self) -> (u32, Duration) {
        (self.quota, self.window)
    }

    /// Attempt to allocate one admission in the current window.
    ///
    /// Returns true iff the admission fits within the quota. A disposed
    /// rate admits nothing. Rejection is not an error; it is the signal
    /// that the caller should queue or retry after the window resets.
    pub fn allocate(&self) -> bool {
        if self.disposed() {
            return false;
        }

        let now_ms = self.anchor.elapsed().as_millis() as u64;
        let window_ms = self.window.as_millis() as u64;
        let quota = self.quota as u64;

        let mut state = self.state.load(Ordering::SeqCst);
        loop {
            let (start_ms, count) = unpack(state);

            let (next, admitted) = if now_ms.saturating_sub(start_ms) >= window_ms {
                // Window elapsed: reset and take the first slot of the new
                // window in the same atomic step.
                (pack(now_ms, 1), 1 <= quota)
            } else if count == COUNT_SATURATED {
                // Quota is clamped below the saturation point, so this
                // attempt is over quota no matter how many preceded it.
                return false;
            } else {
                (pack(start_ms, count + 1), count + 1 <= quota)
            };

            match self
                .state
                .compare_exchange_weak(state, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return admitted,
                Err(actual) => {
                    state = actual;
                }
            }
        }
    }

    /// Record the owning throttler's id as a non-owning back-reference.
    ///
    /// A rate belongs to at most one throttler for its whole lifetime.
    pub fn assign_parent(&self, throttler_id: Uuid) -> Result<(), RateError> {
        self.parent
            .set(throttler_id)
            .map_err(|_| RateError::AlreadyAssigned)
    }

    /// Get the owning throttler's id, if one was assigned.
    pub fn parent(&self) -> Option<Uuid> {
        self.parent.get().copied()
    }

    /// Mark the rate disposed. The second call is an error, not a no-op.
    pub fn dispose(&self) -> Result<(), RateError> {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RateError::AlreadyDisposed);
        }

        debug!(quota = self.quota, "rate disposed");

        Ok(())
    }

    /// Whether the rate has been disposed.
    pub fn disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}
