//! Cancellable Work Tokens
//!
//! This module provides `Token`, a schedulable unit of deferred work with
//! its own completion/timeout lifecycle. The wrapped task never runs until
//! `resume` is called; an optional deadline races against completion.
//!
//! The terminal transition is a single compare-and-set over a three-state
//! word, so the deadline waiter and the completion callback can never both
//! claim the outcome: whichever writes first decides it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::trace;
use uuid::Uuid;

/// The deferred work a token carries, opaque to the subsystem.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Waiting for `resume`, or un-timed and never resumed.
const PENDING: u8 = 0;
/// The task ran to completion before any deadline fired.
const SUCCEEDED: u8 = 1;
/// The deadline fired first; a still-running task no longer affects status.
const TIMED_OUT: u8 = 2;

/// A cancellable unit of deferred work
///
/// Constructors return `Arc<Token>` so the token can sit in a queue while
/// its deadline waiter and completion callback hold their own references.
pub struct Token {
    /// Process-unique id for correlation and logging
    id: Uuid,

    /// Creation timestamp
    created_at: DateTime<Utc>,

    /// Optional deadline; `None` means the token never times out
    timeout: Option<Duration>,

    /// The deferred task, taken exactly once by `resume`
    task: Mutex<Option<Task>>,

    /// Terminal state shared with the deadline waiter and the completion
    /// callback
    lifecycle: Arc<Lifecycle>,
}

/// State written by the two racing actors: the deadline waiter and the
/// completion callback
#[derive(Debug)]
struct Lifecycle {
    /// Terminal state word, written once via compare-and-set
    state: AtomicU8,

    /// Fired on completion so the deadline waiter wakes early
    finished: Notify,
}

impl Lifecycle {
    /// Single-writer transition out of `PENDING`; first caller wins.
    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Token {
    /// Create an un-timed token. The task does not run until `resume`.
    pub fn new<F>(task: F) -> Arc<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Arc::new(Self::build(Box::pin(task), None))
    }

    /// Create a token armed with a deadline.
    ///
    /// Spawns a waiter that blocks until the deadline elapses or the token
    /// completes, whichever comes first. If the deadline fires first the
    /// token is done with a failed status, even if the task later runs to
    /// completion. Must be called within a Tokio runtime.
    pub fn with_timeout<F>(task: F, timeout: Duration) -> Arc<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = Arc::new(Self::build(Box::pin(task), Some(timeout)));

        let id = token.id;
        let lifecycle = Arc::clone(&token.lifecycle);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    if lifecycle.transition(TIMED_OUT) {
                        trace!(token_id = %id, "token deadline elapsed");
                    }
                }
                _ = lifecycle.finished.notified() => {}
            }
        });

        token
    }

    fn build(task: Task, timeout: Option<Duration>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            timeout,
            task: Mutex::new(Some(task)),
            lifecycle: Arc::new(Lifecycle {
                state: AtomicU8::new(PENDING),
                finished: Notify::new(),
            }),
        }
    }

    /// Schedule the wrapped task for concurrent execution.
    ///
    /// Returns a handle that resolves when the task finishes, or `None` if
    /// the token was already resumed. On completion the token is marked
    /// done/succeeded (unless the deadline won the race) and the deadline
    /// waiter is unblocked. Must be called within a Tokio runtime.
    pub fn resume(&self) -> Option<JoinHandle<()>> {
        let task = self.task.lock().unwrap().take()?;

        let id = self.id;
        let lifecycle = Arc::clone(&self.lifecycle);
        Some(tokio::spawn(async move {
            task.await;

            if lifecycle.transition(SUCCEEDED) {
                trace!(token_id = %id, "token completed");
            }
            lifecycle.finished.notify_one();
        }))
    }

    /// The token's unique identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the token reached a terminal state.
    pub fn done(&self) -> bool {
        self.lifecycle.state.load(Ordering::SeqCst) != PENDING
    }

    /// Whether the task ran to completion before any deadline fired.
    /// Only meaningful once `done` is true.
    pub fn status(&self) -> bool {
        self.lifecycle.state.load(Ordering::SeqCst) == SUCCEEDED
    }

    /// The configured deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// When the token was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Observability record for the host's logging/tracing context.
    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            object: "token",
            id: self.id.to_string(),
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for Token {
    // The boxed task is opaque; report the observable lifecycle instead.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("timeout", &self.timeout)
            .field("done", &self.done())
            .field("status", &self.status())
            .finish()
    }
}

/// Data-only metadata record attached to external logging contexts
#[derive(Debug, Clone, Serialize)]
pub struct TokenMetadata {
    /// Record kind, always `"token"`
    pub object: &'static str,

    /// The token's id
    pub id: String,

    /// The token's creation timestamp
    pub created_at: DateTime<Utc>,
}
