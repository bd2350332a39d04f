//! Task Throttler
//!
//! This module provides `Throttler`, the orchestrator that accepts work
//! and dispatches it under two independent admission gates: a concurrency
//! limit on in-flight tasks and a fixed-window rate quota. Both gates must
//! admit before dispatch; failing either gate enqueues the work, it is
//! never dropped.
//!
//! All queue decisions happen on one background control loop fed through
//! an [`Actor`] inbox, so "in-flight" and "pending" stay disjoint without
//! extra locking.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::ThrottlerConfig;

use super::actor::{Actor, WeakActor};
use super::error::ThrottlerError;
use super::queue::TokenQueue;
use super::rate::Rate;
use super::token::Token;

/// Upper bound on how long `dispose` waits for the control loop to confirm
/// shutdown before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Control signals consumed by the throttler's background loop
#[derive(Debug)]
enum Command {
    /// A freshly wrapped token to dispatch or enqueue
    Submit(Arc<Token>),

    /// Capacity may have freed up; attempt to drain the queue
    CapacityFreed,

    /// Terminate the loop
    Shutdown,
}

/// Rate-limited task orchestrator
///
/// Owns one [`Rate`], one [`TokenQueue`], and one background control loop
/// that runs until disposal. Must be constructed within a Tokio runtime.
///
/// Dropping the throttler without calling `dispose` also stops the loop:
/// it holds only a weak handle to its own inbox, so once the throttler
/// and any in-flight completion watchers are gone the channel closes and
/// the loop exits on its own.
#[derive(Debug)]
pub struct Throttler {
    /// Process-unique id, also recorded as the rate's parent back-reference
    id: Uuid,

    /// Maximum concurrently in-flight tasks
    limit: u32,

    /// Owned per-window admission gate
    rate: Arc<Rate>,

    /// Sending handle for the control loop's inbox
    inbox: Actor<Command>,

    /// Count of dispatched tasks that have not yet completed
    in_flight: Arc<AtomicUsize>,

    /// Terminal flag, false -> true exactly once
    disposed: AtomicBool,

    /// Closed by the loop on exit; taken by `dispose` to bound shutdown
    loop_done: Mutex<Option<oneshot::Receiver<()>>>,
}

impl Throttler {
    /// Create a throttler whose rate quota equals the concurrency limit.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_rate(limit, Rate::new(limit, window))
    }

    /// Create a throttler from a [`ThrottlerConfig`].
    pub fn from_config(config: &ThrottlerConfig) -> Self {
        Self::with_rate(config.limit, Rate::new(config.quota(), config.window()))
    }

    /// Create a throttler around an explicit rate, decoupling the
    /// per-window quota from the concurrency limit.
    pub fn with_rate(limit: u32, rate: Rate) -> Self {
        let id = Uuid::new_v4();
        if let Err(error) = rate.assign_parent(id) {
            warn!(throttler_id = %id, %error, "rate already had a parent");
        }

        let rate = Arc::new(rate);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let (inbox, commands) = Actor::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let control = ControlLoop {
            id,
            limit: limit as usize,
            rate: Arc::clone(&rate),
            in_flight: Arc::clone(&in_flight),
            inbox: inbox.downgrade(),
            queue: TokenQueue::new(),
            retry_scheduled: false,
        };
        tokio::spawn(control.run(commands, done_tx));

        debug!(throttler_id = %id, limit, "throttler started");

        Self {
            id,
            limit,
            rate,
            inbox,
            in_flight,
            disposed: AtomicBool::new(false),
            loop_done: Mutex::new(Some(done_rx)),
        }
    }

    /// Submit a task for throttled execution.
    ///
    /// The task is wrapped in a [`Token`] and handed to the control loop,
    /// which dispatches it immediately when both admission gates pass or
    /// appends it to the pending queue for later release (oldest first).
    /// Returns the token id for correlation.
    ///
    /// Fails fast with [`ThrottlerError::Disposed`] after disposal instead
    /// of queueing work that would never run.
    pub fn send_request<F>(&self, task: F) -> Result<Uuid, ThrottlerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit(Token::new(task))
    }

    /// Like `send_request`, but the token is armed with a deadline.
    ///
    /// The deadline only caps how long the token's reported status stays
    /// winnable; a task already running is never cancelled.
    pub fn send_request_with_timeout<F>(
        &self,
        task: F,
        timeout: Duration,
    ) -> Result<Uuid, ThrottlerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit(Token::with_timeout(task, timeout))
    }

    fn submit(&self, token: Arc<Token>) -> Result<Uuid, ThrottlerError> {
        if self.disposed() {
            return Err(ThrottlerError::Disposed);
        }

        let id = token.id();
        trace!(throttler_id = %self.id, token_id = %id, "request accepted");
        self.inbox.tell(Command::Submit(token));

        Ok(id)
    }

    /// Shut down the throttler.
    ///
    /// Marks it disposed, disposes the owned rate, and signals the control
    /// loop to terminate, waiting at most [`SHUTDOWN_GRACE`] for the loop's
    /// done-indicator. Safe to call while the loop is mid-drain; the second
    /// call fails with [`ThrottlerError::AlreadyDisposed`].
    pub async fn dispose(&self) -> Result<(), ThrottlerError> {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ThrottlerError::AlreadyDisposed);
        }

        debug!(throttler_id = %self.id, "disposing throttler");

        if let Err(error) = self.rate.dispose() {
            debug!(throttler_id = %self.id, %error, "rate was already disposed");
        }

        // Fire-and-forget: delivery is a no-op if the loop already exited.
        self.inbox.tell(Command::Shutdown);

        let receiver = self.loop_done.lock().unwrap().take();
        if let Some(done) = receiver {
            // The loop closing its end resolves the receiver either way.
            if tokio::time::timeout(SHUTDOWN_GRACE, done).await.is_err() {
                warn!(throttler_id = %self.id, "control loop did not confirm shutdown in time");
            }
        }

        Ok(())
    }

    /// The throttler's unique identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The concurrency limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count of dispatched tasks that have not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Whether the throttler has been disposed.
    pub fn disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// The owned rate gate.
    pub fn rate(&self) -> &Rate {
        &self.rate
    }
}

/// State confined to the throttler's background loop (single writer)
struct ControlLoop {
    id: Uuid,
    limit: usize,
    rate: Arc<Rate>,
    in_flight: Arc<AtomicUsize>,
    /// Weak so the loop's receiver sees `None` once all senders are gone
    inbox: WeakActor<Command>,
    queue: TokenQueue,
    retry_scheduled: bool,
}

impl ControlLoop {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, _done: oneshot::Sender<()>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Submit(token) => {
                    self.queue.append(token);
                    self.drain();
                }
                Command::CapacityFreed => {
                    self.retry_scheduled = false;
                    self.drain();
                }
                Command::Shutdown => break,
            }
        }

        debug!(throttler_id = %self.id, pending = self.queue.len(), "control loop terminated");
        // Dropping `_done` here closes the done-indicator for `dispose`.
    }

    /// Dispatch queued tokens oldest-first while both gates admit.
    fn drain(&mut self) {
        while !self.queue.is_empty() {
            if self.in_flight.load(Ordering::SeqCst) >= self.limit {
                // A completion will deliver the next CapacityFreed.
                trace!(throttler_id = %self.id, pending = self.queue.len(), "all slots busy");
                return;
            }

            if !self.rate.allocate() {
                debug!(throttler_id = %self.id, pending = self.queue.len(), "window quota exhausted");
                self.schedule_retry();
                return;
            }

            if let Some(token) = self.queue.pop_front() {
                self.launch(token);
            }
        }
    }

    /// Begin concurrent execution of a token and watch for its completion.
    fn launch(&self, token: Arc<Token>) {
        let Some(handle) = token.resume() else {
            warn!(throttler_id = %self.id, token_id = %token.id(), "token was already resumed");
            return;
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        trace!(throttler_id = %self.id, token_id = %token.id(), "token dispatched");

        let in_flight = Arc::clone(&self.in_flight);
        // Upgraded now so the inbox stays open until this completion is
        // reported; fails only when every sender is already gone.
        let inbox = self.inbox.upgrade();
        tokio::spawn(async move {
            // Capacity is tied to task completion, not token status; a
            // timed-out token keeps its slot until the task finishes.
            let _ = handle.await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Some(inbox) = inbox {
                inbox.tell(Command::CapacityFreed);
            }
        });
    }

    /// Wake the loop one window from now when a drain stalled on the rate
    /// gate alone, so queued work is not stranded with every slot idle.
    fn schedule_retry(&mut self) {
        if self.retry_scheduled {
            return;
        }
        let Some(inbox) = self.inbox.upgrade() else {
            // Every sender is gone; the loop is about to exit anyway.
            return;
        };
        self.retry_scheduled = true;

        let (_, window) = self.rate.settings();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            inbox.tell(Command::CapacityFreed);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_throttler_creation() {
        let throttler = Throttler::new(5, Duration::from_secs(1));

        assert_eq!(throttler.limit(), 5);
        assert_eq!(throttler.in_flight(), 0);
        assert!(!throttler.disposed());

        let (quota, window) = throttler.rate().settings();
        assert_eq!(quota, 5);
        assert_eq!(window, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_rate_back_reference() {
        let throttler = Throttler::new(5, Duration::from_secs(1));

        assert_eq!(throttler.rate().parent(), Some(throttler.id()));
    }

    #[tokio::test]
    async fn test_with_rate_decouples_quota() {
        let throttler = Throttler::with_rate(2, Rate::new(100, Duration::from_secs(1)));

        assert_eq!(throttler.limit(), 2);
        assert_eq!(throttler.rate().settings().0, 100);
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = ThrottlerConfig::new(3, Duration::from_millis(500)).with_quota(30);
        let throttler = Throttler::from_config(&config);

        assert_eq!(throttler.limit(), 3);
        let (quota, window) = throttler.rate().settings();
        assert_eq!(quota, 30);
        assert_eq!(window, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_dispose_is_one_shot() {
        let throttler = Throttler::new(5, Duration::from_secs(1));

        assert!(throttler.dispose().await.is_ok());
        assert!(throttler.disposed());
        assert_eq!(
            throttler.dispose().await,
            Err(ThrottlerError::AlreadyDisposed)
        );
    }

    #[tokio::test]
    async fn test_dispose_also_disposes_rate() {
        let throttler = Throttler::new(5, Duration::from_secs(1));

        throttler.dispose().await.unwrap();

        assert!(throttler.rate().disposed());
        assert!(!throttler.rate().allocate());
    }

    #[tokio::test]
    async fn test_dropping_throttler_stops_control_loop() {
        let throttler = Throttler::new(2, Duration::from_secs(1));
        let done = throttler.loop_done.lock().unwrap().take().unwrap();

        drop(throttler);

        // With all senders gone the loop's receiver yields None and the
        // done-indicator closes; resolving either way means it exited.
        let exited = tokio::time::timeout(Duration::from_secs(1), done).await;
        assert!(exited.is_ok(), "control loop should exit when the throttler is dropped");
    }

    #[tokio::test]
    async fn test_send_request_after_dispose_fails_fast() {
        let throttler = Throttler::new(5, Duration::from_secs(1));
        throttler.dispose().await.unwrap();

        let result = throttler.send_request(async {});

        assert_eq!(result, Err(ThrottlerError::Disposed));
    }
}
