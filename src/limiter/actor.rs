//! Asynchronous Message Inbox
//!
//! This module provides `Actor`, a minimal fire-and-forget delivery handle
//! over a Tokio mpsc channel. The throttler uses it to feed control signals
//! to its background loop; it is generic so future command protocols
//! (reconfiguration, metrics snapshots) can reuse it.

use tokio::sync::mpsc;

/// Sending half of an actor-style inbox
///
/// Cloneable; `tell` never blocks and never fails from the sender's
/// perspective, even after the owning loop has exited.
#[derive(Debug)]
pub struct Actor<M> {
    inbox: Inbox<M>,
}

// Manual impls: a derive would demand `M: Clone`, but only the senders
// are cloned, and mpsc senders clone for any message type.
impl<M> Clone for Actor<M> {
    fn clone(&self) -> Self {
        Self {
            inbox: self.inbox.clone(),
        }
    }
}

#[derive(Debug)]
enum Inbox<M> {
    Unbounded(mpsc::UnboundedSender<M>),
    Bounded(mpsc::Sender<M>),
}

impl<M> Clone for Inbox<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Unbounded(tx) => Self::Unbounded(tx.clone()),
            Self::Bounded(tx) => Self::Bounded(tx.clone()),
        }
    }
}

impl<M: Send + 'static> Actor<M> {
    /// Create an actor with an unbounded inbox.
    ///
    /// Returns the sending handle and the receiver the owning loop
    /// consumes messages from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<M>) {
        let (tx, rx) = mpsc::unbounded_channel();

        (
            Self {
                inbox: Inbox::Unbounded(tx),
            },
            rx,
        )
    }

    /// Create an actor with a bounded inbox.
    ///
    /// Back-pressure policy: a message offered to a full inbox is dropped
    /// rather than blocking the sender.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<M>) {
        let (tx, rx) = mpsc::channel(capacity);

        (
            Self {
                inbox: Inbox::Bounded(tx),
            },
            rx,
        )
    }

    /// Asynchronously deliver `message` to the inbox.
    ///
    /// Fire-and-forget: if the receiver is gone or a bounded inbox is
    /// full, the message is silently discarded.
    pub fn tell(&self, message: M) {
        match &self.inbox {
            Inbox::Unbounded(tx) => {
                let _ = tx.send(message);
            }
            Inbox::Bounded(tx) => {
                let _ = tx.try_send(message);
            }
        }
    }

    /// Whether the owning loop has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        match &self.inbox {
            Inbox::Unbounded(tx) => tx.is_closed(),
            Inbox::Bounded(tx) => tx.is_closed(),
        }
    }

    /// Create a non-owning handle to this inbox.
    ///
    /// A weak handle does not keep the channel open, so a loop can hold
    /// one to its own inbox and still observe all external senders going
    /// away (its receiver yields `None`).
    pub fn downgrade(&self) -> WeakActor<M> {
        WeakActor {
            inbox: match &self.inbox {
                Inbox::Unbounded(tx) => WeakInbox::Unbounded(tx.downgrade()),
                Inbox::Bounded(tx) => WeakInbox::Bounded(tx.downgrade()),
            },
        }
    }
}

/// Non-owning counterpart of [`Actor`]
#[derive(Debug)]
pub struct WeakActor<M> {
    inbox: WeakInbox<M>,
}

#[derive(Debug)]
enum WeakInbox<M> {
    Unbounded(mpsc::WeakUnboundedSender<M>),
    Bounded(mpsc::WeakSender<M>),
}

impl<M: Send + 'static> WeakActor<M> {
    /// Recover a sending handle, or `None` once every [`Actor`] for this
    /// inbox has been dropped.
    pub fn upgrade(&self) -> Option<Actor<M>> {
        match &self.inbox {
            WeakInbox::Unbounded(tx) => tx.upgrade().map(|tx| Actor {
                inbox: Inbox::Unbounded(tx),
            }),
            WeakInbox::Bounded(tx) => tx.upgrade().map(|tx| Actor {
                inbox: Inbox::Bounded(tx),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tell_delivers_in_order() {
        let (actor, mut inbox) = Actor::channel();

        actor.tell("first");
        actor.tell("second");

        assert_eq!(inbox.recv().await, Some("first"));
        assert_eq!(inbox.recv().await, Some("second"));
    }

    #[tokio::test]
    async fn test_tell_after_receiver_dropped_is_silent() {
        let (actor, inbox) = Actor::channel();
        drop(inbox);

        actor.tell("orphaned");

        assert!(actor.is_closed());
    }

    #[tokio::test]
    async fn test_bounded_inbox_drops_overflow() {
        let (actor, mut inbox) = Actor::bounded(1);

        actor.tell(1);
        actor.tell(2);

        assert_eq!(inbox.recv().await, Some(1));
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clone_shares_inbox() {
        let (actor, mut inbox) = Actor::channel();
        let clone = actor.clone();

        clone.tell("from clone");

        assert_eq!(inbox.recv().await, Some("from clone"));
    }

    #[tokio::test]
    async fn test_clone_does_not_require_clonable_messages() {
        // Control commands carry boxed tasks, which are not Clone; the
        // handle must still clone because only the sender is duplicated.
        struct Opaque(#[allow(dead_code)] Box<dyn FnOnce() + Send>);

        let (actor, mut inbox) = Actor::<Opaque>::channel();
        let clone = actor.clone();

        clone.tell(Opaque(Box::new(|| {})));

        assert!(inbox.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_weak_handle_does_not_keep_inbox_alive() {
        let (actor, mut inbox) = Actor::channel();
        let weak = actor.downgrade();

        weak.upgrade().unwrap().tell(1);
        assert_eq!(inbox.recv().await, Some(1));

        drop(actor);

        assert!(weak.upgrade().is_none());
        assert_eq!(inbox.recv().await, None);
    }
}
