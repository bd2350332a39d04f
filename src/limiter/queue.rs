//! Pending Token Queue
//!
//! FIFO of tokens awaiting dispatch. The queue is owned exclusively by one
//! throttler control loop (single writer), so it needs no internal locking;
//! cross-task handoff happens over the loop's inbox instead.

use std::collections::VecDeque;
use std::sync::Arc;

use super::token::Token;

/// Ordered sequence of pending tokens, oldest first
#[derive(Debug, Default)]
pub struct TokenQueue {
    items: VecDeque<Arc<Token>>,
}

impl TokenQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token to the tail.
    pub fn append(&mut self, token: Arc<Token>) {
        self.items.push_back(token);
    }

    /// Remove and return the oldest token, or `None` if the queue is empty.
    ///
    /// Dispatched tokens leave the queue; `len` reflects pending work only.
    pub fn pop_front(&mut self) -> Option<Arc<Token>> {
        self.items.pop_front()
    }

    /// Number of pending tokens.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no pending tokens.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let mut queue = TokenQueue::new();
        let first = Token::new(async {});
        let second = Token::new(async {});
        let third = Token::new(async {});

        queue.append(Arc::clone(&first));
        queue.append(Arc::clone(&second));
        queue.append(Arc::clone(&third));
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.pop_front().unwrap().id(), first.id());
        assert_eq!(queue.pop_front().unwrap().id(), second.id());
        assert_eq!(queue.pop_front().unwrap().id(), third.id());
        assert!(queue.pop_front().is_none());
    }

    #[tokio::test]
    async fn test_pop_removes_entries() {
        let mut queue = TokenQueue::new();
        queue.append(Token::new(async {}));

        assert_eq!(queue.len(), 1);
        assert!(queue.pop_front().is_some());
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
    }
}
