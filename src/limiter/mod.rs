//! Rate-Limited Task Throttling Module
//!
//! This module provides the throttling subsystem: a windowed quota counter,
//! cancellable work tokens, a FIFO queue of pending tokens, a generic
//! actor-style inbox, and the orchestrator tying them together.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Throttler                         │
//! ├──────────────────────────────────────────────────────────┤
//! │  send_request ──► Token ──► Actor inbox ──► control loop │
//! │                                                │         │
//! │        ┌───────────────┬───────────────┐       │         │
//! │        ▼               ▼               ▼       │         │
//! │  ┌──────────┐    ┌───────────┐   ┌──────────┐  │         │
//! │  │   Rate   │    │TokenQueue │   │ in-flight│◄─┘         │
//! │  │  (quota) │    │  (FIFO)   │   │  (limit) │            │
//! │  └──────────┘    └───────────┘   └──────────┘            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Both gates (concurrency limit and window quota) must admit before a
//! token is dispatched; failing either gate enqueues the token, oldest
//! released first once capacity frees up.

pub mod actor;
pub mod error;
pub mod queue;
pub mod rate;
pub mod throttler;
pub mod token;

pub use actor::{Actor, WeakActor};
pub use error::{RateError, ThrottlerError};
pub use queue::TokenQueue;
pub use rate::Rate;
pub use throttler::Throttler;
pub use token::{Token, TokenMetadata};
