//! Task Throttler Library
//!
//! Rate-limited task throttling: callers submit deferred tasks to a
//! [`Throttler`], which dispatches them under a concurrency limit and a
//! fixed-window rate quota, queueing whatever cannot run yet and releasing
//! it oldest-first as capacity frees up.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use task_throttler::Throttler;
//!
//! #[tokio::main]
//! async fn main() {
//!     let throttler = Throttler::new(10, Duration::from_secs(1));
//!
//!     let token_id = throttler
//!         .send_request(async {
//!             // process one unit of work
//!         })
//!         .expect("throttler accepts work until disposed");
//!     println!("submitted {token_id}");
//!
//!     throttler.dispose().await.expect("first dispose succeeds");
//! }
//! ```

pub mod config;
pub mod limiter;

pub use config::ThrottlerConfig;
pub use limiter::{
    Actor, Rate, RateError, Throttler, ThrottlerError, Token, TokenMetadata, TokenQueue, WeakActor,
};
