//! Topic-based Message Emitter
//!
//! An in-process publish/subscribe bus. Listeners subscribe to topic patterns
//! with single-level (`+`) and multi-level (`#`) wildcards; emitted messages
//! are fanned out to every matching listener, and each listener signals a
//! [`Completion`] when it is done.
//!
//! # Overview
//!
//! - **Pattern Matching**: segment trie keyed on a configurable separator
//! - **Fan-out Completion**: an emit callback fires only after every matched
//!   listener has completed
//! - **Concurrency Bound**: at most `concurrency` dispatches in flight, the
//!   rest wait in a FIFO (0 means unbounded)
//! - **Lifecycle**: a one-way close that rejects further emits
//!
//! # Architecture
//!
//! ```text
//!   emit(message)
//!        │
//!        ▼
//! ┌──────────────┐  slot free   ┌──────────────────┐  matches   ┌───────────────┐
//! │   Governor   │─────────────▶│ SubscriptionReg. │───────────▶│  Listener 1   │
//! │ ┌──┬──┬──┐   │              │  (TopicMatcher)  │            │  Listener 2   │
//! │ │m3│m2│m1│   │              └──────────────────┘            │      ...      │
//! │ └──┴──┴──┘   │                                              └───────┬───────┘
//! └──────▲───────┘                                                      │ done.complete()
//!        │ release                                                      ▼
//!        └──────────────────── fan-out countdown reaches zero ◀─────────┘
//!                              (emit callback runs first)
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use mqbus::emitter::{Emitter, Listener, Message};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let emitter = Emitter::builder().concurrency(4).build()?;
//!
//! let audit = Listener::from_future_fn(|message: Arc<Message>| async move {
//!     println!("{} -> {:?}", message.topic, message.payload());
//! });
//! emitter.on("orders/#", &audit)?;
//!
//! emitter
//!     .publish(Message::with_payload("orders/42/created", json!({"total": 10})))
//!     .await?;
//!
//! emitter.remove_listener("orders/#", &audit)?;
//! emitter.close().await;
//! # Ok(())
//! # }
//! ```

mod bus;
mod config;
mod error;
mod fanout;
mod governor;
mod listener;
mod matcher;
mod message;
mod registry;

pub use bus::Emitter;
pub use config::{EmitterBuilder, EmitterConfig, DEFAULT_LEAK_WARNING_THRESHOLD};
pub use error::{EmitterError, EmitterResult};
pub use fanout::Completion;
pub use governor::EmitCallback;
pub use listener::{AsyncHandler, Handler, Listener, ListenerId};
pub use matcher::TopicMatcher;
pub use message::{Message, PAYLOAD_FIELD};

#[cfg(test)]
mod tests;
