//! In-process publish/subscribe bus
//!
//! Topic-addressed messages are routed to listeners subscribed with MQTT-style
//! wildcard patterns, with an optional bound on concurrent dispatches. See
//! [`emitter`] for the full API.

pub mod core;
pub mod emitter;

pub use emitter::{
    Completion, Emitter, EmitterBuilder, EmitterConfig, EmitterError, EmitterResult, Listener,
    Message,
};
