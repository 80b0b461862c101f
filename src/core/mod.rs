//! Core infrastructure shared by the emitter

pub mod logging;
pub mod sync;
