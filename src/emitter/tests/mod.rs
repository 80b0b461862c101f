//! Test modules for the emitter
//!
//! Scenario suites exercising the emitter through its public surface,
//! organised by functional area.

mod dispatch;
mod support;
