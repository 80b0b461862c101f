//! Emitter configuration
//!
//! Configuration is fixed at construction time. It can be assembled in code
//! with [`EmitterBuilder`], or loaded from TOML:
//!
//! ```toml
//! concurrency = 4
//! separator = "/"
//! wildcard_one = "+"
//! wildcard_some = "#"
//! match_empty_levels = true
//! max_queue_length = 1000
//! ```

use crate::emitter::bus::Emitter;
use crate::emitter::error::{EmitterError, EmitterResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Pending-queue length at which a stalled queue is reported
pub const DEFAULT_LEAK_WARNING_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitterConfig {
    /// Maximum number of dispatches in flight, 0 for unbounded
    pub concurrency: usize,
    /// Topic level separator
    pub separator: char,
    /// Pattern token matching exactly one level
    pub wildcard_one: String,
    /// Pattern token matching zero or more trailing levels
    pub wildcard_some: String,
    /// Whether the single-level wildcard matches an empty level
    pub match_empty_levels: bool,
    /// Reject saturated emits once this many messages are pending
    pub max_queue_length: Option<usize>,
    /// Pending-queue length that triggers the one-shot leak warning, 0 disables it
    pub leak_warning_threshold: usize,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            concurrency: 0,
            separator: '/',
            wildcard_one: "+".to_string(),
            wildcard_some: "#".to_string(),
            match_empty_levels: true,
            max_queue_length: None,
            leak_warning_threshold: DEFAULT_LEAK_WARNING_THRESHOLD,
        }
    }
}

impl EmitterConfig {
    /// Check that the topic alphabet is unambiguous
    pub fn validate(&self) -> EmitterResult<()> {
        for (name, token) in [
            ("wildcard_one", &self.wildcard_one),
            ("wildcard_some", &self.wildcard_some),
        ] {
            if token.is_empty() {
                return Err(EmitterError::configuration(format!(
                    "{name} must not be empty"
                )));
            }
            if token.contains(self.separator) {
                return Err(EmitterError::configuration(format!(
                    "{name} '{token}' must not contain the separator '{}'",
                    self.separator
                )));
            }
        }

        if self.wildcard_one == self.wildcard_some {
            return Err(EmitterError::configuration(format!(
                "wildcard_one and wildcard_some must differ (both '{}')",
                self.wildcard_one
            )));
        }

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> EmitterResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| EmitterError::configuration(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file
    pub async fn load(path: impl AsRef<Path>) -> EmitterResult<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            EmitterError::configuration(format!(
                "failed to read configuration file {}: {e}",
                path.display()
            ))
        })?;

        log::debug!("Loaded emitter configuration from {}", path.display());
        Self::from_toml_str(&contents)
    }

    pub(crate) fn is_bounded(&self) -> bool {
        self.concurrency > 0
    }
}

/// Fluent builder for [`Emitter`]
///
/// ```rust
/// use mqbus::emitter::EmitterBuilder;
///
/// let emitter = EmitterBuilder::new()
///     .concurrency(2)
///     .separator('.')
///     .wildcard_some("*")
///     .build()
///     .unwrap();
///
/// assert_eq!(emitter.concurrency(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmitterBuilder {
    config: EmitterConfig,
}

impl EmitterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: EmitterConfig) -> Self {
        Self { config }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.config.separator = separator;
        self
    }

    pub fn wildcard_one(mut self, token: impl Into<String>) -> Self {
        self.config.wildcard_one = token.into();
        self
    }

    pub fn wildcard_some(mut self, token: impl Into<String>) -> Self {
        self.config.wildcard_some = token.into();
        self
    }

    pub fn match_empty_levels(mut self, enabled: bool) -> Self {
        self.config.match_empty_levels = enabled;
        self
    }

    pub fn max_queue_length(mut self, max_length: usize) -> Self {
        self.config.max_queue_length = Some(max_length);
        self
    }

    pub fn leak_warning_threshold(mut self, threshold: usize) -> Self {
        self.config.leak_warning_threshold = threshold;
        self
    }

    pub fn build(self) -> EmitterResult<Emitter> {
        Emitter::with_config(self.config)
    }
}
