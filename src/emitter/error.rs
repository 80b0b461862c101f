//! Emitter Error Types

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitterError {
    #[error("emitter is closed")]
    Closed,

    #[error("emit queue is full (max length: {max_length})")]
    QueueFull { max_length: usize },

    #[error("precondition failed: {message}")]
    Precondition { message: String },

    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    #[error("dispatch of '{topic}' was abandoned before all listeners completed")]
    Abandoned { topic: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EmitterError {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        EmitterError::Precondition {
            message: message.into(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        EmitterError::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: String) -> Self {
        EmitterError::Internal { message }
    }
}

/// Result type for emitter operations
pub type EmitterResult<T> = Result<T, EmitterError>;
