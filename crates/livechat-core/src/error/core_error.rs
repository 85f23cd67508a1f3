//! Core errors - raised only when constructing values from untrusted input

use thiserror::Error;

/// Core layer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid topic: {0:?}")]
    InvalidTopic(String),

    #[error("Invalid timeline capacity: {0}")]
    InvalidCapacity(usize),
}

impl CoreError {
    /// Get an error code string for diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTopic(_) => "INVALID_TOPIC",
            Self::InvalidCapacity(_) => "INVALID_CAPACITY",
        }
    }
}
