//! Application-wide error types.
//!
//! HTTP-level classification lives in [`crate::llm::LlmError`]; everything
//! else funnels into `AppError` so callers handle one type.

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum AppError {
    /// A required identifier or argument was missing or empty.
    #[error("validation error: {0}")]
    Validation(String),

    /// Persistence layer failure (SQLite open/read/write).
    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn validation_error_display() {
        let e = AppError::Validation("conversation id required".into());
        assert!(e.to_string().contains("conversation id required"));
        assert!(e.to_string().starts_with("validation error"));
    }

    #[test]
    fn store_error_display() {
        let e = AppError::Store("disk full".into());
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn llm_error_converts() {
        let e: AppError = LlmError::RateLimited.into();
        assert!(matches!(e, AppError::Llm(LlmError::RateLimited)));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        // satisfies std::error::Error trait
        let _: &dyn Error = &e;
    }
}
