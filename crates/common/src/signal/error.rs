//! 信号/回执错误类型定义

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Signal not found")]
    NotFound,

    #[error("Execution already recorded for this (signal, device) pair")]
    DuplicateExecution,
}

impl From<sqlx::Error> for SignalError {
    fn from(err: sqlx::Error) -> Self {
        SignalError::DatabaseError(err.to_string())
    }
}
