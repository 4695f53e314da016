//! 设备错误类型定义
//!
//! 定义了设备注册表相关的错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Device not found")]
    NotFound,

    #[error("Device already exists")]
    AlreadyExists,
}

impl From<sqlx::Error> for DeviceError {
    fn from(err: sqlx::Error) -> Self {
        DeviceError::DatabaseError(err.to_string())
    }
}
