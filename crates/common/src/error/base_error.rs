//! 顶层错误枚举
//!
//! 聚合所有子模块的错误类型，提供统一的错误处理接口

use super::{ConfigError, DatabaseError, StorageError};
use thiserror::Error;

/// 顶层错误枚举，聚合所有子 crate 的错误
#[derive(Error, Debug)]
pub enum BaseError {
    // ========== 领域错误 ==========
    /// 设备注册表错误
    #[error("Device error: {0}")]
    Device(#[from] crate::device::DeviceError),

    /// 信号/回执存储错误
    #[error("Signal error: {0}")]
    Signal(#[from] crate::signal::SignalError),

    // ========== 基础设施错误 ==========
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // ========== 通用错误 ==========
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 通用错误（用于不适合其他类别的错误）
    #[error("General error: {message}")]
    General { message: String },

    /// 内部错误（通常表示编程错误）
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BaseError {
    /// 创建通用错误
    pub fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, BaseError>;
