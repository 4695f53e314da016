//! 存储相关错误类型
//!
//! 定义所有与 Nonce 存储后端相关的错误

use thiserror::Error;

/// 存储相关错误
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("Storage backend error: {backend}")]
    Backend { backend: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),
}
