//! 存储模块
//!
//! 提供基于 sqlx 的数据库访问和 Nonce 防重放存储

pub mod db;
pub mod nonce;

pub use nonce::{MemoryNonceStore, NonceStore, SqliteNonceStore};
