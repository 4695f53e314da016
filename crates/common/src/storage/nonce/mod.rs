//! Nonce 存储模块
//!
//! 提供 Nonce 的原子认领（claim-once）和过期管理功能，防止重放攻击。
//!
//! 认领键是 (device_id, nonce) 组合键：nonce 只要求设备内唯一，
//! 不同设备允许使用相同的 nonce。

mod memory_nonce_store;
mod sqlite_nonce_store;

pub use memory_nonce_store::MemoryNonceStore;
pub use sqlite_nonce_store::SqliteNonceStore;

use crate::error::StorageError;
use async_trait::async_trait;
use std::time::Duration;

/// Nonce 防重放存储能力
///
/// 作为注入依赖传递给认证守卫，测试可以替换为带确定性时钟的内存实现。
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// 原子认领 (device_id, nonce) 组合
    ///
    /// 当且仅当该组合不存在（或其上一次认领已过期）时写入，
    /// 并设置 `ttl` 的过期时间。必须是单条原子操作：
    /// 两个并发请求携带相同组合时，恰好一个成功。
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - 首次认领成功
    /// * `Ok(false)` - 组合已被认领且未过期（检测到重放）
    /// * `Err(_)` - 存储后端不可用（由调用方决定 fail-open/fail-closed）
    async fn claim(&self, device_id: &str, nonce: &str, ttl: Duration)
    -> Result<bool, StorageError>;

    /// 清理已过期的 Nonce 记录，返回删除条数
    ///
    /// 仅用于回收空间：正确性由 `claim` 的原子判断保证。
    async fn cleanup_expired(&self) -> Result<usize, StorageError>;
}
