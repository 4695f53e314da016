//! 内存 Nonce 存储实现
//!
//! 用于测试和本地开发。支持注入确定性时钟，便于在不等待真实时间的
//! 情况下验证 TTL 过期行为。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::NonceStore;
use crate::error::StorageError;

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// 基于 HashMap 的进程内 Nonce 存储
///
/// 键为 (device_id, nonce)，值为过期时间戳（Unix 秒）。
pub struct MemoryNonceStore {
    entries: Mutex<HashMap<(String, String), i64>>,
    clock: Clock,
}

impl MemoryNonceStore {
    /// 创建使用系统时钟的存储实例
    pub fn new() -> Self {
        Self::with_clock(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs() as i64
        })
    }

    /// 创建使用注入时钟的存储实例（用于测试）
    pub fn with_clock(clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock: Arc::new(clock),
        }
    }

    /// 当前记录条数（含已过期未清理的）
    pub fn len(&self) -> usize {
        self.entries.lock().expect("nonce map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn claim(
        &self,
        device_id: &str,
        nonce: &str,
        ttl: Duration,
    ) -> Result<bool, StorageError> {
        let now = (self.clock)();
        let mut entries = self.entries.lock().expect("nonce map poisoned");

        let key = (device_id.to_string(), nonce.to_string());
        if let Some(expires_at) = entries.get(&key)
            && *expires_at > now
        {
            return Ok(false);
        }

        entries.insert(key, now + ttl.as_secs() as i64);
        Ok(true)
    }

    async fn cleanup_expired(&self) -> Result<usize, StorageError> {
        let now = (self.clock)();
        let mut entries = self.entries.lock().expect("nonce map poisoned");

        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        Ok(before - entries.len())
    }
}
