//! SQLite Nonce 存储实现
//!
//! 提供基于 SQLite 的 Nonce 认领功能实现，使用 sqlx 提供异步支持

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use super::NonceStore;
use crate::error::StorageError;

/// A sqlx-based implementation of NonceStore
pub struct SqliteNonceStore {
    pool: Arc<SqlitePool>,
    cleanup_lock: Arc<RwLock<()>>,
}

impl SqliteNonceStore {
    /// 创建新的 Nonce 存储实例
    ///
    /// 在 `db_path` 目录下使用独立的 `nonce.db` 文件，
    /// 避免高频认领写入与主数据库互相干扰。
    pub async fn new_async<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_file = db_path.as_ref().join("nonce.db");
        let pool = Self::init_pool(&db_file).await?;

        Ok(Self {
            pool: Arc::new(pool),
            cleanup_lock: Arc::new(RwLock::new(())),
        })
    }

    async fn init_pool<P: AsRef<Path>>(db_file: P) -> Result<SqlitePool> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}", db_file.as_ref().display()))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        // 初始化数据库表
        // UNIQUE(device_id, nonce) 是认领原子性的基础
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS device_nonces (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id TEXT NOT NULL,
                nonce TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(device_id, nonce)
            )",
        )
        .execute(&pool)
        .await?;

        // 创建索引
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_device_nonces_expires_at
             ON device_nonces(expires_at)",
        )
        .execute(&pool)
        .await?;

        Ok(pool)
    }

    fn unix_now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

#[async_trait]
impl NonceStore for SqliteNonceStore {
    async fn claim(
        &self,
        device_id: &str,
        nonce: &str,
        ttl: Duration,
    ) -> Result<bool, StorageError> {
        let now = Self::unix_now();
        let expires_at = now + ttl.as_secs() as i64;

        // 单条语句完成"不存在或已过期则写入"：
        // - 无冲突：插入新行，认领成功
        // - 冲突且旧行已过期：UPDATE 覆盖，认领成功
        // - 冲突且旧行未过期：WHERE 不满足，rows_affected = 0，判定重放
        let result = sqlx::query(
            "INSERT INTO device_nonces (device_id, nonce, expires_at, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(device_id, nonce) DO UPDATE SET
                 expires_at = excluded.expires_at,
                 created_at = excluded.created_at
             WHERE device_nonces.expires_at <= excluded.created_at",
        )
        .bind(device_id)
        .bind(nonce)
        .bind(expires_at)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cleanup_expired(&self) -> Result<usize, StorageError> {
        // 使用锁防止并发清理
        let _lock = self.cleanup_lock.write().await;

        let result = sqlx::query("DELETE FROM device_nonces WHERE expires_at <= ?")
            .bind(Self::unix_now())
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_claim_once() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteNonceStore::new_async(temp_dir.path()).await.unwrap();

        // 首次认领成功
        assert!(
            store
                .claim("dev_1", "nonce-a", Duration::from_secs(600))
                .await
                .unwrap()
        );

        // 相同组合的二次认领必须失败
        assert!(
            !store
                .claim("dev_1", "nonce-a", Duration::from_secs(600))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_same_nonce_different_devices() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteNonceStore::new_async(temp_dir.path()).await.unwrap();

        // nonce 只要求设备内唯一，不同设备可以复用
        assert!(
            store
                .claim("dev_1", "shared", Duration::from_secs(600))
                .await
                .unwrap()
        );
        assert!(
            store
                .claim("dev_2", "shared", Duration::from_secs(600))
                .await
                .unwrap()
        );
        assert!(
            !store
                .claim("dev_1", "shared", Duration::from_secs(600))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_reclaim_after_expiry() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteNonceStore::new_async(temp_dir.path()).await.unwrap();

        // 1 秒 TTL，过期后可以重新认领
        assert!(
            store
                .claim("dev_1", "short", Duration::from_secs(1))
                .await
                .unwrap()
        );

        // 等待确保过期（等待 2 秒）
        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        assert!(
            store
                .claim("dev_1", "short", Duration::from_secs(600))
                .await
                .unwrap(),
            "Expected expired nonce to be claimable again"
        );
    }

    #[tokio::test]
    async fn test_cleanup() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteNonceStore::new_async(temp_dir.path()).await.unwrap();

        // 添加即将过期的 nonce（1 秒TTL）
        store
            .claim("dev_1", "expired", Duration::from_secs(1))
            .await
            .unwrap();

        // 添加未过期的 nonce (1小时TTL)
        store
            .claim("dev_1", "valid", Duration::from_secs(3600))
            .await
            .unwrap();

        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        let deleted = store.cleanup_expired().await.unwrap();
        assert_eq!(deleted, 1);

        // 未过期的记录仍然生效
        assert!(
            !store
                .claim("dev_1", "valid", Duration::from_secs(3600))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_exactly_one_wins() {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(SqliteNonceStore::new_async(temp_dir.path()).await.unwrap());

        // 并发认领相同组合，恰好一个成功
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .claim("dev_1", "contended", Duration::from_secs(600))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
