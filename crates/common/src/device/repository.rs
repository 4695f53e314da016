//! 设备数据库操作
//!
//! 包含所有与设备数据持久化相关的操作。设备从不删除：
//! 吊销通过置位 revoked 实现，保留审计线索。

use chrono::Utc;

use super::error::DeviceError;
use super::model::Device;
use crate::storage::db::get_database;

const DEVICE_COLUMNS: &str =
    "rowid, device_id, client_id, name, secret_key, active, revoked, created_at, updated_at";

/// 设备数据库操作实现
impl Device {
    /// 保存设备到数据库
    ///
    /// 新设备插入，已存在的设备（有 rowid）更新可变字段
    pub async fn save(&mut self) -> Result<i64, DeviceError> {
        let now = Utc::now().timestamp();
        let db = get_database();
        let pool = db.get_pool();

        if self.rowid.is_none() {
            // 检查是否已存在相同的 device_id（应该全局唯一）
            let exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM devices WHERE device_id = ?")
                .bind(&self.device_id)
                .fetch_one(pool)
                .await?;

            if exists.0 > 0 {
                return Err(DeviceError::AlreadyExists);
            }

            self.created_at = Some(now);
            self.updated_at = Some(now);

            // 插入新记录
            let result = sqlx::query(
                "INSERT INTO devices (device_id, client_id, name, secret_key, active, revoked, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&self.device_id)
            .bind(&self.client_id)
            .bind(&self.name)
            .bind(&self.secret_key)
            .bind(self.active)
            .bind(self.revoked)
            .bind(self.created_at)
            .bind(self.updated_at)
            .execute(pool)
            .await?;

            let new_rowid = result.last_insert_rowid();
            self.rowid = Some(new_rowid);
            Ok(new_rowid)
        } else {
            self.updated_at = Some(now);

            // 更新现有记录（device_id 与密钥不可变）
            sqlx::query(
                "UPDATE devices SET name = ?, active = ?, revoked = ?, updated_at = ?
                 WHERE rowid = ?",
            )
            .bind(&self.name)
            .bind(self.active)
            .bind(self.revoked)
            .bind(self.updated_at)
            .bind(self.rowid)
            .execute(pool)
            .await?;

            self.rowid.ok_or_else(|| {
                DeviceError::DatabaseError("Device rowid is missing after update".to_string())
            })
        }
    }

    /// 按设备 ID 查询
    ///
    /// 纯数据访问：不检查 active/revoked，有效性判定属于认证守卫。
    pub async fn get_by_device_id(device_id: &str) -> Result<Option<Device>, DeviceError> {
        let db = get_database();
        let pool = db.get_pool();

        let result = sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = ?"
        ))
        .bind(device_id)
        .fetch_optional(pool)
        .await?;

        Ok(result)
    }

    /// 吊销设备（软删除，不可逆）
    pub async fn revoke(device_id: &str) -> Result<(), DeviceError> {
        let db = get_database();
        let pool = db.get_pool();

        let result = sqlx::query("UPDATE devices SET revoked = 1, updated_at = ? WHERE device_id = ?")
            .bind(Utc::now().timestamp())
            .bind(device_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DeviceError::NotFound);
        }
        Ok(())
    }

    /// 启用/停用设备
    pub async fn set_active(device_id: &str, active: bool) -> Result<(), DeviceError> {
        let db = get_database();
        let pool = db.get_pool();

        let result = sqlx::query("UPDATE devices SET active = ?, updated_at = ? WHERE device_id = ?")
            .bind(active)
            .bind(Utc::now().timestamp())
            .bind(device_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DeviceError::NotFound);
        }
        Ok(())
    }

    /// 按客户列出设备
    pub async fn get_by_client_id(client_id: &str) -> Result<Vec<Device>, DeviceError> {
        let db = get_database();
        let pool = db.get_pool();

        let devices = sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE client_id = ? ORDER BY created_at"
        ))
        .bind(client_id)
        .fetch_all(pool)
        .await?;

        Ok(devices)
    }

    pub async fn get_all() -> Result<Vec<Device>, DeviceError> {
        let db = get_database();
        let pool = db.get_pool();

        let devices = sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices ORDER BY created_at"
        ))
        .fetch_all(pool)
        .await?;

        // 只记录条数：Debug 输出会包含密钥字节
        tracing::debug!("获取所有设备: {} 条", devices.len());
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::utils::setup_test_db;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_save_and_lookup() -> anyhow::Result<()> {
        setup_test_db().await?;

        let mut device = Device::new("client_repo_1".to_string(), "vps-01".to_string());
        let device_id = device.device_id.clone();
        let rowid = device.save().await?;
        assert!(rowid > 0);

        let loaded = Device::get_by_device_id(&device_id).await?;
        let loaded = loaded.expect("device should exist");
        assert_eq!(loaded.device_id, device_id);
        assert_eq!(loaded.client_id, "client_repo_1");
        assert_eq!(loaded.secret_key, device.secret_key);
        assert!(loaded.is_usable());

        // 未知设备查询返回 None
        let missing = Device::get_by_device_id("dev_does_not_exist").await?;
        assert!(missing.is_none());

        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_duplicate_device_id() -> anyhow::Result<()> {
        setup_test_db().await?;

        let mut device1 = Device::new("client_repo_2".to_string(), "vps-01".to_string());
        device1.save().await?;

        // 相同 device_id 的二次插入应失败
        let mut device2 = Device::new("client_repo_2".to_string(), "vps-02".to_string());
        device2.device_id = device1.device_id.clone();
        let result = device2.save().await;

        assert!(matches!(result, Err(DeviceError::AlreadyExists)));
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_revoke_is_persisted() -> anyhow::Result<()> {
        setup_test_db().await?;

        let mut device = Device::new("client_repo_3".to_string(), "vps-01".to_string());
        let device_id = device.device_id.clone();
        device.save().await?;

        Device::revoke(&device_id).await?;

        let loaded = Device::get_by_device_id(&device_id).await?.unwrap();
        assert!(loaded.revoked);
        assert!(!loaded.is_usable());

        // 吊销不存在的设备报 NotFound
        let result = Device::revoke("dev_missing").await;
        assert!(matches!(result, Err(DeviceError::NotFound)));
        Ok(())
    }
}
