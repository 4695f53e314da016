//! 设备核心数据结构
//!
//! 定义设备实体的核心数据结构和基础方法

use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// 设备结构体
///
/// 设备是客户侧的远端执行器（如一个 MetaTrader EA 实例），
/// 持有与服务端共享的签名密钥。
///
/// ## 字段说明
/// - `device_id`: 设备 ID，全局唯一的不透明标识
/// - `client_id`: 所属客户 ID
/// - `secret_key`: 共享签名密钥，注册时生成并仅下发一次
/// - `active` / `revoked`: 生命周期标志；设备从不删除，只做软吊销
///
/// 吊销或停用的设备无论签名是否有效都必须认证失败。
#[derive(Debug, Clone, Serialize, Deserialize, Default, FromRow)]
pub struct Device {
    pub rowid: Option<i64>,

    pub device_id: String, // 设备ID（不透明令牌，不含协议分隔符）
    pub client_id: String, // 所属客户ID
    pub name: String,      // 展示名称（运维用）

    // 密钥材料不参与序列化，避免经由 API 或日志泄露
    #[serde(skip)]
    pub secret_key: Vec<u8>,

    pub active: bool,  // 是否启用
    pub revoked: bool, // 是否已吊销

    // 元数据字段
    pub created_at: Option<i64>, // 创建时间
    pub updated_at: Option<i64>, // 更新时间
}

impl Device {
    /// 创建新的设备实例
    ///
    /// 设备 ID 与密钥由服务端生成，密钥仅在注册响应中出现一次。
    pub fn new(client_id: String, name: String) -> Self {
        let now = Utc::now().timestamp();
        Self {
            rowid: None,
            device_id: format!("dev_{}", Uuid::new_v4().simple()),
            client_id,
            name,
            secret_key: Self::generate_secret(),
            active: true,
            revoked: false,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// 生成 256-bit 随机共享密钥
    pub fn generate_secret() -> Vec<u8> {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        key.to_vec()
    }

    /// 设备是否可用于认证
    ///
    /// 吊销优先：revoked 一旦置位，active 状态不再有意义。
    pub fn is_usable(&self) -> bool {
        self.active && !self.revoked
    }

    pub fn secret_key(&self) -> &[u8] {
        &self.secret_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_creation() {
        let device = Device::new("client_42".to_string(), "vps-mt5-01".to_string());

        assert!(device.device_id.starts_with("dev_"));
        assert_eq!(device.client_id, "client_42");
        assert_eq!(device.secret_key.len(), 32);
        assert!(device.active);
        assert!(!device.revoked);
        assert!(device.is_usable());
        assert!(device.created_at.is_some());
    }

    #[test]
    fn test_generated_secrets_are_unique() {
        let a = Device::generate_secret();
        let b = Device::generate_secret();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_revocation_precedence() {
        let mut device = Device::new("client_42".to_string(), "vps-mt5-01".to_string());
        device.revoked = true;
        // active 仍为 true，但吊销优先
        assert!(!device.is_usable());

        let mut device = Device::new("client_42".to_string(), "vps-mt5-02".to_string());
        device.active = false;
        assert!(!device.is_usable());
    }

    #[test]
    fn test_secret_is_not_serialized() {
        let device = Device::new("client_42".to_string(), "vps-mt5-01".to_string());
        let json = serde_json::to_string(&device).unwrap();
        assert!(!json.contains("secret_key"));
    }
}
