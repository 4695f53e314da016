//! EA Gateway (EA 网关) 配置

use serde::{Deserialize, Serialize};

/// EA 网关服务配置
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EagateConfig {
    /// EA 网关服务器配置
    #[serde(default)]
    pub server: EagateServerConfig,
}

/// EA 网关服务器配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EagateServerConfig {
    /// 时间戳偏差窗口（秒）
    ///
    /// 请求头 X-Timestamp 与服务器当前时间的最大允许差值，
    /// 过去和未来方向对称校验。
    #[serde(default = "default_timestamp_skew_secs")]
    pub timestamp_skew_secs: u64,

    /// Nonce 记忆窗口（秒）
    ///
    /// 同一 (device_id, nonce) 组合在此窗口内的重复请求会被拒绝。
    #[serde(default = "default_nonce_ttl_secs")]
    pub nonce_ttl_secs: u64,

    /// 是否强制执行设备认证
    ///
    /// 仅用于本地开发：关闭后跳过时间戳/Nonce/签名校验，
    /// 但仍然根据 X-Device-Id 解析设备身份。生产环境必须开启。
    #[serde(default = "default_enforce_device_auth")]
    pub enforce_device_auth: bool,

    /// Nonce 存储不可用时是否放行请求
    ///
    /// 默认放行（fail-open）：签名 + 时间戳是第一道防线，
    /// 重放保护是第二道，可用性优先。设备注册表不可用时
    /// 始终拒绝请求（fail-closed），不受此开关影响。
    #[serde(default = "default_nonce_fail_open")]
    pub nonce_fail_open: bool,

    /// 单次轮询返回的最大信号条数
    #[serde(default = "default_poll_batch_size")]
    pub poll_batch_size: u32,
}

impl Default for EagateServerConfig {
    fn default() -> Self {
        Self {
            timestamp_skew_secs: default_timestamp_skew_secs(),
            nonce_ttl_secs: default_nonce_ttl_secs(),
            enforce_device_auth: default_enforce_device_auth(),
            nonce_fail_open: default_nonce_fail_open(),
            poll_batch_size: default_poll_batch_size(),
        }
    }
}

/// 默认时间戳偏差窗口：5 分钟（300 秒）
fn default_timestamp_skew_secs() -> u64 {
    300
}

/// 默认 Nonce 记忆窗口：10 分钟（600 秒）
fn default_nonce_ttl_secs() -> u64 {
    600
}

fn default_enforce_device_auth() -> bool {
    true
}

fn default_nonce_fail_open() -> bool {
    true
}

fn default_poll_batch_size() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows() {
        let config = EagateServerConfig::default();
        assert_eq!(config.timestamp_skew_secs, 300);
        assert_eq!(config.nonce_ttl_secs, 600);
        assert!(config.enforce_device_auth);
        assert!(config.nonce_fail_open);
        assert_eq!(config.poll_batch_size, 10);
    }
}
