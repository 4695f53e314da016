//! 统一配置管理系统
//!
//! 本模块是 Tradix 辅助服务配置的"单一真理之源"。
//! 所有配置项的定义、文档、默认值都在这里统一管理。

pub mod bind;
pub mod eagate;
pub mod services;

pub use crate::config::bind::{BindConfig, HttpBindConfig};
pub use crate::config::eagate::{EagateConfig, EagateServerConfig};
pub use crate::config::services::ServicesConfig;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// Tradix 辅助服务的主配置结构体
///
/// 这是系统的核心配置，包含了所有服务的配置信息。
/// 配置文件使用 TOML 格式，支持完整的类型安全加载。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TradixConfig {
    /// Service enable flags (bitmask) - Primary switch for all services
    ///
    /// Each service must have its corresponding bit set in this mask to be
    /// enabled.
    ///
    /// Bit positions:
    /// - Bit 0 (1): EA Gateway service
    ///
    /// Examples:
    /// - `enable = 1` enables the EA Gateway
    /// - `enable = 0` starts the process with no services (config test only)
    #[serde(default = "default_enable")]
    pub enable: u8,

    /// 服务器实例名称
    ///
    /// 用于标识不同的服务器实例，在集群部署中用于区分节点。
    /// 建议使用有意义的命名规则，如：tradix-01, tradix-prod-east-1 等。
    pub name: String,

    /// 运行环境标识
    ///
    /// 指定当前运行环境，影响安全策略和默认行为：
    /// - "dev": 开发环境，允许关闭设备认证
    /// - "prod": 生产环境，强制设备认证，严格的安全检查
    /// - "test": 测试环境，用于自动化测试
    pub env: String,

    /// 网络绑定配置
    pub bind: BindConfig,

    /// 位置标签
    ///
    /// 用于标识服务器的地理位置或逻辑分组，便于运维管理和监控。
    pub location_tag: String,

    /// 服务配置集合
    ///
    /// 包含所有业务服务的配置，每个服务可以独立配置自己的参数。
    #[serde(default)]
    pub services: ServicesConfig,

    /// SQLite 数据库文件存储目录路径
    ///
    /// 指定用于存储所有 SQLite 数据库文件的目录路径。
    /// 主数据库文件将存储为 `{sqlite_path}/tradix.db`。
    /// 包括设备注册表、信号/回执记录、nonce 缓存等。
    #[serde(
        serialize_with = "serialize_pathbuf",
        deserialize_with = "deserialize_pathbuf"
    )]
    pub sqlite_path: PathBuf,

    /// Tradix 内部管理接口共享密钥
    ///
    /// 用于管理端点（设备注册、吊销、信号发布）的认证，
    /// 由上游信号服务与运维工具通过 X-Admin-Key 请求头携带。
    ///
    /// 注意：
    /// - 此密钥仅限内部服务与运维使用，绝不下发给 EA 设备
    /// - 在生产环境中应使用强随机密钥
    pub tradix_shared_key: String,

    /// 可观测性配置（日志）
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// 过滤级别（用于日志）
    ///
    /// 支持 EnvFilter 语法（如 "info,hyper=warn"）。默认值 "info"。
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// 日志输出目标
    ///
    /// 控制日志输出位置：
    /// - "console": 仅输出到控制台（默认）
    /// - "file": 输出到文件
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 日志轮转开关
    ///
    /// 当 output = "file" 时有效：
    /// - true: 按天轮转日志文件
    /// - false: 追加到单个文件
    #[serde(default)]
    pub rotate: bool,

    /// 日志文件路径
    ///
    /// 当 output = "file" 时有效
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            filter_level: default_filter_level(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_enable() -> u8 {
    1 // EA Gateway
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

fn default_filter_level() -> String {
    "info".to_string()
}

fn serialize_pathbuf<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    path.display().to_string().serialize(serializer)
}

fn deserialize_pathbuf<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(PathBuf::from(s))
}

impl Default for TradixConfig {
    fn default() -> Self {
        Self {
            enable: default_enable(),
            name: "tradix-default".to_string(),
            env: "dev".to_string(),
            bind: BindConfig::default(),
            location_tag: "default-location".to_string(),
            services: ServicesConfig::default(),
            sqlite_path: PathBuf::from("database"),
            tradix_shared_key: "Jq0eJ3vJ7VhHqNfTQkzC0m2tA5yW8dK1xRbPnGZsLwo=".to_string(),
            observability: ObservabilityConfig::default(),
        }
    }
}

// 服务启用标志位常量
pub const ENABLE_EAGATE: u8 = 0b00001;

impl TradixConfig {
    /// 检查是否启用了 EA 网关服务
    ///
    /// Service is enabled if the ENABLE_EAGATE bit is set in the enable bitmask.
    pub fn is_eagate_enabled(&self) -> bool {
        self.enable & ENABLE_EAGATE != 0
    }

    /// 获取内部管理接口共享密钥
    ///
    /// 此密钥用于管理端点的认证，仅限内部服务与运维使用。
    pub fn get_tradix_shared_key(&self) -> &str {
        &self.tradix_shared_key
    }

    /// 返回可观测性配置引用
    pub fn observability_config(&self) -> &ObservabilityConfig {
        &self.observability
    }

    /// 返回日志配置引用
    pub fn log_config(&self) -> &LogConfig {
        &self.observability.log
    }

    /// 检查是否使用控制台日志输出
    pub fn is_console_logging(&self) -> bool {
        self.observability.log.output == "console"
    }

    /// 检查是否应该轮转日志
    pub fn should_rotate_logs(&self) -> bool {
        self.observability.log.output == "file" && self.observability.log.rotate
    }

    /// 获取日志过滤级别，优先使用 RUST_LOG
    pub fn get_filter_level(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|v| {
                let trimmed = v.trim().to_string();
                if trimmed.is_empty() { None } else { Some(trimmed) }
            })
            .unwrap_or_else(|| self.observability.filter_level.clone())
    }

    /// 获取 EA 网关服务配置（未配置时使用默认值）
    pub fn eagate_config(&self) -> EagateConfig {
        self.services.eagate.clone().unwrap_or_default()
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let path_ref = path.as_ref();

        // Check if file exists
        if !path_ref.exists() {
            return Err(format!("Configuration file does not exist: {path_ref:?}").into());
        }

        // Check if path is a file, not a directory
        if !path_ref.is_file() {
            return Err(format!("Path is not a valid file: {path_ref:?}").into());
        }

        // Read file content
        let content = std::fs::read_to_string(path_ref)?;

        // Parse TOML content
        let config: TradixConfig = toml::from_str(&content)?;

        Ok(config)
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// 验证配置有效性
    ///
    /// 检查所有配置项的合法性，包括：
    /// - 必需字段是否存在
    /// - 数值范围是否合理
    /// - 服务配置是否一致
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // 验证位掩码值范围 (0-1, 1 bit)
        if self.enable > 1 {
            errors.push(format!(
                "Invalid enable bitmask value: {}. Must be 0 or 1 (1 bit)",
                self.enable
            ));
        }

        // 验证实例名称
        if self.name.trim().is_empty() {
            errors.push("Instance name cannot be empty".to_string());
        }

        // 验证环境
        if !["dev", "prod", "test"].contains(&self.env.as_str()) {
            errors.push(format!(
                "Invalid environment '{}', must be one of: dev, prod, test",
                self.env
            ));
        }

        // 验证过滤级别（EnvFilter 语法）
        {
            let main_level = self
                .observability
                .filter_level
                .split(',')
                .next()
                .unwrap_or("")
                .trim();
            if !["trace", "debug", "info", "warn", "error"].contains(&main_level) {
                errors.push(format!(
                    "Invalid filter level '{}', must start with one of: trace, debug, info, warn, error",
                    self.observability.filter_level
                ));
            }
        }

        // 验证日志输出
        if !["console", "file"].contains(&self.observability.log.output.as_str()) {
            errors.push(format!(
                "Invalid log output '{}' (observability.log.output), must be 'console' or 'file'",
                self.observability.log.output
            ));
        }

        // 验证 tradix_shared_key
        if self.tradix_shared_key.contains("default") || self.tradix_shared_key.contains("change") {
            errors.push("Security warning: tradix_shared_key appears to be a default value. Please change it!".to_string());
        }
        if self.tradix_shared_key.len() < 16 {
            errors.push(
                "Security warning: tradix_shared_key is too short, recommend at least 16 characters"
                    .to_string(),
            );
        }

        // 验证 SQLite 路径
        if self
            .sqlite_path
            .to_str()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
        {
            errors.push("SQLite database path cannot be empty".to_string());
        }

        // 验证 EA 网关配置（如果启用）
        if self.is_eagate_enabled() {
            let eagate = self.eagate_config();

            if eagate.server.timestamp_skew_secs == 0 {
                errors.push(
                    "eagate.server.timestamp_skew_secs must be greater than 0".to_string(),
                );
            }

            if eagate.server.nonce_ttl_secs < eagate.server.timestamp_skew_secs {
                errors.push(format!(
                    "eagate.server.nonce_ttl_secs ({}) must not be smaller than timestamp_skew_secs ({}): \
                    a nonce must stay remembered for at least the freshness window",
                    eagate.server.nonce_ttl_secs, eagate.server.timestamp_skew_secs
                ));
            }

            if eagate.server.poll_batch_size == 0 {
                errors.push("eagate.server.poll_batch_size must be greater than 0".to_string());
            }

            // 生产环境必须强制设备认证
            if self.env == "prod" && !eagate.server.enforce_device_auth {
                errors.push(
                    "Production environment must keep eagate.server.enforce_device_auth = true"
                        .to_string(),
                );
            }
        }

        // 生产环境额外检查
        if self.env == "prod" {
            // 生产环境应使用文件日志
            if self.observability.log.output == "console" {
                errors.push("Warning: Production environment should use file logging (observability.log.output = \"file\")".to_string());
            }

            // 生产环境建议启用日志轮转
            if self.observability.log.output == "file" && !self.observability.log.rotate {
                errors.push("Warning: Production environment should enable log rotation (observability.log.rotate = true)".to_string());
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
