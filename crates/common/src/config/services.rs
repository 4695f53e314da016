//! 服务配置集合
//!
//! 每个业务服务一个配置段，服务是否启动由全局 enable 位掩码决定

use crate::config::eagate::EagateConfig;
use serde::{Deserialize, Serialize};

/// 服务配置集合
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ServicesConfig {
    /// EA 网关服务配置
    #[serde(default)]
    pub eagate: Option<EagateConfig>,
}
