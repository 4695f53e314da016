//! # tradix
//!
//! 交易信号辅助服务器集合，包括 EA 网关（设备认证、轮询与回执）服务

pub mod service;

// Re-export commonly used types
pub use service::{EagateService, ServiceManager};
pub use tradix_common::config::TradixConfig;
