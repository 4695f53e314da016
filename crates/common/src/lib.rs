//! Tradix 基础设施库
//!
//! 为交易信号辅助服务提供基础设施组件，包括设备注册表、信号/回执存储、
//! Nonce 防重放存储、配置管理和监控指标等核心功能

pub mod config;
pub mod device;
pub mod error;
pub mod metrics;
pub mod signal;
pub mod storage;
pub mod util;

// Re-export commonly used types for convenience
pub use device::{Device, DeviceError};
pub use error::{BaseError, ConfigError, DatabaseError, Result, StorageError};
pub use signal::{Execution, Signal, SignalError};
pub use storage::{MemoryNonceStore, NonceStore, SqliteNonceStore};
