//! 设备注册表模块
//!
//! 提供 EA 设备（MetaTrader 终端等远端执行器）的注册与生命周期管理。
//!
//! 按照概念独立性原则组织，每个概念都有独立的文件：
//! - `model.rs` - 核心设备数据结构
//! - `repository.rs` - 数据库操作
//! - `error.rs` - 错误类型

// 子模块
pub mod error;
pub mod model;
pub mod repository;

// 公共API导出
pub use error::DeviceError;
pub use model::Device;
