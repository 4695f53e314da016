//! 信号与回执模块
//!
//! 提供已审批交易信号的存储，以及设备执行回执的记录。
//! 回执按 (signal_id, device_id) 在数据库层面保证恰好一次。

// 子模块
pub mod error;
pub mod model;
pub mod repository;

// 公共API导出
pub use error::SignalError;
pub use model::{Execution, Signal};
