//! 信号与回执核心数据结构

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// 信号状态：入库即已审批
pub const SIGNAL_STATUS_APPROVED: &str = "approved";

/// 回执允许的结果值
pub const EXECUTION_STATUSES: &[&str] = &["filled", "rejected", "failed"];

/// 已审批的交易信号
///
/// 由上游信号服务审批后写入，EA 设备通过轮询接口按客户拉取。
#[derive(Debug, Clone, Serialize, Deserialize, Default, FromRow)]
pub struct Signal {
    pub rowid: Option<i64>,

    pub signal_id: String, // 信号ID（全局唯一）
    pub client_id: String, // 目标客户ID
    pub symbol: String,    // 交易品种，如 XAUUSD
    pub side: String,      // buy / sell

    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,

    pub status: String,
    pub created_at: Option<i64>,
}

impl Signal {
    /// 创建新的已审批信号
    pub fn new(
        client_id: String,
        symbol: String,
        side: String,
        entry_price: Option<f64>,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Self {
        Self {
            rowid: None,
            signal_id: format!("sig_{}", Uuid::new_v4().simple()),
            client_id,
            symbol,
            side,
            entry_price,
            stop_loss,
            take_profit,
            status: SIGNAL_STATUS_APPROVED.to_string(),
            created_at: Some(Utc::now().timestamp()),
        }
    }
}

/// 设备执行回执
///
/// 记录某设备对某信号的执行结果。每个 (signal_id, device_id)
/// 组合至多一条，由 executions 表的唯一约束保证。
#[derive(Debug, Clone, Serialize, Deserialize, Default, FromRow)]
pub struct Execution {
    pub rowid: Option<i64>,

    pub signal_id: String,
    pub device_id: String,
    pub status: String,             // filled / rejected / failed
    pub broker_ref: Option<String>, // 券商订单号（可选）
    pub executed_at: Option<i64>,
}

impl Execution {
    pub fn new(
        signal_id: String,
        device_id: String,
        status: String,
        broker_ref: Option<String>,
    ) -> Self {
        Self {
            rowid: None,
            signal_id,
            device_id,
            status,
            broker_ref,
            executed_at: Some(Utc::now().timestamp()),
        }
    }

    /// 校验回执结果值
    pub fn is_valid_status(status: &str) -> bool {
        EXECUTION_STATUSES.contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_creation() {
        let signal = Signal::new(
            "client_42".to_string(),
            "XAUUSD".to_string(),
            "buy".to_string(),
            Some(2380.5),
            Some(2370.0),
            Some(2400.0),
        );

        assert!(signal.signal_id.starts_with("sig_"));
        assert_eq!(signal.status, SIGNAL_STATUS_APPROVED);
        assert!(signal.created_at.is_some());
    }

    #[test]
    fn test_execution_status_values() {
        assert!(Execution::is_valid_status("filled"));
        assert!(Execution::is_valid_status("rejected"));
        assert!(Execution::is_valid_status("failed"));
        assert!(!Execution::is_valid_status("done"));
        assert!(!Execution::is_valid_status(""));
    }
}
