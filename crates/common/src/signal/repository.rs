//! 信号与回执数据库操作

use super::error::SignalError;
use super::model::{Execution, Signal};
use crate::storage::db::get_database;

const SIGNAL_COLUMNS: &str = "rowid, signal_id, client_id, symbol, side, entry_price, \
                              stop_loss, take_profit, status, created_at";

/// 信号数据库操作实现
impl Signal {
    /// 保存信号到数据库
    pub async fn save(&mut self) -> Result<i64, SignalError> {
        let db = get_database();
        let pool = db.get_pool();

        let result = sqlx::query(
            "INSERT INTO signals (signal_id, client_id, symbol, side, entry_price, stop_loss, take_profit, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.signal_id)
        .bind(&self.client_id)
        .bind(&self.symbol)
        .bind(&self.side)
        .bind(self.entry_price)
        .bind(self.stop_loss)
        .bind(self.take_profit)
        .bind(&self.status)
        .bind(self.created_at)
        .execute(pool)
        .await?;

        let new_rowid = result.last_insert_rowid();
        self.rowid = Some(new_rowid);
        Ok(new_rowid)
    }

    /// 按信号 ID 查询
    pub async fn get_by_signal_id(signal_id: &str) -> Result<Option<Signal>, SignalError> {
        let db = get_database();
        let pool = db.get_pool();

        let result = sqlx::query_as::<_, Signal>(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals WHERE signal_id = ?"
        ))
        .bind(signal_id)
        .fetch_optional(pool)
        .await?;

        Ok(result)
    }

    /// 列出某设备待处理的已审批信号
    ///
    /// 返回该设备所属客户名下、该设备尚未回执过的信号，
    /// 按创建时间先后排序，最多 `limit` 条。
    pub async fn list_pending_for_device(
        client_id: &str,
        device_id: &str,
        limit: u32,
    ) -> Result<Vec<Signal>, SignalError> {
        let db = get_database();
        let pool = db.get_pool();

        let signals = sqlx::query_as::<_, Signal>(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals s
             WHERE s.client_id = ? AND s.status = 'approved'
               AND NOT EXISTS (
                   SELECT 1 FROM executions e
                   WHERE e.signal_id = s.signal_id AND e.device_id = ?
               )
             ORDER BY s.created_at, s.rowid
             LIMIT ?"
        ))
        .bind(client_id)
        .bind(device_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(signals)
    }
}

/// 回执数据库操作实现
impl Execution {
    /// 记录执行回执
    ///
    /// (signal_id, device_id) 的唯一约束在数据库层面保证幂等：
    /// 重复回执映射为 [`SignalError::DuplicateExecution`]，由上层
    /// 返回冲突而不是静默成功。
    pub async fn record(&mut self) -> Result<i64, SignalError> {
        let db = get_database();
        let pool = db.get_pool();

        let result = sqlx::query(
            "INSERT INTO executions (signal_id, device_id, status, broker_ref, executed_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&self.signal_id)
        .bind(&self.device_id)
        .bind(&self.status)
        .bind(&self.broker_ref)
        .bind(self.executed_at)
        .execute(pool)
        .await;

        match result {
            Ok(result) => {
                let new_rowid = result.last_insert_rowid();
                self.rowid = Some(new_rowid);
                Ok(new_rowid)
            }
            Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE") => {
                Err(SignalError::DuplicateExecution)
            }
            Err(e) => Err(SignalError::from(e)),
        }
    }

    /// 按信号列出回执
    pub async fn get_by_signal_id(signal_id: &str) -> Result<Vec<Execution>, SignalError> {
        let db = get_database();
        let pool = db.get_pool();

        let executions = sqlx::query_as::<_, Execution>(
            "SELECT rowid, signal_id, device_id, status, broker_ref, executed_at
             FROM executions WHERE signal_id = ? ORDER BY executed_at",
        )
        .bind(signal_id)
        .fetch_all(pool)
        .await?;

        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::utils::setup_test_db;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_pending_excludes_acknowledged() -> anyhow::Result<()> {
        setup_test_db().await?;

        let client = "client_sig_1";
        let mut s1 = Signal::new(
            client.to_string(),
            "XAUUSD".to_string(),
            "buy".to_string(),
            Some(2380.5),
            None,
            None,
        );
        let mut s2 = Signal::new(
            client.to_string(),
            "EURUSD".to_string(),
            "sell".to_string(),
            None,
            None,
            None,
        );
        s1.save().await?;
        s2.save().await?;

        // 两条都待处理
        let pending = Signal::list_pending_for_device(client, "dev_a", 10).await?;
        assert_eq!(pending.len(), 2);
        // 按创建顺序返回
        assert_eq!(pending[0].signal_id, s1.signal_id);

        // dev_a 回执 s1 后，s1 不再出现在 dev_a 的待处理列表
        let mut exec = Execution::new(
            s1.signal_id.clone(),
            "dev_a".to_string(),
            "filled".to_string(),
            Some("broker-123".to_string()),
        );
        exec.record().await?;

        let pending = Signal::list_pending_for_device(client, "dev_a", 10).await?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].signal_id, s2.signal_id);

        // 回执是按设备记录的：dev_b 仍然看到两条
        let pending_b = Signal::list_pending_for_device(client, "dev_b", 10).await?;
        assert_eq!(pending_b.len(), 2);

        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_duplicate_execution_is_rejected() -> anyhow::Result<()> {
        setup_test_db().await?;

        let mut signal = Signal::new(
            "client_sig_2".to_string(),
            "XAUUSD".to_string(),
            "buy".to_string(),
            None,
            None,
            None,
        );
        signal.save().await?;

        let mut exec = Execution::new(
            signal.signal_id.clone(),
            "dev_dup".to_string(),
            "filled".to_string(),
            None,
        );
        exec.record().await?;

        // 相同 (signal, device) 的第二次回执必须被拒绝
        let mut dup = Execution::new(
            signal.signal_id.clone(),
            "dev_dup".to_string(),
            "rejected".to_string(),
            None,
        );
        let result = dup.record().await;
        assert!(matches!(result, Err(SignalError::DuplicateExecution)));

        // 不同设备可以对同一信号回执
        let mut other = Execution::new(
            signal.signal_id.clone(),
            "dev_other".to_string(),
            "filled".to_string(),
            None,
        );
        assert!(other.record().await.is_ok());

        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_poll_limit() -> anyhow::Result<()> {
        setup_test_db().await?;

        let client = "client_sig_3";
        for i in 0..5 {
            let mut s = Signal::new(
                client.to_string(),
                format!("SYM{i}"),
                "buy".to_string(),
                None,
                None,
                None,
            );
            s.save().await?;
        }

        let pending = Signal::list_pending_for_device(client, "dev_lim", 3).await?;
        assert_eq!(pending.len(), 3);
        Ok(())
    }
}
