//! EA 网关 HTTP Handler
//!
//! 设备侧端点：轮询待执行信号、提交执行回执、健康检查。
//! 前两者位于设备认证守卫之后，通过 [`AuthenticatedDevice`]
//! 扩展获得已解析的设备身份。

use axum::Json;
use axum::extract::{Extension, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::error::EagateError;
use crate::guard::AuthenticatedDevice;
use tradix_common::metrics::{EXECUTIONS_RECORDED, SIGNALS_POLLED};
use tradix_common::storage::db::get_database;
use tradix_common::{Execution, Signal};

/// EA 网关服务状态
#[derive(Clone)]
pub struct EagateState {
    pub poll_batch_size: u32,
}

/// 轮询待执行信号
///
/// 返回设备所属客户名下、该设备尚未回执过的已审批信号，
/// 按审批时间先后排序。
pub async fn poll_signals(
    State(state): State<EagateState>,
    Extension(device): Extension<AuthenticatedDevice>,
) -> Result<Json<Value>, EagateError> {
    let signals = Signal::list_pending_for_device(
        &device.client_id,
        &device.device_id,
        state.poll_batch_size,
    )
    .await
    .map_err(EagateError::from)?;

    debug!(
        device_id = %device.device_id,
        client_id = %device.client_id,
        count = signals.len(),
        "poll served"
    );
    SIGNALS_POLLED
        .with_label_values(&[&device.client_id])
        .inc_by(signals.len() as u64);

    Ok(Json(json!({
        "count": signals.len(),
        "signals": signals,
    })))
}

/// 执行回执请求体
#[derive(Debug, Deserialize)]
pub struct AckRequest {
    pub signal_id: String,
    /// filled / rejected / failed
    pub status: String,
    /// 券商订单号（可选）
    #[serde(default)]
    pub broker_ref: Option<String>,
}

/// 提交执行回执
///
/// 每个 (signal, device) 组合只接受一次回执，重复提交返回 409。
/// 幂等性由 executions 表的唯一约束保证，与守卫的 nonce
/// 防重放相互独立。
pub async fn acknowledge(
    Extension(device): Extension<AuthenticatedDevice>,
    Json(request): Json<AckRequest>,
) -> Result<Json<Value>, EagateError> {
    if !Execution::is_valid_status(&request.status) {
        return Err(EagateError::BadRequest(format!(
            "invalid execution status '{}'",
            request.status
        )));
    }

    let signal = Signal::get_by_signal_id(&request.signal_id)
        .await
        .map_err(EagateError::from)?
        .ok_or(EagateError::SignalNotFound)?;

    // 设备只能回执自己客户名下的信号
    if signal.client_id != device.client_id {
        return Err(EagateError::Forbidden);
    }

    let mut execution = Execution::new(
        request.signal_id.clone(),
        device.device_id.clone(),
        request.status.clone(),
        request.broker_ref,
    );
    execution.record().await?;

    debug!(
        device_id = %device.device_id,
        signal_id = %request.signal_id,
        status = %request.status,
        "execution recorded"
    );
    EXECUTIONS_RECORDED
        .with_label_values(&[&request.status])
        .inc();

    Ok(Json(json!({
        "status": "recorded",
        "signal_id": request.signal_id,
    })))
}

/// 健康检查端点
///
/// 执行以下检查：
/// 1. 数据库连接是否正常
pub async fn health_check() -> Json<Value> {
    let mut checks = json!({
        "service": "eagate",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy"
    });

    // 检查数据库连接
    let db_status = match get_database().health_check().await {
        Ok(()) => "ok",
        Err(e) => {
            error!("Database health check failed: {}", e);
            checks["status"] = json!("degraded");
            "failed"
        }
    };
    checks["database"] = json!(db_status);

    Json(checks)
}
