//! 管理端点
//!
//! 面向上游信号服务与运维：设备注册/吊销/列表、信号发布。
//! 通过 X-Admin-Key 请求头携带内部共享密钥认证，
//! 该密钥仅限内部使用，绝不下发给 EA 设备。

use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::EagateError;
use tradix_common::metrics::AUTH_FAILURES;
use tradix_common::{Device, Signal};

/// 管理密钥请求头名称
pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// 管理端点状态（用于 Axum State）
#[derive(Clone)]
pub struct AdminState {
    pub shared_key: String,
}

/// 管理端点认证中间件
pub async fn admin_auth(State(state): State<AdminState>, req: Request, next: Next) -> Response {
    let supplied = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if supplied.is_empty() || supplied != state.shared_key {
        warn!(path = %req.uri().path(), "admin authentication rejected");
        AUTH_FAILURES
            .with_label_values(&["eagate-admin", "bad_admin_key"])
            .inc();
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "admin authentication failed" })),
        )
            .into_response();
    }

    next.run(req).await
}

/// 设备注册请求体
#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub client_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// 注册新设备
///
/// 设备 ID 与 256-bit 共享密钥由服务端生成。
/// 密钥只在本响应中出现一次，之后无法再次获取。
pub async fn register_device(
    Json(request): Json<RegisterDeviceRequest>,
) -> Result<Json<Value>, EagateError> {
    if request.client_id.trim().is_empty() {
        return Err(EagateError::BadRequest("client_id cannot be empty".to_string()));
    }

    let mut device = Device::new(
        request.client_id,
        request.name.unwrap_or_else(|| "unnamed".to_string()),
    );
    device.save().await?;

    info!(
        device_id = %device.device_id,
        client_id = %device.client_id,
        "device registered"
    );

    // secret 仅此一次下发，设备侧须妥善保管
    Ok(Json(json!({
        "device_id": device.device_id,
        "client_id": device.client_id,
        "name": device.name,
        "secret": hex::encode(device.secret_key()),
    })))
}

/// 吊销设备
///
/// 软吊销：记录保留用于审计，设备从此无法通过认证。不可逆。
pub async fn revoke_device(Path(device_id): Path<String>) -> Result<Json<Value>, EagateError> {
    Device::revoke(&device_id).await?;

    info!(device_id = %device_id, "device revoked");
    Ok(Json(json!({
        "device_id": device_id,
        "revoked": true,
    })))
}

/// 列出全部设备
///
/// 密钥材料不参与序列化，列表响应不包含 secret。
pub async fn list_devices() -> Result<Json<Value>, EagateError> {
    let devices = Device::get_all().await?;
    Ok(Json(json!({
        "count": devices.len(),
        "devices": devices,
    })))
}

/// 信号发布请求体
#[derive(Debug, Deserialize)]
pub struct PublishSignalRequest {
    pub client_id: String,
    pub symbol: String,
    /// buy / sell
    pub side: String,
    #[serde(default)]
    pub entry_price: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
}

/// 发布已审批信号
///
/// 由上游信号服务在审批通过后调用，信号随即对客户名下的
/// 全部设备可见。
pub async fn publish_signal(
    Json(request): Json<PublishSignalRequest>,
) -> Result<Json<Value>, EagateError> {
    if request.client_id.trim().is_empty() || request.symbol.trim().is_empty() {
        return Err(EagateError::BadRequest(
            "client_id and symbol cannot be empty".to_string(),
        ));
    }
    if !["buy", "sell"].contains(&request.side.as_str()) {
        return Err(EagateError::BadRequest(format!(
            "invalid side '{}', must be buy or sell",
            request.side
        )));
    }

    let mut signal = Signal::new(
        request.client_id,
        request.symbol,
        request.side,
        request.entry_price,
        request.stop_loss,
        request.take_profit,
    );
    signal.save().await?;

    info!(
        signal_id = %signal.signal_id,
        client_id = %signal.client_id,
        symbol = %signal.symbol,
        "signal published"
    );

    Ok(Json(json!({
        "signal_id": signal.signal_id,
        "status": signal.status,
    })))
}
