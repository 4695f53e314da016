//! 设备认证守卫
//!
//! 对入站设备请求做出唯一的通过/拒绝判定。五个阶段依次执行，
//! 任一阶段失败立即短路返回该阶段的错误类别：
//!
//! 1. 请求头齐备性检查（四个请求头均存在且非空）
//! 2. 时间戳新鲜度检查（RFC3339，|now - ts| ≤ 偏差窗口，过去/未来对称）
//! 3. Nonce 认领（存储不可用时默认放行并记录降级）
//! 4. 设备有效性检查（未知 / 已吊销 / 已停用均拒绝）
//! 5. 签名校验（规范字符串按实际收到的 method/path/body 重建）
//!
//! 排序依据：1、2 是无状态的廉价检查，放在任何 I/O 之前；
//! Nonce 认领先于设备查询执行——认领本身是副作用，签名错误的请求
//! 也会消耗掉 nonce，使攻击者无法用同一 (device, nonce) 修正签名重试。
//! 合法客户端须每次尝试生成新 nonce。
//!
//! 全部通过后向请求注入 [`AuthenticatedDevice`] 上下文供下游使用。

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::signature;
use tradix_common::metrics::{AUTH_FAILURES, NONCE_STORE_DEGRADED};
use tradix_common::{Device, NonceStore};

/// 认证请求头名称
pub const DEVICE_ID_HEADER: &str = "X-Device-Id";
pub const NONCE_HEADER: &str = "X-Nonce";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// 参与签名的请求体大小上限
const MAX_SIGNED_BODY_BYTES: usize = 1024 * 1024;

/// 守卫状态（用于 Axum State）
#[derive(Clone)]
pub struct GuardState {
    pub nonce_store: Arc<dyn NonceStore>,
    pub timestamp_skew: Duration,
    pub nonce_ttl: Duration,
    /// false 时跳过新鲜度/Nonce/签名校验（仅开发环境），
    /// 仍然解析并校验设备身份
    pub enforce: bool,
    /// Nonce 存储不可用时是否放行
    pub nonce_fail_open: bool,
}

/// 认证通过后注入请求的设备上下文
///
/// 仅在请求生命周期内存在，随请求结束销毁。
#[derive(Debug, Clone)]
pub struct AuthenticatedDevice {
    pub device_id: String,
    pub client_id: String,
}

/// 设备认证中间件
pub async fn device_auth(
    State(state): State<GuardState>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    // 缓冲请求体：签名必须覆盖实际收到的字节
    let body_bytes = match axum::body::to_bytes(body, MAX_SIGNED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(serde_json::json!({ "error": "unreadable request body" })),
            )
                .into_response();
        }
    };

    let method = parts.method.as_str().to_string();
    let path = parts.uri.path().to_string();

    match authenticate(&state, &parts.headers, &method, &path, &body_bytes).await {
        Ok(context) => {
            debug!(
                device_id = %context.device_id,
                client_id = %context.client_id,
                %method,
                %path,
                "device authenticated"
            );
            parts.extensions.insert(context);
            let req = Request::from_parts(parts, Body::from(body_bytes));
            next.run(req).await
        }
        Err(err) => {
            // 审计日志记录失败阶段与设备 ID（密钥材料绝不落日志）
            let device_id = header_value(&parts.headers, DEVICE_ID_HEADER).unwrap_or_default();
            warn!(
                device_id = %device_id,
                %method,
                %path,
                reason = err.reason(),
                "device authentication rejected: {err}"
            );
            AUTH_FAILURES
                .with_label_values(&["eagate", err.reason()])
                .inc();
            err.into_response()
        }
    }
}

/// 执行认证管线，返回认证上下文或第一个失败阶段的错误
async fn authenticate(
    state: &GuardState,
    headers: &HeaderMap,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<AuthenticatedDevice, AuthError> {
    // 阶段 1: 请求头齐备性
    let device_id = require_header(headers, DEVICE_ID_HEADER)?;

    if !state.enforce {
        // 开发模式：仍然确认设备身份，跳过其余校验
        let device = load_usable_device(&device_id).await?;
        return Ok(AuthenticatedDevice {
            device_id: device.device_id,
            client_id: device.client_id,
        });
    }

    let nonce = require_header(headers, NONCE_HEADER)?;
    let timestamp = require_header(headers, TIMESTAMP_HEADER)?;
    let supplied_signature = require_header(headers, SIGNATURE_HEADER)?;

    // 阶段 2: 时间戳新鲜度（无状态，先于任何存储访问）
    check_timestamp_freshness(&timestamp, Utc::now(), state.timestamp_skew)?;

    // 阶段 3: Nonce 认领
    match state
        .nonce_store
        .claim(&device_id, &nonce, state.nonce_ttl)
        .await
    {
        Ok(true) => {}
        Ok(false) => return Err(AuthError::ReplayedNonce),
        Err(e) => {
            if state.nonce_fail_open {
                // 重放保护是第二道防线；存储故障时保可用性，醒目记录降级
                warn!(
                    device_id = %device_id,
                    "nonce store unavailable, failing open (replay protection degraded): {e}"
                );
                NONCE_STORE_DEGRADED.inc();
            } else {
                warn!(device_id = %device_id, "nonce store unavailable, failing closed: {e}");
                return Err(AuthError::NonceStoreUnavailable);
            }
        }
    }

    // 阶段 4: 设备有效性
    let device = load_usable_device(&device_id).await?;

    // 阶段 5: 签名校验
    // 规范字符串由实际收到的 method/path/body 与请求头中的
    // device id/nonce/timestamp 重建，任何一处被篡改都会导致不匹配
    let body_utf8 = std::str::from_utf8(body).map_err(|_| AuthError::InvalidSignature)?;
    let canonical =
        signature::build_canonical_string(method, path, body_utf8, &device_id, &nonce, &timestamp);

    if !signature::verify(&canonical, &supplied_signature, device.secret_key()) {
        return Err(AuthError::InvalidSignature);
    }

    Ok(AuthenticatedDevice {
        device_id: device.device_id,
        client_id: device.client_id,
    })
}

/// 查询设备并检查有效性
///
/// 注册表不可用时 fail-closed：身份是信任判定的核心，不能假定。
async fn load_usable_device(device_id: &str) -> Result<Device, AuthError> {
    let device = Device::get_by_device_id(device_id)
        .await
        .map_err(|e| {
            warn!(device_id = %device_id, "device registry unavailable, failing closed: {e}");
            AuthError::RegistryUnavailable
        })?
        .ok_or(AuthError::UnknownDevice)?;

    if !device.is_usable() {
        return Err(AuthError::DeviceRevoked);
    }
    Ok(device)
}

/// 提取必需请求头，缺失或为空即失败
fn require_header(headers: &HeaderMap, name: &'static str) -> Result<String, AuthError> {
    match header_value(headers, name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AuthError::MissingHeader(name)),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// 时间戳新鲜度检查
///
/// RFC3339（含时区偏移）解析；|now - ts| 不得超过偏差窗口，
/// 恰好在边界上的时间戳接受，过去与未来对称处理。
fn check_timestamp_freshness(
    timestamp: &str,
    now: DateTime<Utc>,
    skew: Duration,
) -> Result<(), AuthError> {
    let parsed =
        DateTime::parse_from_rfc3339(timestamp).map_err(|_| AuthError::InvalidTimestamp)?;

    let delta = (now - parsed.with_timezone(&Utc)).num_seconds().abs();
    if delta > skew.as_secs() as i64 {
        return Err(AuthError::InvalidTimestamp);
    }
    Ok(())
}
