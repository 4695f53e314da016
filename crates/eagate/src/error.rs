//! EA 网关错误类型
//!
//! 认证错误与业务错误分离：认证错误由守卫产生并统一映射到 HTTP 401
//! （注册表不可用时 503），业务错误由各 handler 产生。
//!
//! 错误码映射策略：
//! - 401: 认证失败（六类认证错误都在此列，包括缺失请求头）
//! - 400: 请求体格式错误（仅业务请求解析）
//! - 409: 重复回执
//! - 503: 设备注册表不可用（fail-closed）
//!
//! 对外响应只携带错误类别标识，绝不回显期望签名、密钥或存储内部状态。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tradix_common::{DeviceError, SignalError};

/// 设备认证失败的错误分类
///
/// 每个失败对请求是终结性的：守卫返回第一个失败阶段的错误类别，
/// 不做聚合，也不在内部重试。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// 必需请求头缺失或为空
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// 时间戳无法解析或超出偏差窗口（过去/未来对称）
    #[error("timestamp unparseable or outside freshness window")]
    InvalidTimestamp,

    /// (device, nonce) 组合已被认领
    #[error("nonce already used")]
    ReplayedNonce,

    /// 设备 ID 无法解析到任何记录
    #[error("unknown device")]
    UnknownDevice,

    /// 设备存在但已吊销或停用
    #[error("device revoked or inactive")]
    DeviceRevoked,

    /// 规范字符串签名不匹配
    #[error("signature mismatch")]
    InvalidSignature,

    /// 设备注册表不可用（身份无法确认，fail-closed）
    #[error("device registry unavailable")]
    RegistryUnavailable,

    /// Nonce 存储不可用且配置为 fail-closed
    #[error("nonce store unavailable")]
    NonceStoreUnavailable,
}

impl AuthError {
    /// 错误类别标识，用于响应体、日志和指标标签
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingHeader(_) => "missing_header",
            AuthError::InvalidTimestamp => "invalid_timestamp",
            AuthError::ReplayedNonce => "replayed_nonce",
            AuthError::UnknownDevice => "unknown_device",
            AuthError::DeviceRevoked => "device_revoked",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::RegistryUnavailable => "registry_unavailable",
            AuthError::NonceStoreUnavailable => "nonce_store_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::RegistryUnavailable | AuthError::NonceStoreUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // 通用化响应体，不泄露内部细节
        let body = json!({
            "error": "authentication failed",
            "reason": self.reason(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

/// EA 网关业务错误
#[derive(Debug, Error)]
pub enum EagateError {
    #[error("signal not found")]
    SignalNotFound,

    #[error("device not found")]
    DeviceNotFound,

    #[error("signal does not belong to the requesting client")]
    Forbidden,

    #[error("duplicate acknowledgment")]
    DuplicateAck,

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EagateError {
    fn status_code(&self) -> StatusCode {
        match self {
            EagateError::SignalNotFound | EagateError::DeviceNotFound => StatusCode::NOT_FOUND,
            EagateError::Forbidden => StatusCode::FORBIDDEN,
            EagateError::DuplicateAck => StatusCode::CONFLICT,
            EagateError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EagateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EagateError {
    fn into_response(self) -> Response {
        let message = match &self {
            // 内部错误细节只进日志，不下发
            EagateError::Internal(detail) => {
                tracing::error!("EA gateway internal error: {detail}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({ "error": message });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<SignalError> for EagateError {
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::NotFound => EagateError::SignalNotFound,
            SignalError::DuplicateExecution => EagateError::DuplicateAck,
            SignalError::ValidationError(msg) => EagateError::BadRequest(msg),
            SignalError::DatabaseError(msg) => EagateError::Internal(msg),
        }
    }
}

impl From<DeviceError> for EagateError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::NotFound => EagateError::DeviceNotFound,
            DeviceError::AlreadyExists => {
                EagateError::BadRequest("device already exists".to_string())
            }
            DeviceError::ValidationError(msg) => EagateError::BadRequest(msg),
            DeviceError::DatabaseError(msg) => EagateError::Internal(msg),
        }
    }
}
