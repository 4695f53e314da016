//! EA Gateway (EA 网关) - 设备认证与信号轮询/回执服务
//!
//! # 功能概述
//!
//! EA 网关是 Tradix 系统面向客户侧执行器（MetaTrader EA 实例）的
//! 唯一入口，负责：
//! - 设备认证：HMAC-SHA256 签名 + 时间戳新鲜度 + Nonce 防重放
//! - 信号轮询：设备拉取所属客户名下待执行的已审批信号
//! - 执行回执：记录每台设备对每条信号恰好一次的执行结果
//! - 设备管理：注册 / 吊销 / 列表（内部共享密钥认证）
//!
//! # 架构设计
//!
//! ```text
//! ┌──────────────┐
//! │  EA Device   │ X-Device-Id / X-Nonce / X-Timestamp / X-Signature
//! └──────┬───────┘
//!        │ GET  /api/v1/client/poll
//!        │ POST /api/v1/client/ack
//!        ▼
//! ┌───────────────────────────────────────────┐
//! │  EA Gateway                               │
//! │  ┌─────────────┐     ┌─────────────────┐  │
//! │  │ RateLimiter │────▶│  DeviceAuth     │  │
//! │  └─────────────┘     │  Guard          │  │
//! │                      └───────┬─────────┘  │
//! │  ┌──────────────┐    ┌───────▼─────────┐  │
//! │  │ NonceStore   │◀───│  Handlers       │  │
//! │  │ (SQLite)     │    │  poll / ack     │  │
//! │  └──────────────┘    └───────┬─────────┘  │
//! └──────────────────────────────┼────────────┘
//!                                ▼
//!                      ┌──────────────────┐
//!                      │ Device Registry  │
//!                      │ Signals / Execs  │ (SQLite)
//!                      └──────────────────┘
//! ```
//!
//! # 认证流水线
//!
//! 1. 四个请求头齐备（缺一即拒）
//! 2. X-Timestamp 在偏差窗口内（默认 ±300 秒，边界含）
//! 3. (device_id, nonce) 原子认领（默认 TTL 600 秒；存储故障 fail-open）
//! 4. 设备存在且未吊销未停用（注册表故障 fail-closed）
//! 5. 规范字符串 `{METHOD}|{PATH}|{BODY}|{DEVICE_ID}|{NONCE}|{TIMESTAMP}`
//!    的 HMAC-SHA256 签名匹配（恒定时间比较）
//!
//! # 安全考虑
//!
//! - **密钥单次下发**：设备密钥注册时生成，仅在注册响应中出现一次
//! - **Nonce 先于签名消耗**：签名错误的请求同样消耗 nonce，
//!   阻断同一 nonce 上的签名试探
//! - **软吊销**：设备从不删除，吊销保留完整审计线索
//! - **响应不泄露**：失败响应只含类别标识，期望签名与密钥绝不回显
//!
//! # 配置选项
//!
//! 参见 [`tradix_common::config::EagateConfig`] 获取完整配置说明。

pub mod admin;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod ratelimit;
pub mod signature;

pub use error::{AuthError, EagateError};
pub use guard::{AuthenticatedDevice, GuardState};

use anyhow::Result;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use admin::AdminState;
use handlers::EagateState;
use tradix_common::config::{EagateConfig, TradixConfig};
use tradix_common::{NonceStore, SqliteNonceStore};

/// 创建 EA 网关路由器，遵循项目的 HttpRouterService 架构
///
/// 在全局 sqlite_path 下初始化 Nonce 存储并启动定期清理任务。
pub async fn create_eagate_router(
    config: &EagateConfig,
    global_config: &TradixConfig,
) -> Result<Router> {
    info!("Creating EA Gateway router with config");

    let nonce_store: Arc<dyn NonceStore> = Arc::new(
        SqliteNonceStore::new_async(&global_config.sqlite_path).await?,
    );
    info!(
        "✅ Nonce store initialized at: {}",
        global_config.sqlite_path.join("nonce.db").display()
    );

    // 启动定期清理任务（每 5 分钟清理一次过期 nonce）
    // 清理只回收空间，正确性由 claim 的原子判断保证
    let store_for_cleanup = nonce_store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300)); // 5 分钟
        loop {
            interval.tick().await;
            match store_for_cleanup.cleanup_expired().await {
                Ok(deleted) => {
                    if deleted > 0 {
                        info!("🧹 Cleaned up {} expired nonces", deleted);
                    }
                }
                Err(e) => {
                    error!("Failed to cleanup expired nonces: {:?}", e);
                }
            }
        }
    });

    let router = create_eagate_router_with_store(config, global_config, nonce_store);

    info!("EA Gateway router created successfully");
    Ok(router)
}

/// 使用外部提供的 Nonce 存储创建路由器
///
/// 测试可以注入带确定性时钟的内存存储。
pub fn create_eagate_router_with_store(
    config: &EagateConfig,
    global_config: &TradixConfig,
    nonce_store: Arc<dyn NonceStore>,
) -> Router {
    if !config.server.enforce_device_auth {
        info!("⚠️  Device authentication enforcement is DISABLED (dev only)");
    }

    let guard_state = GuardState {
        nonce_store,
        timestamp_skew: Duration::from_secs(config.server.timestamp_skew_secs),
        nonce_ttl: Duration::from_secs(config.server.nonce_ttl_secs),
        enforce: config.server.enforce_device_auth,
        nonce_fail_open: config.server.nonce_fail_open,
    };

    let eagate_state = EagateState {
        poll_batch_size: config.server.poll_batch_size,
    };

    let admin_state = AdminState {
        shared_key: global_config.tradix_shared_key.clone(),
    };

    // 设备侧路由：设备认证守卫
    // 路由使用完整路径，保证守卫与签名看到一致的请求路径
    let client_routes = Router::new()
        .route("/api/v1/client/poll", get(handlers::poll_signals))
        .route("/api/v1/client/ack", post(handlers::acknowledge))
        .route_layer(middleware::from_fn_with_state(
            guard_state,
            guard::device_auth,
        ))
        .with_state(eagate_state);

    // 管理路由：内部共享密钥认证
    let admin_routes = Router::new()
        .route(
            "/api/v1/admin/devices",
            post(admin::register_device).get(admin::list_devices),
        )
        .route(
            "/api/v1/admin/devices/{device_id}/revoke",
            post(admin::revoke_device),
        )
        .route("/api/v1/admin/signals", post(admin::publish_signal))
        .route_layer(middleware::from_fn_with_state(
            admin_state,
            admin::admin_auth,
        ));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .merge(client_routes)
        .merge(admin_routes)
        .layer(ratelimit::ip_rate_limiter())
}
