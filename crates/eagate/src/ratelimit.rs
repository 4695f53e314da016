//! Rate limiting middleware for the EA Gateway
//!
//! 限流策略：
//! - **IP 级别**：基于客户端 IP 地址限流，防止单个 IP 的 DoS 攻击
//!
//! 使用 tower-governor v0.8 实现限流。认证守卫在限流之后执行，
//! 被限流的请求不会消耗 nonce。

use axum::body::Body;
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

/// IP 级别限流配置
///
/// 限制策略：
/// - 每秒 5 个请求（EA 轮询间隔通常为数秒）
/// - 突发允许 50 个请求
/// - 基于客户端 IP 地址限流
///
/// 使用 tower_governor v0.8.0 API
pub fn ip_rate_limiter() -> GovernorLayer<SmartIpKeyExtractor, NoOpMiddleware, Body> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(5) // 每秒 5 个请求
            .burst_size(50) // 允许突发 50 个请求
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    GovernorLayer::new(governor_conf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_rate_limiter_creation() {
        let _limiter = ip_rate_limiter();
        // 如果能创建成功，说明配置正确
    }
}
