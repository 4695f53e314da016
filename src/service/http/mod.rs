//! HTTP服务模块
//!
//! 管理HTTP相关的服务

mod eagate;

pub use eagate::EagateService;

/// Prometheus metrics endpoint
pub(super) async fn metrics_endpoint() -> String {
    tradix_common::metrics::export_metrics()
}
