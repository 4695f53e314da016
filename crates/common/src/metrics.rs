//! Prometheus 监控指标模块
//!
//! 提供全局指标收集和导出功能

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Once;
use std::time::Instant;

static METRICS_INIT: Once = Once::new();

lazy_static! {
    /// 全局 Prometheus Registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ========== 业务指标 ==========

    /// 轮询返回的信号条数
    pub static ref SIGNALS_POLLED: IntCounterVec = IntCounterVec::new(
        Opts::new("tradix_signals_polled_total", "Total number of signals returned to polling devices")
            .namespace("tradix"),
        &["client_id"]
    ).unwrap();

    /// 记录的执行回执数
    pub static ref EXECUTIONS_RECORDED: IntCounterVec = IntCounterVec::new(
        Opts::new("tradix_executions_recorded_total", "Total number of execution acknowledgments recorded")
            .namespace("tradix"),
        &["status"]
    ).unwrap();

    // ========== 性能指标 ==========

    /// HTTP 请求延迟（秒）
    pub static ref REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("tradix_request_duration_seconds", "HTTP request duration in seconds")
            .namespace("tradix")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["service", "method", "path", "status"]
    ).unwrap();

    /// HTTP 请求总数
    pub static ref REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tradix_requests_total", "Total number of HTTP requests")
            .namespace("tradix"),
        &["service", "method", "path", "status"]
    ).unwrap();

    // ========== 安全指标 ==========

    /// 设备认证失败次数（按失败阶段分类）
    pub static ref AUTH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("tradix_auth_failures_total", "Total number of device authentication failures")
            .namespace("tradix"),
        &["service", "reason"]
    ).unwrap();

    /// Nonce 存储降级次数
    ///
    /// 存储不可用并按 fail-open 策略放行请求时计数，用于告警。
    pub static ref NONCE_STORE_DEGRADED: IntCounter = IntCounter::new(
        "tradix_nonce_store_degraded_total",
        "Total number of requests allowed through while the nonce store was unavailable"
    ).unwrap();

    /// 速率限制触发次数
    pub static ref RATE_LIMIT_EXCEEDED: IntCounterVec = IntCounterVec::new(
        Opts::new("tradix_rate_limit_exceeded_total", "Total number of rate limit violations")
            .namespace("tradix"),
        &["service", "limiter_type"]
    ).unwrap();
}

/// 注册所有指标到全局 Registry
///
/// This function is idempotent - calling it multiple times is safe.
/// Only the first call will actually register the metrics.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let mut result = Ok(());

    METRICS_INIT.call_once(|| {
        let register_result = (|| {
            // 业务指标
            REGISTRY.register(Box::new(SIGNALS_POLLED.clone()))?;
            REGISTRY.register(Box::new(EXECUTIONS_RECORDED.clone()))?;

            // 性能指标
            REGISTRY.register(Box::new(REQUEST_DURATION.clone()))?;
            REGISTRY.register(Box::new(REQUESTS_TOTAL.clone()))?;

            // 安全指标
            REGISTRY.register(Box::new(AUTH_FAILURES.clone()))?;
            REGISTRY.register(Box::new(NONCE_STORE_DEGRADED.clone()))?;
            REGISTRY.register(Box::new(RATE_LIMIT_EXCEEDED.clone()))?;

            Ok::<(), prometheus::Error>(())
        })();

        if let Err(e) = register_result {
            result = Err(e);
        }
    });

    result
}

/// HTTP 请求计时器
pub struct RequestTimer {
    start: Instant,
    service: String,
    method: String,
    path: String,
}

impl RequestTimer {
    /// 创建计时器
    pub fn new(service: &str, method: &str, path: &str) -> Self {
        Self {
            start: Instant::now(),
            service: service.to_string(),
            method: method.to_string(),
            path: path.to_string(),
        }
    }

    /// 完成计时并记录指标
    pub fn observe(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();
        let status_str = status.to_string();

        REQUEST_DURATION
            .with_label_values(&[&self.service, &self.method, &self.path, &status_str])
            .observe(duration);

        REQUESTS_TOTAL
            .with_label_values(&[&self.service, &self.method, &self.path, &status_str])
            .inc();
    }
}

/// 导出 Prometheus 格式的指标
pub fn export_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();

    String::from_utf8(buffer).unwrap()
}
