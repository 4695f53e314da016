//! 服务管理器
//!
//! 实现了服务的启动、停止和管理逻辑：
//! 所有 HTTP 路由服务合并到一个监听器上，由统一的关闭广播驱动优雅退出

use super::HttpRouterService;
use anyhow::Result;
use axum::Router;
use axum::routing::get;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tradix_common::config::TradixConfig;
use url::Url;

/// 服务管理器，负责管理多个服务的生命周期
#[derive(Debug)]
pub struct ServiceManager {
    services: Vec<Box<dyn HttpRouterService>>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
    config: TradixConfig,
}

impl ServiceManager {
    /// 创建新的服务管理器
    pub fn new(config: TradixConfig, shutdown_tx: tokio::sync::broadcast::Sender<()>) -> Self {
        Self {
            services: Vec::new(),
            shutdown_tx,
            config,
        }
    }

    /// 添加服务到管理器
    pub fn add_service(&mut self, service: Box<dyn HttpRouterService>) {
        info!("Adding service '{}' to manager", service.info().name);
        self.services.push(service);
    }

    /// 启动所有服务
    ///
    /// 合并所有 HTTP 路由服务的路由器，绑定监听器并启动 axum 服务器
    pub async fn start_all(&mut self) -> Result<Vec<JoinHandle<()>>> {
        info!(
            "Starting all {} services ({}).",
            self.services.len(),
            self.services
                .iter()
                .map(|s| s.info().service_type.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut handle_futs = Vec::new();

        if self.services.is_empty() {
            warn!("No services configured, nothing to start");
            return Ok(handle_futs);
        }

        let http_config = self
            .config
            .bind
            .http
            .clone()
            .ok_or_else(|| anyhow::anyhow!("bind.http is required to start HTTP services"))?;

        // 合并所有服务的路由器（每个服务携带完整路径的路由）
        let mut merged = Router::new().route("/metrics", get(super::http::metrics_endpoint));
        for service in &mut self.services {
            let router = match service.build_router().await {
                Ok(router) => router,
                Err(e) => {
                    service.info_mut().set_error(e.to_string());
                    return Err(e);
                }
            };
            info!(
                "  - {} mounted at {}",
                service.info().name,
                service.route_prefix()
            );
            merged = merged.merge(router);
        }
        let merged = merged.layer(TraceLayer::new_for_http());

        // 绑定监听器（bind 失败立即报错，而不是在后台任务里）
        let bind_addr = format!("{}:{}", http_config.ip, http_config.port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("📡 HTTP server listening on {}", local_addr);

        // 通知各服务已启动
        let base_url = Url::parse(&format!(
            "http://{}:{}",
            http_config.domain_name, local_addr.port()
        ))?;
        for service in &mut self.services {
            service.on_start(base_url.clone()).await?;
        }

        // 启动服务器任务，优雅关闭由广播通道驱动
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let serve_result = axum::serve(
                listener,
                merged.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP server received shutdown signal");
            })
            .await;

            if let Err(e) = serve_result {
                warn!("HTTP server terminated with error: {}", e);
            }
        });
        handle_futs.push(handle);

        Ok(handle_futs)
    }

    /// 停止所有服务
    pub async fn stop_all(&mut self) -> Result<()> {
        info!("Stopping all services...");
        let _ = self.shutdown_tx.send(());
        Ok(())
    }
}
