//! EA 网关服务包装
//!
//! 将 eagate crate 的路由器接入 HttpRouterService 架构

use crate::service::ServiceType;
use crate::service::{HttpRouterService, info::ServiceInfo};
use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use tracing::info;
use tradix_common::config::TradixConfig;

/// EA 网关服务
#[derive(Debug)]
pub struct EagateService {
    info: ServiceInfo,
    config: TradixConfig,
}

impl EagateService {
    pub fn new(config: TradixConfig) -> Self {
        Self {
            info: ServiceInfo::new(
                "EA Gateway Service",
                ServiceType::Eagate,
                Some("HMAC device authentication, signal polling and acknowledgment".to_string()),
                &config,
            ),
            config,
        }
    }
}

#[async_trait]
impl HttpRouterService for EagateService {
    fn info(&self) -> &ServiceInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut ServiceInfo {
        &mut self.info
    }

    async fn build_router(&mut self) -> Result<Router> {
        info!("Building EA Gateway router");

        let eagate_config = self.config.eagate_config();
        let router = eagate::create_eagate_router(&eagate_config, &self.config).await?;

        info!("EA Gateway router built successfully");
        Ok(router)
    }

    fn route_prefix(&self) -> &str {
        "/api/v1"
    }
}
