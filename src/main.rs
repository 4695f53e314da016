//! Tradix 辅助服务器主程序
//!
//! 启动和管理交易信号相关的辅助服务，目前包括 EA 网关服务

mod cli;
mod error;
mod observability;
mod service;

use anyhow::Context;
use clap::Parser;
use observability::init_observability;
use service::{EagateService, ServiceManager};
use std::path::{Path, PathBuf};
use tradix_common::config::TradixConfig;

use tracing::{error, info};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands};
use error::{Error, Result};

/// Application launcher utilities
struct ApplicationLauncher;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Test { config_file }) => {
            let config_path =
                ApplicationLauncher::find_config_file(config_file.as_ref().unwrap_or(&cli.config))?;
            ApplicationLauncher::test_config_file(&config_path)
        }
        None => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;

            // Create Tokio runtime（before running the application）
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            // Run the asynchronous application
            runtime.block_on(ApplicationLauncher::run_application(&config_path))
        }
    }
}

impl ApplicationLauncher {
    /// Find config file with fallback locations
    fn find_config_file(provided_path: &PathBuf) -> Result<PathBuf> {
        // If the provided path is not the default "config.toml", check if it exists
        if provided_path != Path::new("config.toml") {
            if provided_path.exists() {
                bootstrap_info!("Using provided config file: {:?}", provided_path);
                return Ok(provided_path.clone());
            } else {
                bootstrap_error!("Provided config file not found: {:?}", provided_path);
                return Err(Error::custom(format!(
                    "Config file not found: {provided_path:?}"
                )));
            }
        }

        // Otherwise, try fallback locations
        let fallback_paths = vec![
            // 1. Current working directory
            PathBuf::from("config.toml"),
            // 2. System config directory
            PathBuf::from("/etc/tradix/config.toml"),
        ];

        bootstrap_info!("Searching for config file in default locations...");

        for path in &fallback_paths {
            if path.exists() {
                bootstrap_info!("Found config file: {:?}", path);
                return Ok(path.clone());
            } else {
                bootstrap_info!("Config not found at: {:?}", path);
            }
        }

        // If no config file found, provide helpful error message
        bootstrap_error!("No configuration file found!");
        bootstrap_error!("Please create a config file in one of these locations:");
        for (i, path) in fallback_paths.iter().enumerate() {
            bootstrap_error!("  {}. {:?}", i + 1, path);
        }
        bootstrap_error!("Or specify a custom path with: tradix --config <path>");

        Err(Error::custom(
            "No configuration file found. Please create one or specify path with --config",
        ))
    }

    /// 测试配置文件是否有效
    fn test_config_file(config_path: &PathBuf) -> Result<()> {
        // Initialize basic logging for test command
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();

        match TradixConfig::from_file(config_path) {
            Ok(config) => {
                info!("✅ 配置文件解析成功: {:?}", config_path);

                // 验证配置
                match config.validate() {
                    Ok(()) => {
                        info!("✅ 配置验证通过");
                    }
                    Err(errors) => {
                        error!("❌ 配置验证发现问题:");
                        for (i, err) in errors.iter().enumerate() {
                            if err.starts_with("Warning:") {
                                info!("  {}. ⚠️  {}", i + 1, err);
                            } else {
                                error!("  {}. ❌ {}", i + 1, err);
                            }
                        }
                        // 检查是否有非警告错误
                        let has_errors = errors.iter().any(|e| !e.starts_with("Warning:"));
                        if has_errors {
                            return Err(Error::service_validation("配置验证失败".to_string()));
                        }
                    }
                }

                info!("✅ 完整配置验证通过");
                Ok(())
            }
            Err(e) => {
                error!("❌ 配置文件解析失败: {}", e);
                Err(Error::service_validation(format!("配置解析失败: {e}")))
            }
        }
    }

    /// 运行应用程序的主入口
    async fn run_application(config_path: &Path) -> Result<()> {
        bootstrap_info!("📄 加载配置文件: {:?}", config_path);

        // 加载配置文件
        let config = match TradixConfig::from_file(config_path) {
            Ok(config) => {
                bootstrap_info!("✅ 配置加载成功");

                // 验证配置
                if let Err(errors) = config.validate() {
                    bootstrap_error!("❌ 配置验证发现问题:");
                    let mut has_critical_errors = false;
                    for (i, err) in errors.iter().enumerate() {
                        if err.starts_with("Warning:") {
                            bootstrap_info!("  {}. ⚠️  {}", i + 1, err);
                        } else {
                            bootstrap_error!("  {}. ❌ {}", i + 1, err);
                            has_critical_errors = true;
                        }
                    }
                    if has_critical_errors {
                        return Err(Error::custom("配置验证失败，请修复上述错误".to_string()));
                    }
                }

                config
            }
            Err(e) => {
                bootstrap_error!("❌ 配置加载失败: {}", e);
                return Err(Error::custom(format!("配置加载失败: {e}")));
            }
        };

        // ensure sqlite_path directory exists
        if !config.sqlite_path.exists() {
            std::fs::create_dir_all(&config.sqlite_path).with_context(|| {
                format!(
                    "Failed to create SQLite data directory: {}",
                    config.sqlite_path.display()
                )
            })?;
        }

        // 初始化可观测性系统（日志）
        let _observability_guard = init_observability(&config)?;

        // 运行服务
        Self::run_services(config).await
    }

    /// 运行服务
    async fn run_services(config: TradixConfig) -> Result<()> {
        info!("🚀 启动交易信号辅助服务器集群");

        // First initialize the database,
        // ensure it is ready before any service that may access it starts
        tradix_common::storage::db::set_db_path(&config.sqlite_path)
            .await
            .map_err(|e| Error::custom(format!("数据库初始化失败: {e}")))?;
        info!("✅ 数据库初始化完成");

        // 初始化 Prometheus metrics registry
        if let Err(e) = tradix_common::metrics::register_metrics() {
            tracing::warn!(
                "Prometheus metrics registration warning (may already be registered): {}",
                e
            );
        }
        info!("✅ Prometheus metrics registry 初始化成功");

        // 初始化全局关闭通道（供所有服务共享）
        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(10);

        // 安装 Ctrl-C 处理器，确保任何阶段都能广播关闭
        setup_ctrl_c_handler(shutdown_tx.clone()).await;

        let mut service_manager = ServiceManager::new(config.clone(), shutdown_tx.clone());

        info!("📊 计划启动的服务:");
        if config.is_eagate_enabled() {
            info!("  - EA Gateway Service (/api/v1)");
            let eagate_service = EagateService::new(config.clone());
            service_manager.add_service(Box::new(eagate_service));
        } else {
            info!("EA 网关服务已禁用");
        }

        let handle_futs = service_manager.start_all().await?;

        // 显示服务信息
        Self::display_service_info(&config);

        for handle in handle_futs {
            if let Err(e) = handle.await {
                error!("Service task terminated unexpectedly: {}", e);
                let _ = shutdown_tx.send(());
            }
        }
        service_manager.stop_all().await?;

        info!("🛑 所有服务已安全关闭");
        Ok(())
    }

    /// 显示服务信息
    fn display_service_info(config: &TradixConfig) {
        info!("✅ 所有服务已启动");

        if let Some(ref http_config) = config.bind.http {
            let http_url = format!("http://{}:{}", http_config.ip, http_config.port);
            info!("📡 HTTP 服务器监听在: {}", http_url);
            info!("🔧 可用的API端点:");
            if config.is_eagate_enabled() {
                info!("  - {}/api/v1/health", http_url);
                info!("  - {}/api/v1/client/poll (GET, device auth)", http_url);
                info!("  - {}/api/v1/client/ack (POST, device auth)", http_url);
                info!("  - {}/api/v1/admin/devices (POST/GET, admin key)", http_url);
                info!("  - {}/api/v1/admin/signals (POST, admin key)", http_url);
            }
            info!("  - {}/metrics", http_url);
        } else {
            info!("📡 没有配置 HTTP 服务器");
        }
    }
}

/// 设置Ctrl-C信号处理程序
async fn setup_ctrl_c_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("无法监听Ctrl-C信号: {}", e);
            return;
        }
        info!("收到Ctrl-C信号，开始优雅关闭...");
        let _ = shutdown_tx.send(());
    });
}
