//! 宿主应用生命周期
//!
//! 启动时按配置初始化注册中心与配置中心，并注册本地服务；
//! 关闭时注销实例、移除监听器并关闭会话。
//! 启动阶段的失败只记录日志，宿主应用的其余功能不受影响。

use tracing::{error, info, warn};

use crate::manager::ClientManager;
use crate::settings::ClientSettings;

/// 启动结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub registry_initialized: bool,
    pub config_initialized: bool,
    /// 自动注册的实例 ID
    pub registered_instance: Option<String>,
}

/// 按配置启动客户端
pub async fn startup(manager: &ClientManager, settings: &ClientSettings) -> StartupReport {
    let mut report = StartupReport::default();

    match settings.naming_session_config() {
        Ok(Some(config)) => {
            info!("开始初始化注册中心客户端...");
            match manager.init_registry_discovery_with(config).await {
                Ok(()) => report.registry_initialized = true,
                Err(err) => error!(error = %err, "注册中心客户端初始化失败"),
            }
        }
        Ok(None) => warn!("NACOS_DISCOVERY_SERVER_ADDRESSES 未配置，跳过注册中心客户端初始化"),
        Err(err) => error!(error = %err, "注册中心配置无效"),
    }

    match settings.config_session_config() {
        Ok(Some(config)) => {
            info!("开始初始化配置中心客户端...");
            match manager.init_config_with(config).await {
                Ok(()) => report.config_initialized = true,
                Err(err) => error!(error = %err, "配置中心客户端初始化失败"),
            }
        }
        Ok(None) => warn!("NACOS_CONFIG_SERVER_ADDRESSES 未配置，跳过配置中心客户端初始化"),
        Err(err) => error!(error = %err, "配置中心配置无效"),
    }

    if let Some(service) = &settings.service {
        if report.registry_initialized {
            match manager.register_service(&service.to_register_request()).await {
                Ok(instance_id) => report.registered_instance = Some(instance_id),
                Err(err) => error!(service = %service.service_name, error = %err, "服务注册失败"),
            }
        } else {
            warn!(service = %service.service_name, "注册中心不可用，跳过服务注册");
        }
    }

    report
}

/// 关闭客户端
pub async fn shutdown(manager: &ClientManager) {
    manager.shutdown().await;
    info!("客户端已关闭");
}
