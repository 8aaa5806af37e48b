//! Nacos Open API 后端
//!
//! 通过 HTTP v1 接口访问 Nacos：
//! - 实例：`/v1/ns/instance`、`/v1/ns/instance/list`
//! - 配置：`/v1/cs/configs`，变更通过 `/v1/cs/configs/listener` 长轮询感知
//! - 认证：`/v1/auth/login` 获取 accessToken

mod client;
mod config;
mod listener;
mod naming;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub use config::NacosConfigSession;
pub use naming::NacosNamingSession;

use super::{BackendResult, ConfigSession, NamingSession, SessionConfig, SessionConnector};
use client::NacosHttpClient;

/// Nacos 会话工厂
#[derive(Debug, Clone, Default)]
pub struct NacosHttpConnector;

impl NacosHttpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionConnector for NacosHttpConnector {
    async fn create_naming_session(
        &self,
        config: &SessionConfig,
    ) -> BackendResult<Arc<dyn NamingSession>> {
        info!(servers = ?config.server_addresses, "连接 Nacos 注册中心");
        let client = NacosHttpClient::connect(config).await?;
        Ok(Arc::new(NacosNamingSession::new(Arc::new(client))))
    }

    async fn create_config_session(
        &self,
        config: &SessionConfig,
    ) -> BackendResult<Arc<dyn ConfigSession>> {
        info!(servers = ?config.server_addresses, "连接 Nacos 配置中心");
        let client = NacosHttpClient::connect(config).await?;
        Ok(Arc::new(NacosConfigSession::new(Arc::new(client))))
    }
}
