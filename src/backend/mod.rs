//! 注册中心 / 配置中心后端抽象
//!
//! 门面层只通过这里定义的能力接口与后端交互，协议细节由各后端实现负责：
//! - [`memory`]：进程内实现，用于测试与本地开发
//! - `nacos`：Nacos Open API（HTTP）实现，需启用 `nacos-http` 特性

pub mod memory;
#[cfg(feature = "nacos-http")]
pub mod nacos;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ClientError, ErrorCode, Result};
use crate::naming::{DeregisterRequest, ServiceInstance, ServiceRegisterRequest};

/// 后端错误类型
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// 后端调用结果
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// 配置变更回调
///
/// 由后端在检测到远端变更时异步调用，参数为最新的配置内容。
/// 回调可能在任意线程/任务上执行，且不得长时间阻塞后端的通知投递。
pub type ConfigCallback = Arc<dyn Fn(String) + Send + Sync>;

/// 会话配置
#[derive(Clone)]
pub struct SessionConfig {
    /// 服务端地址列表（`host:port`）
    pub server_addresses: Vec<String>,
    /// 命名空间 ID
    pub namespace: String,
    /// 用户名
    pub username: Option<String>,
    /// 密码
    pub password: Option<String>,
    /// 单次请求超时时间（由后端自行执行）
    pub request_timeout: Duration,
}

impl SessionConfig {
    /// 从逗号分隔的地址串创建会话配置，格式："ip1:port1,ip2:port2"
    pub fn new(server_addresses: &str, namespace: impl Into<String>) -> Result<Self> {
        let addresses: Vec<String> = server_addresses
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .collect();

        if addresses.is_empty() {
            return Err(ClientError::coded(
                ErrorCode::InvalidServerAddress,
                "服务端地址不能为空",
            ));
        }

        Ok(Self {
            server_addresses: addresses,
            namespace: namespace.into(),
            username: None,
            password: None,
            request_timeout: Duration::from_secs(5),
        })
    }

    /// 设置认证信息（用户名为空时忽略）
    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self.password = password;
        self
    }

    /// 设置请求超时时间
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("server_addresses", &self.server_addresses)
            .field("namespace", &self.namespace)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "******"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// 注册中心会话
#[async_trait]
pub trait NamingSession: Send + Sync {
    /// 注册服务实例
    async fn register_instance(&self, request: &ServiceRegisterRequest) -> BackendResult<()>;

    /// 注销服务实例，返回后端是否确认
    async fn deregister_instance(&self, request: &DeregisterRequest) -> BackendResult<bool>;

    /// 查询服务实例全集（不做健康过滤）
    ///
    /// `clusters` 为空表示不限集群；服务不存在时返回空列表
    async fn list_instances(
        &self,
        service_name: &str,
        group_name: &str,
        clusters: &[String],
    ) -> BackendResult<Vec<ServiceInstance>>;

    /// 关闭会话
    async fn shutdown(&self) -> BackendResult<()> {
        Ok(())
    }
}

/// 配置中心会话
#[async_trait]
pub trait ConfigSession: Send + Sync {
    /// 获取配置，`None` 表示配置不存在
    async fn get_config(&self, data_id: &str, group: &str) -> BackendResult<Option<String>>;

    /// 发布配置，返回后端是否接受
    async fn publish_config(&self, data_id: &str, group: &str, content: &str) -> BackendResult<bool>;

    /// 删除配置，返回后端是否接受
    async fn remove_config(&self, data_id: &str, group: &str) -> BackendResult<bool>;

    /// 注册变更回调
    async fn add_listener(
        &self,
        data_id: &str,
        group: &str,
        callback: ConfigCallback,
    ) -> BackendResult<()>;

    /// 移除变更回调（按 `Arc` 指针识别）
    async fn remove_listener(
        &self,
        data_id: &str,
        group: &str,
        callback: &ConfigCallback,
    ) -> BackendResult<()>;

    /// 关闭会话
    async fn shutdown(&self) -> BackendResult<()> {
        Ok(())
    }
}

/// 会话工厂
///
/// 负责与后端建立会话，失败时由门面层包装为连接错误
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// 建立注册中心会话
    async fn create_naming_session(
        &self,
        config: &SessionConfig,
    ) -> BackendResult<Arc<dyn NamingSession>>;

    /// 建立配置中心会话
    async fn create_config_session(
        &self,
        config: &SessionConfig,
    ) -> BackendResult<Arc<dyn ConfigSession>>;
}
