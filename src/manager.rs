//! 客户端管理器（门面）
//!
//! 持有注册中心会话与配置中心会话，并对外暴露服务注册、服务发现和配置中心三个组件。
//! 两个子系统相互独立：一个初始化失败不影响另一个。

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::backend::{ConfigSession, NamingSession, SessionConfig, SessionConnector};
use crate::config_center::{ConfigListener, ConfigManager, ConfigRequest};
use crate::error::{ClientError, ErrorCode, Result, map_backend_error};
use crate::naming::{
    LoadBalanceStrategy, ServiceDiscovery, ServiceInstance, ServiceQuery, ServiceRegisterRequest,
    ServiceRegistry,
};

#[derive(Clone)]
struct NamingComponents {
    session: Arc<dyn NamingSession>,
    registry: Arc<ServiceRegistry>,
    discovery: Arc<ServiceDiscovery>,
}

#[derive(Clone)]
struct ConfigComponents {
    session: Arc<dyn ConfigSession>,
    manager: Arc<ConfigManager>,
}

struct ClientInner {
    connector: Arc<dyn SessionConnector>,
    naming: RwLock<Option<NamingComponents>>,
    config: RwLock<Option<ConfigComponents>>,
}

/// 客户端管理器
///
/// 克隆开销很小，所有克隆共享同一组会话
#[derive(Clone)]
pub struct ClientManager {
    inner: Arc<ClientInner>,
}

impl ClientManager {
    /// 使用指定的会话工厂创建管理器（尚未连接任何后端）
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                connector,
                naming: RwLock::new(None),
                config: RwLock::new(None),
            }),
        }
    }

    /// 使用 Nacos HTTP 后端创建管理器
    #[cfg(feature = "nacos-http")]
    pub fn nacos() -> Self {
        Self::new(Arc::new(crate::backend::nacos::NacosHttpConnector::new()))
    }

    // ============================================================
    // 初始化
    // ============================================================

    /// 初始化注册中心与服务发现
    ///
    /// `server_addresses` 格式："ip1:port1,ip2:port2"
    pub async fn init_registry_discovery(
        &self,
        server_addresses: &str,
        namespace: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<()> {
        let config =
            SessionConfig::new(server_addresses, namespace)?.with_credentials(username, password);
        self.init_registry_discovery_with(config).await
    }

    /// 使用完整会话配置初始化注册中心与服务发现
    ///
    /// 已初始化时保留现有会话并直接返回
    pub async fn init_registry_discovery_with(&self, config: SessionConfig) -> Result<()> {
        if self.is_registry_initialized() {
            warn!("注册中心客户端已初始化，忽略重复初始化");
            return Ok(());
        }

        info!(
            servers = ?config.server_addresses,
            namespace = %config.namespace,
            "初始化注册中心客户端"
        );
        let session = self
            .inner
            .connector
            .create_naming_session(&config)
            .await
            .map_err(|err| {
                error!(error = %err, "注册中心客户端初始化失败");
                map_backend_error(err, ErrorCode::ConnectionFailed, "注册中心客户端初始化失败")
            })?;

        let components = NamingComponents {
            registry: Arc::new(ServiceRegistry::new(session.clone())),
            discovery: Arc::new(ServiceDiscovery::new(session.clone())),
            session,
        };
        let surplus = {
            let mut slot = self
                .inner
                .naming
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                Some(components)
            } else {
                *slot = Some(components);
                None
            }
        };
        if let Some(components) = surplus {
            // 并发初始化已先完成，关闭本次多建的会话
            warn!("注册中心客户端已由并发调用初始化，关闭多余会话");
            if let Err(err) = components.session.shutdown().await {
                error!(error = %err, "关闭多余的注册中心会话失败");
            }
            return Ok(());
        }

        info!("注册中心客户端初始化成功");
        Ok(())
    }

    /// 初始化配置中心
    pub async fn init_config(
        &self,
        server_addresses: &str,
        namespace: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<()> {
        let config =
            SessionConfig::new(server_addresses, namespace)?.with_credentials(username, password);
        self.init_config_with(config).await
    }

    /// 使用完整会话配置初始化配置中心
    ///
    /// 已初始化时保留现有会话并直接返回
    pub async fn init_config_with(&self, config: SessionConfig) -> Result<()> {
        if self.is_config_initialized() {
            warn!("配置中心客户端已初始化，忽略重复初始化");
            return Ok(());
        }

        info!(
            servers = ?config.server_addresses,
            namespace = %config.namespace,
            "初始化配置中心客户端"
        );
        let session = self
            .inner
            .connector
            .create_config_session(&config)
            .await
            .map_err(|err| {
                error!(error = %err, "配置中心客户端初始化失败");
                map_backend_error(err, ErrorCode::ConnectionFailed, "配置中心客户端初始化失败")
            })?;

        let components = ConfigComponents {
            manager: Arc::new(ConfigManager::new(session.clone())),
            session,
        };
        let surplus = {
            let mut slot = self
                .inner
                .config
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                Some(components)
            } else {
                *slot = Some(components);
                None
            }
        };
        if let Some(components) = surplus {
            warn!("配置中心客户端已由并发调用初始化，关闭多余会话");
            if let Err(err) = components.session.shutdown().await {
                error!(error = %err, "关闭多余的配置中心会话失败");
            }
            return Ok(());
        }

        info!("配置中心客户端初始化成功");
        Ok(())
    }

    // ============================================================
    // 组件访问
    // ============================================================

    pub fn is_registry_initialized(&self) -> bool {
        self.naming_components().is_some()
    }

    pub fn is_config_initialized(&self) -> bool {
        self.config_components().is_some()
    }

    /// 服务注册组件
    pub fn registry(&self) -> Result<Arc<ServiceRegistry>> {
        self.naming_components()
            .map(|components| components.registry)
            .ok_or_else(ClientError::naming_not_initialized)
    }

    /// 服务发现组件
    pub fn discovery(&self) -> Result<Arc<ServiceDiscovery>> {
        self.naming_components()
            .map(|components| components.discovery)
            .ok_or_else(ClientError::naming_not_initialized)
    }

    /// 配置中心组件
    pub fn config(&self) -> Result<Arc<ConfigManager>> {
        self.config_components()
            .map(|components| components.manager)
            .ok_or_else(ClientError::config_not_initialized)
    }

    fn naming_components(&self) -> Option<NamingComponents> {
        self.inner
            .naming
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn config_components(&self) -> Option<ConfigComponents> {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ============================================================
    // 服务注册与发现
    // ============================================================

    /// 注册服务实例，返回实例 ID
    pub async fn register_service(&self, request: &ServiceRegisterRequest) -> Result<String> {
        self.registry()?.register(request).await
    }

    /// 注销服务实例，省略 IP/端口时使用本进程最近一次注册的值
    pub async fn deregister_service(
        &self,
        service_name: &str,
        group_name: &str,
        ip: Option<&str>,
        port: Option<u16>,
        cluster_name: &str,
        ephemeral: bool,
    ) -> Result<bool> {
        self.registry()?
            .deregister(service_name, group_name, ip, port, cluster_name, ephemeral)
            .await
    }

    /// 查询服务实例
    pub async fn get_service_instances(&self, query: &ServiceQuery) -> Result<Vec<ServiceInstance>> {
        self.discovery()?.get_instances(query).await
    }

    /// 按负载均衡策略选择一个实例
    pub async fn choose_one_instance(
        &self,
        query: &ServiceQuery,
        strategy: LoadBalanceStrategy,
    ) -> Result<Option<ServiceInstance>> {
        self.discovery()?.choose_one(query, strategy).await
    }

    // ============================================================
    // 配置中心
    // ============================================================

    pub async fn get_config(&self, request: &ConfigRequest) -> Result<Option<String>> {
        self.config()?.get(request).await
    }

    pub async fn get_config_structured(&self, request: &ConfigRequest) -> Result<Map<String, Value>> {
        self.config()?.get_structured(request).await
    }

    pub async fn set_config(
        &self,
        data_id: &str,
        group: &str,
        content: &str,
        namespace: &str,
    ) -> Result<bool> {
        self.config()?.set(data_id, group, content, namespace).await
    }

    pub async fn delete_config(&self, data_id: &str, group: &str, namespace: &str) -> Result<bool> {
        self.config()?.delete(data_id, group, namespace).await
    }

    pub async fn add_config_listener(&self, listener: ConfigListener) -> Result<bool> {
        self.config()?.add_listener(listener).await
    }

    pub async fn remove_config_listener(
        &self,
        data_id: &str,
        group: &str,
        namespace: &str,
    ) -> Result<bool> {
        self.config()?.remove_listener(data_id, group, namespace).await
    }

    // ============================================================
    // 关闭
    // ============================================================

    /// 关闭客户端
    ///
    /// 注销本进程持有的全部实例、移除全部配置监听器并关闭会话。
    /// 未初始化的子系统直接跳过，重复调用是安全的。
    pub async fn shutdown(&self) {
        let naming = self
            .inner
            .naming
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(naming) = naming {
            let deregistered = naming.registry.deregister_all().await;
            info!(deregistered, "已注销本进程持有的服务实例");
            if let Err(err) = naming.session.shutdown().await {
                error!(error = %err, "关闭注册中心会话失败");
            }
        } else {
            debug!("注册中心客户端未初始化，跳过关闭");
        }

        let config = self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(config) = config {
            let removed = config.manager.remove_all_listeners().await;
            info!(removed, "已移除配置监听器");
            if let Err(err) = config.session.shutdown().await {
                error!(error = %err, "关闭配置中心会话失败");
            }
        } else {
            debug!("配置中心客户端未初始化，跳过关闭");
        }
    }
}

/// 进程级客户端访问点
///
/// 由宿主应用显式创建并传递，保存最近一次安装的 [`ClientManager`]
#[derive(Default)]
pub struct ClientContext {
    current: RwLock<Option<ClientManager>>,
}

impl ClientContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 安装管理器，返回被替换的旧管理器
    pub fn install(&self, manager: ClientManager) -> Option<ClientManager> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(manager)
    }

    /// 当前管理器，未安装时返回未初始化错误
    pub fn current(&self) -> Result<ClientManager> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                ClientError::coded(
                    ErrorCode::ClientNotInitialized,
                    "客户端未初始化，请先安装 ClientManager",
                )
            })
    }

    /// 取出当前管理器
    pub fn take(&self) -> Option<ClientManager> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
