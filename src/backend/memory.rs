//! 进程内后端
//!
//! 注册信息、配置与监听器都保存在内存中，多个会话共享同一份状态，
//! 可用于测试与本地开发。配置变更在发布线程上同步通知监听器。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{
    BackendResult, ConfigCallback, ConfigSession, NamingSession, SessionConfig, SessionConnector,
};
use crate::naming::{DeregisterRequest, ServiceInstance, ServiceRegisterRequest};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ServiceKey {
    namespace: String,
    group: String,
    service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConfigKey {
    namespace: String,
    group: String,
    data_id: String,
}

impl ConfigKey {
    fn new(namespace: &str, group: &str, data_id: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            group: group.to_string(),
            data_id: data_id.to_string(),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    credentials: Option<(String, String)>,
    instances: DashMap<ServiceKey, Vec<ServiceInstance>>,
    configs: DashMap<ConfigKey, String>,
    listeners: DashMap<ConfigKey, Vec<ConfigCallback>>,
    sessions_created: AtomicUsize,
}

impl MemoryState {
    fn notify(&self, key: &ConfigKey, content: &str) {
        let callbacks = self
            .listeners
            .get(key)
            .map(|callbacks| callbacks.value().clone())
            .unwrap_or_default();
        debug!(data_id = %key.data_id, listeners = callbacks.len(), "通知配置变更");
        for callback in callbacks {
            callback(content.to_string());
        }
    }
}

/// 进程内后端
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<MemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 要求会话使用指定的用户名和密码
    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            state: Arc::new(MemoryState {
                credentials: Some((username.into(), password.into())),
                ..Default::default()
            }),
        }
    }

    /// 直接写入一个实例（模拟其他进程注册的实例）
    pub fn put_instance(&self, namespace: &str, instance: ServiceInstance) {
        let key = ServiceKey {
            namespace: namespace.to_string(),
            group: instance.group_name.clone(),
            service: instance.service_name.clone(),
        };
        let mut instances = self.state.instances.entry(key).or_default();
        instances.retain(|existing| !existing.same_identity(&instance));
        instances.push(instance);
    }

    /// 修改实例健康状态，返回是否找到该实例
    pub fn set_healthy(
        &self,
        namespace: &str,
        group: &str,
        service: &str,
        ip: &str,
        port: u16,
        healthy: bool,
    ) -> bool {
        let key = ServiceKey {
            namespace: namespace.to_string(),
            group: group.to_string(),
            service: service.to_string(),
        };
        let Some(mut instances) = self.state.instances.get_mut(&key) else {
            return false;
        };
        let mut found = false;
        for instance in instances.iter_mut() {
            if instance.ip == ip && instance.port == port {
                instance.healthy = healthy;
                found = true;
            }
        }
        found
    }

    /// 模拟远端修改配置并通知监听器
    pub fn publish_remote(&self, namespace: &str, group: &str, data_id: &str, content: &str) {
        let key = ConfigKey::new(namespace, group, data_id);
        self.state.configs.insert(key.clone(), content.to_string());
        self.state.notify(&key, content);
    }

    /// 服务端保存的配置内容
    pub fn stored_config(&self, namespace: &str, group: &str, data_id: &str) -> Option<String> {
        self.state
            .configs
            .get(&ConfigKey::new(namespace, group, data_id))
            .map(|content| content.value().clone())
    }

    /// 服务端登记的监听回调数量
    pub fn listener_count(&self, namespace: &str, group: &str, data_id: &str) -> usize {
        self.state
            .listeners
            .get(&ConfigKey::new(namespace, group, data_id))
            .map(|callbacks| callbacks.len())
            .unwrap_or(0)
    }

    /// 服务端登记的实例数量
    pub fn instance_count(&self, namespace: &str, group: &str, service: &str) -> usize {
        let key = ServiceKey {
            namespace: namespace.to_string(),
            group: group.to_string(),
            service: service.to_string(),
        };
        self.state
            .instances
            .get(&key)
            .map(|instances| instances.len())
            .unwrap_or(0)
    }

    /// 已建立的会话数量
    pub fn sessions_created(&self) -> usize {
        self.state.sessions_created.load(Ordering::Acquire)
    }

    fn authenticate(&self, config: &SessionConfig) -> BackendResult<()> {
        if let Some((username, password)) = &self.state.credentials {
            let matches = config.username.as_deref() == Some(username.as_str())
                && config.password.as_deref() == Some(password.as_str());
            if !matches {
                return Err("authentication failed: invalid username or password".into());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionConnector for InMemoryBackend {
    async fn create_naming_session(
        &self,
        config: &SessionConfig,
    ) -> BackendResult<Arc<dyn NamingSession>> {
        self.authenticate(config)?;
        self.state.sessions_created.fetch_add(1, Ordering::AcqRel);
        Ok(Arc::new(MemoryNamingSession {
            state: self.state.clone(),
            namespace: config.namespace.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn create_config_session(
        &self,
        config: &SessionConfig,
    ) -> BackendResult<Arc<dyn ConfigSession>> {
        self.authenticate(config)?;
        self.state.sessions_created.fetch_add(1, Ordering::AcqRel);
        Ok(Arc::new(MemoryConfigSession {
            state: self.state.clone(),
            namespace: config.namespace.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// 进程内注册中心会话
pub struct MemoryNamingSession {
    state: Arc<MemoryState>,
    namespace: String,
    closed: AtomicBool,
}

impl MemoryNamingSession {
    fn ensure_open(&self) -> BackendResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err("naming session is closed".into());
        }
        Ok(())
    }

    fn service_key(&self, group: &str, service: &str) -> ServiceKey {
        ServiceKey {
            namespace: self.namespace.clone(),
            group: group.to_string(),
            service: service.to_string(),
        }
    }
}

#[async_trait]
impl NamingSession for MemoryNamingSession {
    async fn register_instance(&self, request: &ServiceRegisterRequest) -> BackendResult<()> {
        self.ensure_open()?;
        let instance = request.to_instance();
        let key = self.service_key(&request.group_name, &request.service_name);
        let mut instances = self.state.instances.entry(key).or_default();
        instances.retain(|existing| !existing.same_identity(&instance));
        instances.push(instance);
        Ok(())
    }

    async fn deregister_instance(&self, request: &DeregisterRequest) -> BackendResult<bool> {
        self.ensure_open()?;
        let key = self.service_key(&request.group_name, &request.service_name);
        if let Some(mut instances) = self.state.instances.get_mut(&key) {
            instances.retain(|existing| {
                existing.ip != request.ip
                    || existing.port != request.port
                    || existing.cluster_name != request.cluster_name
            });
        }
        Ok(true)
    }

    async fn list_instances(
        &self,
        service_name: &str,
        group_name: &str,
        clusters: &[String],
    ) -> BackendResult<Vec<ServiceInstance>> {
        self.ensure_open()?;
        let key = self.service_key(group_name, service_name);
        let instances = self
            .state
            .instances
            .get(&key)
            .map(|instances| instances.value().clone())
            .unwrap_or_default();
        Ok(instances
            .into_iter()
            .filter(|instance| clusters.is_empty() || clusters.contains(&instance.cluster_name))
            .collect())
    }

    async fn shutdown(&self) -> BackendResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// 进程内配置中心会话
pub struct MemoryConfigSession {
    state: Arc<MemoryState>,
    namespace: String,
    closed: AtomicBool,
}

impl MemoryConfigSession {
    fn ensure_open(&self) -> BackendResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err("config session is closed".into());
        }
        Ok(())
    }

    fn key(&self, group: &str, data_id: &str) -> ConfigKey {
        ConfigKey::new(&self.namespace, group, data_id)
    }
}

#[async_trait]
impl ConfigSession for MemoryConfigSession {
    async fn get_config(&self, data_id: &str, group: &str) -> BackendResult<Option<String>> {
        self.ensure_open()?;
        Ok(self
            .state
            .configs
            .get(&self.key(group, data_id))
            .map(|content| content.value().clone()))
    }

    async fn publish_config(&self, data_id: &str, group: &str, content: &str) -> BackendResult<bool> {
        self.ensure_open()?;
        let key = self.key(group, data_id);
        let previous = self.state.configs.insert(key.clone(), content.to_string());
        if previous.as_deref() != Some(content) {
            self.state.notify(&key, content);
        }
        Ok(true)
    }

    async fn remove_config(&self, data_id: &str, group: &str) -> BackendResult<bool> {
        self.ensure_open()?;
        let key = self.key(group, data_id);
        if self.state.configs.remove(&key).is_some() {
            self.state.notify(&key, "");
        }
        Ok(true)
    }

    async fn add_listener(
        &self,
        data_id: &str,
        group: &str,
        callback: ConfigCallback,
    ) -> BackendResult<()> {
        self.ensure_open()?;
        let mut callbacks = self.state.listeners.entry(self.key(group, data_id)).or_default();
        if !callbacks.iter().any(|existing| Arc::ptr_eq(existing, &callback)) {
            callbacks.push(callback);
        }
        Ok(())
    }

    async fn remove_listener(
        &self,
        data_id: &str,
        group: &str,
        callback: &ConfigCallback,
    ) -> BackendResult<()> {
        self.ensure_open()?;
        if let Some(mut callbacks) = self.state.listeners.get_mut(&self.key(group, data_id)) {
            callbacks.retain(|existing| !Arc::ptr_eq(existing, callback));
        }
        Ok(())
    }

    async fn shutdown(&self) -> BackendResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
