//! 客户端门面与生命周期测试

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use flare_registry_client::lifecycle;
use flare_registry_client::{
    BackendResult, ClientContext, ClientManager, ClientSettings, ConfigListener, ConfigRequest,
    ConfigSession, DeregisterRequest, ErrorCategory, ErrorCode, InMemoryBackend,
    LoadBalanceStrategy, LocalServiceSettings, NamingSession, ServiceInstance, ServiceQuery,
    ServiceRegisterRequest, SessionConfig, SessionConnector, SessionSettings,
};
use tokio::sync::Barrier;

const SERVERS: &str = "127.0.0.1:8848";

fn manager_for(backend: &InMemoryBackend) -> ClientManager {
    ClientManager::new(Arc::new(backend.clone()))
}

/// 让两次建连在同一时刻完成的连接器，并统计会话关闭次数
struct RendezvousConnector {
    backend: InMemoryBackend,
    barrier: Barrier,
    closed: Arc<AtomicUsize>,
}

struct CountingNaming {
    inner: Arc<dyn NamingSession>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl NamingSession for CountingNaming {
    async fn register_instance(&self, request: &ServiceRegisterRequest) -> BackendResult<()> {
        self.inner.register_instance(request).await
    }

    async fn deregister_instance(&self, request: &DeregisterRequest) -> BackendResult<bool> {
        self.inner.deregister_instance(request).await
    }

    async fn list_instances(
        &self,
        service_name: &str,
        group_name: &str,
        clusters: &[String],
    ) -> BackendResult<Vec<ServiceInstance>> {
        self.inner.list_instances(service_name, group_name, clusters).await
    }

    async fn shutdown(&self) -> BackendResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.shutdown().await
    }
}

#[async_trait]
impl SessionConnector for RendezvousConnector {
    async fn create_naming_session(
        &self,
        config: &SessionConfig,
    ) -> BackendResult<Arc<dyn NamingSession>> {
        let inner = self.backend.create_naming_session(config).await?;
        self.barrier.wait().await;
        Ok(Arc::new(CountingNaming {
            inner,
            closed: self.closed.clone(),
        }))
    }

    async fn create_config_session(
        &self,
        config: &SessionConfig,
    ) -> BackendResult<Arc<dyn ConfigSession>> {
        self.backend.create_config_session(config).await
    }
}

#[tokio::test]
async fn operations_before_init_are_not_initialized() {
    let manager = manager_for(&InMemoryBackend::new());

    let err = manager
        .register_service(&ServiceRegisterRequest::new("order-service", "10.0.0.1", 8080))
        .await
        .unwrap_err();
    assert!(err.is_not_initialized());
    assert_eq!(err.code(), ErrorCode::NamingNotInitialized);

    let err = manager
        .deregister_service("order-service", "DEFAULT_GROUP", None, None, "DEFAULT", true)
        .await
        .unwrap_err();
    assert!(err.is_not_initialized());

    let err = manager.get_config(&ConfigRequest::new("app.yaml")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConfigNotInitialized);

    assert!(manager.registry().is_err());
    assert!(manager.discovery().is_err());
    assert!(manager.config().is_err());
}

#[tokio::test]
async fn failed_connection_leaves_subsystem_unset() {
    let backend = InMemoryBackend::with_credentials("nacos", "nacos");
    let manager = manager_for(&backend);

    let err = manager
        .init_registry_discovery(SERVERS, "public", Some("nacos".into()), Some("wrong".into()))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert!(err.details().unwrap_or_default().contains("authentication failed"));
    assert!(!manager.is_registry_initialized());

    let err = manager
        .get_service_instances(&ServiceQuery::new("order-service"))
        .await
        .unwrap_err();
    assert!(err.is_not_initialized());
}

#[tokio::test]
async fn empty_server_address_is_connection_error() {
    let manager = manager_for(&InMemoryBackend::new());

    let err = manager.init_config(" , ", "", None, None).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert_eq!(err.code(), ErrorCode::InvalidServerAddress);
}

#[tokio::test]
async fn subsystems_initialize_independently() {
    let backend = InMemoryBackend::new();
    let manager = manager_for(&backend);

    manager.init_config(SERVERS, "", None, None).await.unwrap();
    assert!(manager.is_config_initialized());
    assert!(!manager.is_registry_initialized());

    assert!(manager.set_config("app.yaml", "DEFAULT_GROUP", "a: 1", "").await.unwrap());
    let map = manager
        .get_config_structured(&ConfigRequest::new("app.yaml"))
        .await
        .unwrap();
    assert_eq!(map.get("a"), Some(&serde_json::json!(1)));

    let err = manager
        .choose_one_instance(&ServiceQuery::new("order-service"), LoadBalanceStrategy::Random)
        .await
        .unwrap_err();
    assert!(err.is_not_initialized());
}

#[tokio::test]
async fn facade_delegates_to_components() {
    let backend = InMemoryBackend::with_credentials("nacos", "nacos");
    let manager = manager_for(&backend);
    manager
        .init_registry_discovery(SERVERS, "public", Some("nacos".into()), Some("nacos".into()))
        .await
        .unwrap();
    manager
        .init_config(SERVERS, "", Some("nacos".into()), Some("nacos".into()))
        .await
        .unwrap();

    let instance_id = manager
        .register_service(&ServiceRegisterRequest::new("order-service", "10.0.0.1", 8080))
        .await
        .unwrap();
    assert_eq!(instance_id, "10.0.0.1#8080#DEFAULT#DEFAULT_GROUP@@order-service");

    let chosen = manager
        .choose_one_instance(&ServiceQuery::new("order-service"), LoadBalanceStrategy::RoundRobin)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(chosen.port, 8080);

    let (listener, mut rx) = ConfigListener::channel("app.yaml", "DEFAULT_GROUP", "");
    assert!(manager.add_config_listener(listener).await.unwrap());
    assert!(manager.set_config("app.yaml", "DEFAULT_GROUP", "v1", "").await.unwrap());
    assert_eq!(rx.recv().await.as_deref(), Some("v1"));
    assert_eq!(
        manager.get_config(&ConfigRequest::new("app.yaml")).await.unwrap().as_deref(),
        Some("v1")
    );
    assert!(manager.remove_config_listener("app.yaml", "DEFAULT_GROUP", "").await.unwrap());
    assert!(manager.delete_config("app.yaml", "DEFAULT_GROUP", "").await.unwrap());

    assert!(
        manager
            .deregister_service("order-service", "DEFAULT_GROUP", None, None, "DEFAULT", true)
            .await
            .unwrap()
    );
    assert!(
        manager
            .get_service_instances(&ServiceQuery::new("order-service"))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn repeated_init_keeps_existing_session() {
    let backend = InMemoryBackend::new();
    let manager = manager_for(&backend);

    manager.init_registry_discovery(SERVERS, "public", None, None).await.unwrap();
    manager
        .register_service(&ServiceRegisterRequest::new("order-service", "10.0.0.1", 8080))
        .await
        .unwrap();
    manager.init_registry_discovery(SERVERS, "public", None, None).await.unwrap();

    assert_eq!(backend.sessions_created(), 1);
    assert_eq!(manager.registry().unwrap().registered_instances().len(), 1);
}

#[tokio::test]
async fn concurrent_init_keeps_one_session_and_closes_the_other() {
    let backend = InMemoryBackend::new();
    let closed = Arc::new(AtomicUsize::new(0));
    let manager = ClientManager::new(Arc::new(RendezvousConnector {
        backend: backend.clone(),
        barrier: Barrier::new(2),
        closed: closed.clone(),
    }));

    let (first, second) = tokio::join!(
        manager.init_registry_discovery(SERVERS, "public", None, None),
        manager.init_registry_discovery(SERVERS, "public", None, None),
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(backend.sessions_created(), 2);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert!(manager.is_registry_initialized());

    manager
        .register_service(&ServiceRegisterRequest::new("order-service", "10.0.0.1", 8080))
        .await
        .unwrap();
    manager.shutdown().await;
    assert_eq!(closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn shutdown_cleans_up_and_is_idempotent() {
    let backend = InMemoryBackend::new();
    let manager = manager_for(&backend);

    // 未初始化时关闭是空操作
    manager.shutdown().await;

    manager.init_registry_discovery(SERVERS, "public", None, None).await.unwrap();
    manager.init_config(SERVERS, "", None, None).await.unwrap();
    for port in [8080, 8081] {
        manager
            .register_service(&ServiceRegisterRequest::new("order-service", "10.0.0.1", port))
            .await
            .unwrap();
    }
    manager
        .add_config_listener(ConfigListener::new("app.yaml", "DEFAULT_GROUP", "", |_| {}))
        .await
        .unwrap();

    manager.shutdown().await;

    assert_eq!(backend.instance_count("public", "DEFAULT_GROUP", "order-service"), 0);
    assert_eq!(backend.listener_count("", "DEFAULT_GROUP", "app.yaml"), 0);
    assert!(!manager.is_registry_initialized());
    assert!(!manager.is_config_initialized());

    manager.shutdown().await;
    let err = manager
        .deregister_service("order-service", "DEFAULT_GROUP", Some("10.0.0.1"), Some(8080), "DEFAULT", true)
        .await
        .unwrap_err();
    assert!(err.is_not_initialized());
}

#[tokio::test]
async fn client_context_returns_latest_installed_manager() {
    let backend = InMemoryBackend::new();
    let context = ClientContext::new();

    let err = context.current().err().unwrap();
    assert_eq!(err.code(), ErrorCode::ClientNotInitialized);

    let first = manager_for(&backend);
    assert!(context.install(first).is_none());

    let second = manager_for(&backend);
    second.init_config(SERVERS, "", None, None).await.unwrap();
    assert!(context.install(second.clone()).is_some());

    let current = context.current().unwrap();
    assert!(current.is_config_initialized());
    current.set_config("app.yaml", "DEFAULT_GROUP", "v1", "").await.unwrap();
    assert_eq!(second.config().unwrap().get_cache().len(), 1);

    assert!(context.take().is_some());
    assert!(context.current().is_err());
}

#[tokio::test]
async fn startup_initializes_and_registers_local_service() {
    let backend = InMemoryBackend::new();
    let manager = manager_for(&backend);
    let settings = ClientSettings {
        naming: Some(SessionSettings {
            server_addresses: SERVERS.to_string(),
            ..Default::default()
        }),
        config: Some(SessionSettings {
            server_addresses: SERVERS.to_string(),
            ..Default::default()
        }),
        service: Some(LocalServiceSettings {
            service_name: "fastapi-service".to_string(),
            ip: "192.168.1.220".to_string(),
            port: 8000,
            group_name: "DEFAULT_GROUP".to_string(),
            cluster_name: "DEFAULT".to_string(),
            weight: 1.0,
            ephemeral: true,
            metadata: Default::default(),
        }),
    };

    let report = lifecycle::startup(&manager, &settings).await;
    assert!(report.registry_initialized);
    assert!(report.config_initialized);
    assert_eq!(
        report.registered_instance.as_deref(),
        Some("192.168.1.220#8000#DEFAULT#DEFAULT_GROUP@@fastapi-service")
    );
    assert_eq!(backend.instance_count("public", "DEFAULT_GROUP", "fastapi-service"), 1);

    lifecycle::shutdown(&manager).await;
    assert_eq!(backend.instance_count("public", "DEFAULT_GROUP", "fastapi-service"), 0);
}

#[tokio::test]
async fn startup_skips_unconfigured_and_failing_subsystems() {
    let backend = InMemoryBackend::with_credentials("nacos", "nacos");
    let manager = manager_for(&backend);
    let settings = ClientSettings {
        naming: None,
        config: Some(SessionSettings {
            server_addresses: SERVERS.to_string(),
            username: Some("nacos".to_string()),
            password: Some("bad".to_string()),
            ..Default::default()
        }),
        service: Some(LocalServiceSettings {
            service_name: "fastapi-service".to_string(),
            ip: "192.168.1.220".to_string(),
            port: 8000,
            group_name: "DEFAULT_GROUP".to_string(),
            cluster_name: "DEFAULT".to_string(),
            weight: 1.0,
            ephemeral: true,
            metadata: Default::default(),
        }),
    };

    let report = lifecycle::startup(&manager, &settings).await;
    assert_eq!(report, Default::default());
    assert_eq!(backend.sessions_created(), 0);
}
