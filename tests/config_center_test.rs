//! 配置中心测试

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use flare_registry_client::{
    BackendResult, ConfigCallback, ConfigListener, ConfigManager, ConfigRequest, ConfigSession,
    ContentType, ErrorCategory, InMemoryBackend, SessionConfig, SessionConnector,
};

const NAMESPACE: &str = "dev";
const GROUP: &str = "DEFAULT_GROUP";

async fn config_manager(backend: &InMemoryBackend) -> ConfigManager {
    let config = SessionConfig::new("127.0.0.1:8848", NAMESPACE).unwrap();
    ConfigManager::new(backend.create_config_session(&config).await.unwrap())
}

fn request(data_id: &str) -> ConfigRequest {
    ConfigRequest::new(data_id).group(GROUP).namespace(NAMESPACE)
}

/// 后端拒绝写入、监听失败的会话
struct RejectingConfig;

#[async_trait]
impl ConfigSession for RejectingConfig {
    async fn get_config(&self, _data_id: &str, _group: &str) -> BackendResult<Option<String>> {
        Err("read timed out".into())
    }

    async fn publish_config(&self, _data_id: &str, _group: &str, _content: &str) -> BackendResult<bool> {
        Ok(false)
    }

    async fn remove_config(&self, _data_id: &str, _group: &str) -> BackendResult<bool> {
        Ok(false)
    }

    async fn add_listener(
        &self,
        _data_id: &str,
        _group: &str,
        _callback: ConfigCallback,
    ) -> BackendResult<()> {
        Err("listener quota exceeded".into())
    }

    async fn remove_listener(
        &self,
        _data_id: &str,
        _group: &str,
        _callback: &ConfigCallback,
    ) -> BackendResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn set_then_get_returns_last_written_value() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;

    assert!(manager.set("app.yaml", GROUP, "v1", NAMESPACE).await.unwrap());
    assert!(manager.set("app.yaml", GROUP, "v2", NAMESPACE).await.unwrap());

    assert_eq!(manager.get(&request("app.yaml")).await.unwrap().as_deref(), Some("v2"));
    assert_eq!(
        manager.get_cache().get("dev:DEFAULT_GROUP:app.yaml").map(String::as_str),
        Some("v2")
    );
    assert_eq!(backend.stored_config(NAMESPACE, GROUP, "app.yaml").as_deref(), Some("v2"));
}

#[tokio::test]
async fn missing_config_is_none_and_not_cached() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;

    assert_eq!(manager.get(&request("missing")).await.unwrap(), None);
    assert!(manager.get_cache().is_empty());
}

#[tokio::test]
async fn empty_content_is_a_value_not_absence() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;
    backend.publish_remote(NAMESPACE, GROUP, "empty", "");

    assert_eq!(manager.get(&request("empty")).await.unwrap().as_deref(), Some(""));
    assert!(manager.get_cache().contains_key("dev:DEFAULT_GROUP:empty"));
}

#[tokio::test]
async fn delete_evicts_cache_entry() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;
    manager.set("app.yaml", GROUP, "v1", NAMESPACE).await.unwrap();

    assert!(manager.delete("app.yaml", GROUP, NAMESPACE).await.unwrap());
    assert!(manager.get_cache().is_empty());
    assert_eq!(backend.stored_config(NAMESPACE, GROUP, "app.yaml"), None);
}

#[tokio::test]
async fn rejected_writes_leave_cache_untouched() {
    let manager = ConfigManager::new(Arc::new(RejectingConfig));

    assert!(!manager.set("app.yaml", GROUP, "v1", NAMESPACE).await.unwrap());
    assert!(manager.get_cache().is_empty());
    assert!(!manager.delete("app.yaml", GROUP, NAMESPACE).await.unwrap());
}

#[tokio::test]
async fn backend_errors_map_to_config_categories() {
    let manager = ConfigManager::new(Arc::new(RejectingConfig));

    let err = manager.get(&request("app.yaml")).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Config);
    assert_eq!(err.details(), Some("read timed out"));

    let listener = ConfigListener::new("app.yaml", GROUP, NAMESPACE, |_| {});
    let err = manager.add_listener(listener).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ConfigListener);
    assert!(manager.listener_keys().await.is_empty());

    assert!(!manager.refresh_cache("app.yaml", GROUP, NAMESPACE).await);
}

#[tokio::test]
async fn empty_data_id_is_invalid() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;

    let err = manager.get(&request("")).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InvalidArgument);
}

#[tokio::test]
async fn structured_read_falls_back_to_yaml() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;
    backend.publish_remote(NAMESPACE, GROUP, "app.yaml", "a: 1");
    backend.publish_remote(NAMESPACE, GROUP, "app.json", r#"{"db": {"port": 5432}}"#);

    let yaml = manager.get_structured(&request("app.yaml")).await.unwrap();
    assert_eq!(yaml.get("a"), Some(&json!(1)));

    let json = manager.get_structured(&request("app.json")).await.unwrap();
    assert_eq!(json.get("db"), Some(&json!({"port": 5432})));

    assert!(manager.get_structured(&request("missing")).await.unwrap().is_empty());
}

#[tokio::test]
async fn unparseable_content_is_config_error() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;
    backend.publish_remote(NAMESPACE, GROUP, "plain.txt", "hello world");

    let err = manager.get_structured(&request("plain.txt")).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Config);
}

#[tokio::test]
async fn typed_read_and_content_type_detection() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Database {
        host: String,
        port: u16,
    }

    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;
    backend.publish_remote(NAMESPACE, GROUP, "db.yaml", "host: localhost\nport: 5432\n");

    let db: Option<Database> = manager.get_typed(&request("db.yaml")).await.unwrap();
    assert_eq!(
        db,
        Some(Database {
            host: "localhost".to_string(),
            port: 5432
        })
    );
    let missing: Option<Database> = manager.get_typed(&request("missing")).await.unwrap();
    assert!(missing.is_none());

    let response = manager.get_response(&request("db.yaml")).await.unwrap();
    assert_eq!(response.content_type, ContentType::Yaml);

    backend.publish_remote(NAMESPACE, GROUP, "db.json", r#"{"host": "db", "port": 1}"#);
    let response = manager.get_response(&request("db.json")).await.unwrap();
    assert_eq!(response.content_type, ContentType::Json);

    let response = manager.get_response(&request("missing")).await.unwrap();
    assert_eq!(response.content, None);
    assert_eq!(response.content_type, ContentType::Text);
}

#[tokio::test]
async fn listener_receives_remote_changes() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;
    let (listener, mut rx) = ConfigListener::channel("app.yaml", GROUP, NAMESPACE);

    assert!(manager.add_listener(listener).await.unwrap());
    backend.publish_remote(NAMESPACE, GROUP, "app.yaml", "feature: on");

    assert_eq!(rx.recv().await.as_deref(), Some("feature: on"));
}

#[tokio::test]
async fn second_listener_replaces_the_first() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;
    let (first, mut first_rx) = ConfigListener::channel("app.yaml", GROUP, NAMESPACE);
    let (second, mut second_rx) = ConfigListener::channel("app.yaml", GROUP, NAMESPACE);

    manager.add_listener(first).await.unwrap();
    manager.add_listener(second.clone()).await.unwrap();

    assert_eq!(backend.listener_count(NAMESPACE, GROUP, "app.yaml"), 1);
    let active = manager
        .active_listener("app.yaml", GROUP, NAMESPACE)
        .await
        .unwrap();
    assert!(active.same_callback(&second));

    backend.publish_remote(NAMESPACE, GROUP, "app.yaml", "v2");
    assert_eq!(second_rx.recv().await.as_deref(), Some("v2"));
    assert!(first_rx.try_recv().is_err());
    assert_eq!(manager.listener_keys().await, vec!["dev:DEFAULT_GROUP:app.yaml"]);
}

#[tokio::test]
async fn listener_firing_does_not_update_cache() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;
    manager.set("app.yaml", GROUP, "v1", NAMESPACE).await.unwrap();
    let (listener, mut rx) = ConfigListener::channel("app.yaml", GROUP, NAMESPACE);
    manager.add_listener(listener).await.unwrap();

    backend.publish_remote(NAMESPACE, GROUP, "app.yaml", "v2");
    assert_eq!(rx.recv().await.as_deref(), Some("v2"));
    assert_eq!(
        manager.get_cache().get("dev:DEFAULT_GROUP:app.yaml").map(String::as_str),
        Some("v1")
    );

    assert!(manager.refresh_cache("app.yaml", GROUP, NAMESPACE).await);
    assert_eq!(
        manager.get_cache().get("dev:DEFAULT_GROUP:app.yaml").map(String::as_str),
        Some("v2")
    );
}

#[tokio::test]
async fn remove_listener_reports_whether_one_existed() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;

    assert!(!manager.remove_listener("app.yaml", GROUP, NAMESPACE).await.unwrap());

    manager
        .add_listener(ConfigListener::new("app.yaml", GROUP, NAMESPACE, |_| {}))
        .await
        .unwrap();
    assert!(manager.remove_listener("app.yaml", GROUP, NAMESPACE).await.unwrap());
    assert_eq!(backend.listener_count(NAMESPACE, GROUP, "app.yaml"), 0);
    assert!(!manager.remove_listener("app.yaml", GROUP, NAMESPACE).await.unwrap());
    assert!(manager.active_listener("app.yaml", GROUP, NAMESPACE).await.is_none());
}

#[tokio::test]
async fn clear_cache_keeps_listeners() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;
    manager.set("app.yaml", GROUP, "v1", NAMESPACE).await.unwrap();
    manager
        .add_listener(ConfigListener::new("app.yaml", GROUP, NAMESPACE, |_| {}))
        .await
        .unwrap();

    assert!(manager.clear_cache());
    assert!(manager.get_cache().is_empty());
    assert_eq!(backend.listener_count(NAMESPACE, GROUP, "app.yaml"), 1);
    assert_eq!(backend.stored_config(NAMESPACE, GROUP, "app.yaml").as_deref(), Some("v1"));
}

#[tokio::test]
async fn remove_all_listeners_detaches_every_key() {
    let backend = InMemoryBackend::new();
    let manager = config_manager(&backend).await;
    for data_id in ["b.yaml", "a.yaml"] {
        manager
            .add_listener(ConfigListener::new(data_id, GROUP, NAMESPACE, |_| {}))
            .await
            .unwrap();
    }
    assert_eq!(
        manager.listener_keys().await,
        vec!["dev:DEFAULT_GROUP:a.yaml", "dev:DEFAULT_GROUP:b.yaml"]
    );

    assert_eq!(manager.remove_all_listeners().await, 2);
    assert!(manager.listener_keys().await.is_empty());
    assert_eq!(backend.listener_count(NAMESPACE, GROUP, "a.yaml"), 0);
    assert_eq!(backend.listener_count(NAMESPACE, GROUP, "b.yaml"), 0);
}
