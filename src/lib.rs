//! Flare Registry Client Library
//!
//! 服务注册发现与配置中心的进程内客户端门面：
//! 统一管理与后端（Nacos 兼容）的会话，提供服务注册、服务发现与负载均衡、
//! 配置读写与本地缓存、配置变更监听。

pub mod backend;
pub mod config_center;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod manager;
pub mod naming;
pub mod settings;

// Re-exports
pub use backend::memory::InMemoryBackend;
pub use backend::{
    BackendError, BackendResult, ConfigCallback, ConfigSession, NamingSession, SessionConfig,
    SessionConnector,
};
pub use config_center::{
    ConfigListener, ConfigManager, ConfigRequest, ConfigResponse, ContentType, cache_key,
};
pub use error::{ClientError, ErrorBuilder, ErrorCategory, ErrorCode, Result};
pub use lifecycle::StartupReport;
pub use manager::{ClientContext, ClientManager};
pub use naming::{
    CursorKey, DEFAULT_CLUSTER, DEFAULT_GROUP, DeregisterRequest, LoadBalanceStrategy,
    LoadBalancer, ServiceDiscovery, ServiceInstance, ServiceQuery, ServiceRegisterRequest,
    ServiceRegistry,
};
pub use settings::{ClientSettings, LocalServiceSettings, SessionSettings};

// Nacos HTTP 后端 re-exports（可选）
#[cfg(feature = "nacos-http")]
pub use backend::nacos::NacosHttpConnector;
