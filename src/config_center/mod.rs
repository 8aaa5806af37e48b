//! 配置中心模块
//!
//! 配置读写、本地缓存（`namespace:group:dataId`）与变更监听器管理

pub mod manager;
pub mod model;
pub mod parser;

pub use manager::ConfigManager;
pub use model::{ConfigListener, ConfigRequest, ConfigResponse, ContentType, cache_key};
pub use parser::{detect_content_type, parse_structured, parse_typed};

/// 默认配置分组
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";
