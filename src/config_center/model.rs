//! 配置中心数据模型

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::DEFAULT_GROUP;
use crate::backend::ConfigCallback;

/// 缓存与监听器共用的键：`namespace:group:dataId`
pub fn cache_key(namespace: &str, group: &str, data_id: &str) -> String {
    format!("{}:{}:{}", namespace, group, data_id)
}

/// 配置内容类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Json,
    Yaml,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Json => "json",
            ContentType::Yaml => "yaml",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" | "" => Ok(ContentType::Text),
            "json" => Ok(ContentType::Json),
            "yaml" | "yml" => Ok(ContentType::Yaml),
            _ => Err(format!("Unknown content type: {}", s)),
        }
    }
}

/// 配置获取请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub data_id: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub namespace: String,
}

impl ConfigRequest {
    /// 默认分组 `DEFAULT_GROUP`，默认命名空间为空
    pub fn new(data_id: impl Into<String>) -> Self {
        Self {
            data_id: data_id.into(),
            group: DEFAULT_GROUP.to_string(),
            namespace: String::new(),
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn cache_key(&self) -> String {
        cache_key(&self.namespace, &self.group, &self.data_id)
    }
}

/// 配置获取响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub data_id: String,
    pub group: String,
    pub namespace: String,
    /// `None` 表示配置不存在
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub content_type: ContentType,
}

/// 配置监听器
///
/// 同一个键（`namespace:group:dataId`）同时只保留一个监听器
#[derive(Clone)]
pub struct ConfigListener {
    pub data_id: String,
    pub group: String,
    pub namespace: String,
    pub content_type: ContentType,
    callback: ConfigCallback,
}

impl ConfigListener {
    pub fn new<F>(
        data_id: impl Into<String>,
        group: impl Into<String>,
        namespace: impl Into<String>,
        callback: F,
    ) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        Self::from_callback(data_id, group, namespace, Arc::new(callback))
    }

    pub fn from_callback(
        data_id: impl Into<String>,
        group: impl Into<String>,
        namespace: impl Into<String>,
        callback: ConfigCallback,
    ) -> Self {
        Self {
            data_id: data_id.into(),
            group: group.into(),
            namespace: namespace.into(),
            content_type: ContentType::Text,
            callback,
        }
    }

    /// 创建通过无界通道转发变更内容的监听器
    ///
    /// 回调只做一次非阻塞发送，耗时处理应放在接收端进行
    pub fn channel(
        data_id: impl Into<String>,
        group: impl Into<String>,
        namespace: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Self::new(data_id, group, namespace, move |content| {
            let _ = tx.send(content);
        });
        (listener, rx)
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn callback(&self) -> &ConfigCallback {
        &self.callback
    }

    pub fn key(&self) -> String {
        cache_key(&self.namespace, &self.group, &self.data_id)
    }

    /// 是否持有同一个回调
    pub fn same_callback(&self, other: &ConfigListener) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl fmt::Debug for ConfigListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigListener")
            .field("data_id", &self.data_id)
            .field("group", &self.group)
            .field("namespace", &self.namespace)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}
