//! 客户端启动配置
//!
//! 支持 TOML 文件与环境变量两种来源，环境变量覆盖文件中的值。
//! 文件中字符串值内的 `${VAR}` / `${VAR:default}` 引用在 TOML 解析之后替换为环境变量。

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::backend::SessionConfig;
use crate::naming::{DEFAULT_CLUSTER, DEFAULT_GROUP, ServiceRegisterRequest};

/// 注册中心默认命名空间
pub const DEFAULT_NAMING_NAMESPACE: &str = "public";

/// 配置中心默认命名空间
pub const DEFAULT_CONFIG_NAMESPACE: &str = "";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

static ENV_REFERENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").ok());

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientSettings {
    /// 注册中心
    pub naming: Option<SessionSettings>,
    /// 配置中心
    pub config: Option<SessionSettings>,
    /// 启动时自动注册的本地服务
    pub service: Option<LocalServiceSettings>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionSettings {
    /// "ip1:port1,ip2:port2"
    #[serde(default)]
    pub server_addresses: String,
    pub namespace: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalServiceSettings {
    pub service_name: String,
    pub ip: String,
    pub port: u16,
    #[serde(default = "default_group")]
    pub group_name: String,
    #[serde(default = "default_cluster")]
    pub cluster_name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_true")]
    pub ephemeral: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn default_cluster() -> String {
    DEFAULT_CLUSTER.to_string()
}

fn default_weight() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl ClientSettings {
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::from_toml_str(&content, env_lookup)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 解析 TOML 文本，`lookup` 用于替换 `${VAR}` 引用
    pub fn from_toml_str<F>(content: &str, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut table: toml::Table = toml::from_str(content)?;
        for (_, value) in table.iter_mut() {
            substitute_in_value(value, &lookup);
        }
        let settings: ClientSettings = toml::Value::Table(table).try_into()?;
        Ok(settings)
    }

    /// 仅从进程环境变量构建
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env();
        settings
    }

    /// 用进程环境变量覆盖当前值
    pub fn apply_env(&mut self) {
        self.apply_env_with(env_lookup);
    }

    /// 使用给定的查找函数覆盖当前值
    ///
    /// 读取 `NACOS_DISCOVERY_*` 与 `NACOS_CONFIG_*`，
    /// 后缀为 `SERVER_ADDRESSES`、`NAMESPACE`、`USERNAME`、`PASSWORD`
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        apply_section_env(&mut self.naming, "NACOS_DISCOVERY", &lookup);
        apply_section_env(&mut self.config, "NACOS_CONFIG", &lookup);
    }

    /// 注册中心会话配置，未配置服务端地址时返回 `None`
    pub fn naming_session_config(&self) -> crate::Result<Option<SessionConfig>> {
        session_config(self.naming.as_ref(), DEFAULT_NAMING_NAMESPACE)
    }

    /// 配置中心会话配置，未配置服务端地址时返回 `None`
    pub fn config_session_config(&self) -> crate::Result<Option<SessionConfig>> {
        session_config(self.config.as_ref(), DEFAULT_CONFIG_NAMESPACE)
    }
}

impl LocalServiceSettings {
    pub fn to_register_request(&self) -> ServiceRegisterRequest {
        let mut request = ServiceRegisterRequest::new(&self.service_name, &self.ip, self.port)
            .group(&self.group_name)
            .cluster(&self.cluster_name)
            .weight(self.weight)
            .ephemeral(self.ephemeral);
        request.metadata = self.metadata.clone();
        request
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn apply_section_env<F>(section: &mut Option<SessionSettings>, prefix: &str, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| {
        lookup(&format!("{}_{}", prefix, suffix)).filter(|value| !value.trim().is_empty())
    };

    let server_addresses = var("SERVER_ADDRESSES");
    let namespace = var("NAMESPACE");
    let username = var("USERNAME");
    let password = var("PASSWORD");

    let any_set = server_addresses.is_some()
        || namespace.is_some()
        || username.is_some()
        || password.is_some();
    if !any_set {
        return;
    }

    let settings = section.get_or_insert_with(SessionSettings::default);
    if let Some(server_addresses) = server_addresses {
        settings.server_addresses = server_addresses;
    }
    if namespace.is_some() {
        settings.namespace = namespace;
    }
    if username.is_some() {
        settings.username = username;
    }
    if password.is_some() {
        settings.password = password;
    }
}

fn session_config(
    settings: Option<&SessionSettings>,
    default_namespace: &str,
) -> crate::Result<Option<SessionConfig>> {
    let Some(settings) = settings else {
        return Ok(None);
    };
    if settings.server_addresses.trim().is_empty() {
        return Ok(None);
    }

    let namespace = settings
        .namespace
        .clone()
        .unwrap_or_else(|| default_namespace.to_string());
    let timeout = settings
        .request_timeout_ms
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);

    let config = SessionConfig::new(&settings.server_addresses, namespace)?
        .with_credentials(settings.username.clone(), settings.password.clone())
        .with_request_timeout(Duration::from_millis(timeout));
    Ok(Some(config))
}

fn substitute_in_value<F>(value: &mut toml::Value, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        toml::Value::String(text) => *text = substitute_env_vars(text, lookup),
        toml::Value::Array(items) => {
            for item in items {
                substitute_in_value(item, lookup);
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                substitute_in_value(item, lookup);
            }
        }
        _ => {}
    }
}

/// 替换 `${VAR}` 与 `${VAR:default}`，未设置且无默认值时替换为空串
pub fn substitute_env_vars<F>(text: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let Some(pattern) = ENV_REFERENCE.as_ref() else {
        return text.to_string();
    };
    pattern
        .replace_all(text, |caps: &Captures| {
            let name = caps[1].trim();
            lookup(name).unwrap_or_else(|| {
                caps.get(2)
                    .map(|default| default.as_str().to_string())
                    .unwrap_or_default()
            })
        })
        .into_owned()
}
