//! 服务实例定义

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{DEFAULT_CLUSTER, DEFAULT_GROUP};

/// 服务实例
///
/// 查询时刻的快照，客户端不会修改，只会在重新查询时整体替换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    /// 实例 ID
    #[serde(default)]
    pub instance_id: String,

    /// 服务名
    #[serde(default)]
    pub service_name: String,

    /// 分组
    #[serde(default = "default_group")]
    pub group_name: String,

    /// 集群
    #[serde(default = "default_cluster")]
    pub cluster_name: String,

    /// IP 地址
    pub ip: String,

    /// 端口
    pub port: u16,

    /// 权重（用于加权随机）
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// 是否健康
    #[serde(default = "default_true")]
    pub healthy: bool,

    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 是否为临时实例
    #[serde(default = "default_true")]
    pub ephemeral: bool,

    /// 元数据
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    /// 创建新的服务实例（默认分组、默认集群、权重 1.0、健康）
    pub fn new(service_name: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        let service_name = service_name.into();
        let ip = ip.into();
        let instance_id =
            instance_id_for(&ip, port, DEFAULT_CLUSTER, DEFAULT_GROUP, &service_name);
        Self {
            instance_id,
            service_name,
            group_name: DEFAULT_GROUP.to_string(),
            cluster_name: DEFAULT_CLUSTER.to_string(),
            ip,
            port,
            weight: 1.0,
            healthy: true,
            enabled: true,
            ephemeral: true,
            metadata: HashMap::new(),
        }
    }

    /// 设置集群
    pub fn with_cluster(mut self, cluster_name: impl Into<String>) -> Self {
        self.cluster_name = cluster_name.into();
        self.refresh_instance_id();
        self
    }

    /// 设置权重
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// `ip:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// 是否与给定标识匹配（服务名、分组、IP、端口、集群）
    pub fn same_identity(&self, other: &ServiceInstance) -> bool {
        self.service_name == other.service_name
            && self.group_name == other.group_name
            && self.ip == other.ip
            && self.port == other.port
            && self.cluster_name == other.cluster_name
    }

    fn refresh_instance_id(&mut self) {
        self.instance_id = instance_id_for(
            &self.ip,
            self.port,
            &self.cluster_name,
            &self.group_name,
            &self.service_name,
        );
    }
}

/// 服务注册请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRegisterRequest {
    pub service_name: String,
    pub group_name: String,
    pub ip: String,
    pub port: u16,
    pub weight: f64,
    pub metadata: HashMap<String, String>,
    pub cluster_name: String,
    pub ephemeral: bool,
}

impl ServiceRegisterRequest {
    pub fn new(service_name: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            group_name: DEFAULT_GROUP.to_string(),
            ip: ip.into(),
            port,
            weight: 1.0,
            metadata: HashMap::new(),
            cluster_name: DEFAULT_CLUSTER.to_string(),
            ephemeral: true,
        }
    }

    pub fn group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = group_name.into();
        self
    }

    pub fn cluster(mut self, cluster_name: impl Into<String>) -> Self {
        self.cluster_name = cluster_name.into();
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    /// 该请求对应的实例 ID
    pub fn instance_id(&self) -> String {
        instance_id_for(
            &self.ip,
            self.port,
            &self.cluster_name,
            &self.group_name,
            &self.service_name,
        )
    }

    /// 转换为实例快照（用于进程内后端）
    pub fn to_instance(&self) -> ServiceInstance {
        ServiceInstance {
            instance_id: self.instance_id(),
            service_name: self.service_name.clone(),
            group_name: self.group_name.clone(),
            cluster_name: self.cluster_name.clone(),
            ip: self.ip.clone(),
            port: self.port,
            weight: self.weight,
            healthy: true,
            enabled: true,
            ephemeral: self.ephemeral,
            metadata: self.metadata.clone(),
        }
    }
}

/// 注销请求（IP/端口已解析）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeregisterRequest {
    pub service_name: String,
    pub group_name: String,
    pub ip: String,
    pub port: u16,
    pub cluster_name: String,
    pub ephemeral: bool,
}

impl DeregisterRequest {
    /// 该请求对应的实例 ID
    pub fn instance_id(&self) -> String {
        instance_id_for(
            &self.ip,
            self.port,
            &self.cluster_name,
            &self.group_name,
            &self.service_name,
        )
    }
}

/// 生成实例 ID，格式：`ip#port#cluster#group@@service`
pub fn instance_id_for(ip: &str, port: u16, cluster: &str, group: &str, service: &str) -> String {
    format!("{}#{}#{}#{}@@{}", ip, port, cluster, group, service)
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
