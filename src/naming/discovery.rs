//! 服务发现
//!
//! 每次调用都直接查询后端，不在本地缓存实例列表

use std::sync::Arc;

use tracing::{debug, error};

use super::load_balancer::{CursorKey, LoadBalanceStrategy, LoadBalancer};
use super::{DEFAULT_GROUP, ServiceInstance};
use crate::backend::NamingSession;
use crate::error::{BackendResultExt, ClientError, ErrorCode, Result};

/// 服务查询条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceQuery {
    pub service_name: String,
    pub group_name: String,
    /// 为空表示不限集群
    pub clusters: Vec<String>,
    /// 只返回健康实例（默认 true）
    pub healthy_only: bool,
}

impl ServiceQuery {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            group_name: DEFAULT_GROUP.to_string(),
            clusters: Vec::new(),
            healthy_only: true,
        }
    }

    pub fn group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = group_name.into();
        self
    }

    pub fn clusters<I, S>(mut self, clusters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clusters = clusters.into_iter().map(Into::into).collect();
        self
    }

    pub fn healthy_only(mut self, healthy_only: bool) -> Self {
        self.healthy_only = healthy_only;
        self
    }

    /// 轮询游标键
    pub fn cursor_key(&self) -> CursorKey {
        CursorKey::new(&self.service_name, &self.group_name, &self.clusters)
    }
}

/// 服务发现管理器
pub struct ServiceDiscovery {
    session: Arc<dyn NamingSession>,
    balancer: LoadBalancer,
}

impl ServiceDiscovery {
    pub fn new(session: Arc<dyn NamingSession>) -> Self {
        Self {
            session,
            balancer: LoadBalancer::new(),
        }
    }

    /// 查询服务实例
    ///
    /// 服务不存在或没有实例时返回空列表，不视为错误
    pub async fn get_instances(&self, query: &ServiceQuery) -> Result<Vec<ServiceInstance>> {
        if query.service_name.is_empty() {
            return Err(ClientError::invalid_parameter("服务名不能为空"));
        }

        let instances = self
            .session
            .list_instances(&query.service_name, &query.group_name, &query.clusters)
            .await
            .inspect_err(|err| {
                error!(service = %query.service_name, error = %err, "查询服务实例失败");
            })
            .into_client(
                ErrorCode::ServiceDiscoveryFailed,
                format!("查询服务实例失败: {}", query.service_name),
            )?;

        let total = instances.len();
        let instances: Vec<ServiceInstance> = if query.healthy_only {
            instances.into_iter().filter(|inst| inst.healthy).collect()
        } else {
            instances
        };

        debug!(
            service = %query.service_name,
            group = %query.group_name,
            total,
            selected = instances.len(),
            "查询服务实例完成"
        );
        Ok(instances)
    }

    /// 按策略选择一个实例，没有可用实例时返回 `None`
    pub async fn choose_one(
        &self,
        query: &ServiceQuery,
        strategy: LoadBalanceStrategy,
    ) -> Result<Option<ServiceInstance>> {
        let instances = self.get_instances(query).await?;
        let chosen = self
            .balancer
            .select(&query.cursor_key(), &instances, strategy)
            .cloned();

        match &chosen {
            Some(instance) => debug!(
                service = %query.service_name,
                strategy = %strategy,
                instance = %instance.address(),
                "选中服务实例"
            ),
            None => debug!(service = %query.service_name, "没有可用的服务实例"),
        }
        Ok(chosen)
    }

    /// 按策略名选择一个实例，未知策略名返回参数错误
    pub async fn choose_one_by_name(
        &self,
        query: &ServiceQuery,
        strategy: &str,
    ) -> Result<Option<ServiceInstance>> {
        let strategy: LoadBalanceStrategy = strategy.parse()?;
        self.choose_one(query, strategy).await
    }

    /// 负载均衡器（用于观察轮询游标）
    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }
}
