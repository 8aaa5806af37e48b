//! 服务注册
//!
//! 负责本进程实例的注册与注销，并记录本进程当前持有的实例，
//! 以支持省略 IP/端口的注销和关闭时的批量清理。

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::{DeregisterRequest, ServiceRegisterRequest};
use crate::backend::NamingSession;
use crate::error::{BackendResultExt, ClientError, ErrorBuilder, ErrorCode, Result};

/// 持有记录的分组键：服务名 + 分组 + 集群
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OwnerKey {
    service_name: String,
    group_name: String,
    cluster_name: String,
}

impl OwnerKey {
    fn new(service_name: &str, group_name: &str, cluster_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            group_name: group_name.to_string(),
            cluster_name: cluster_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OwnedEndpoint {
    ip: String,
    port: u16,
    ephemeral: bool,
}

/// 服务注册管理器
pub struct ServiceRegistry {
    session: Arc<dyn NamingSession>,
    /// 按注册先后排列，最近一次注册在末尾
    owned: DashMap<OwnerKey, Vec<OwnedEndpoint>>,
}

impl ServiceRegistry {
    pub fn new(session: Arc<dyn NamingSession>) -> Self {
        Self {
            session,
            owned: DashMap::new(),
        }
    }

    /// 注册服务实例，返回实例 ID
    ///
    /// 同一实例重复注册不会在本地被拒绝，由后端刷新注册信息
    pub async fn register(&self, request: &ServiceRegisterRequest) -> Result<String> {
        if request.service_name.is_empty() || request.ip.is_empty() {
            return Err(ClientError::invalid_parameter("服务名和 IP 不能为空"));
        }

        let instance_id = request.instance_id();
        info!(
            service = %request.service_name,
            group = %request.group_name,
            cluster = %request.cluster_name,
            ip = %request.ip,
            port = request.port,
            "注册服务实例"
        );

        self.session
            .register_instance(request)
            .await
            .inspect_err(|err| {
                error!(service = %request.service_name, error = %err, "服务注册失败");
            })
            .into_client(
                ErrorCode::ServiceRegistrationFailed,
                format!("服务注册失败: {}", request.service_name),
            )?;

        let key = OwnerKey::new(
            &request.service_name,
            &request.group_name,
            &request.cluster_name,
        );
        let endpoint = OwnedEndpoint {
            ip: request.ip.clone(),
            port: request.port,
            ephemeral: request.ephemeral,
        };
        let mut endpoints = self.owned.entry(key).or_default();
        endpoints.retain(|owned| owned.ip != endpoint.ip || owned.port != endpoint.port);
        endpoints.push(endpoint);

        info!(instance_id = %instance_id, "服务注册成功");
        Ok(instance_id)
    }

    /// 注销服务实例
    ///
    /// 省略 IP/端口时使用本进程在该服务/分组/集群下最近一次注册的值；
    /// 没有可用记录时返回服务注册错误。后端确认后移除本地持有记录。
    pub async fn deregister(
        &self,
        service_name: &str,
        group_name: &str,
        ip: Option<&str>,
        port: Option<u16>,
        cluster_name: &str,
        ephemeral: bool,
    ) -> Result<bool> {
        let key = OwnerKey::new(service_name, group_name, cluster_name);
        let (ip, port) = match (ip, port) {
            (Some(ip), Some(port)) => (ip.to_string(), port),
            (ip, port) => {
                let latest = self
                    .owned
                    .get(&key)
                    .and_then(|endpoints| endpoints.last().cloned())
                    .ok_or_else(|| {
                        ErrorBuilder::new(
                            ErrorCode::InstanceNotRegistered,
                            "未找到本进程的注册记录，且未提供 IP/端口",
                        )
                        .param("service_name", service_name)
                        .param("group_name", group_name)
                        .param("cluster_name", cluster_name)
                        .build()
                    })?;
                (
                    ip.map(str::to_string).unwrap_or(latest.ip),
                    port.unwrap_or(latest.port),
                )
            }
        };

        let request = DeregisterRequest {
            service_name: service_name.to_string(),
            group_name: group_name.to_string(),
            ip,
            port,
            cluster_name: cluster_name.to_string(),
            ephemeral,
        };
        self.deregister_resolved(&key, &request).await
    }

    async fn deregister_resolved(&self, key: &OwnerKey, request: &DeregisterRequest) -> Result<bool> {
        info!(
            service = %request.service_name,
            group = %request.group_name,
            cluster = %request.cluster_name,
            ip = %request.ip,
            port = request.port,
            "注销服务实例"
        );

        let deregistered = self
            .session
            .deregister_instance(request)
            .await
            .inspect_err(|err| {
                error!(service = %request.service_name, error = %err, "服务注销失败");
            })
            .into_client(
                ErrorCode::ServiceDeregistrationFailed,
                format!("服务注销失败: {}", request.service_name),
            )?;

        if deregistered {
            self.forget(key, &request.ip, request.port);
            info!(instance_id = %request.instance_id(), "服务注销成功");
        } else {
            warn!(instance_id = %request.instance_id(), "后端未确认服务注销");
        }
        Ok(deregistered)
    }

    /// 本进程当前持有的实例
    pub fn registered_instances(&self) -> Vec<DeregisterRequest> {
        self.owned
            .iter()
            .flat_map(|entry| {
                let key = entry.key().clone();
                entry
                    .value()
                    .iter()
                    .map(|endpoint| DeregisterRequest {
                        service_name: key.service_name.clone(),
                        group_name: key.group_name.clone(),
                        ip: endpoint.ip.clone(),
                        port: endpoint.port,
                        cluster_name: key.cluster_name.clone(),
                        ephemeral: endpoint.ephemeral,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// 注销本进程持有的全部实例，返回成功注销的数量
    ///
    /// 单个实例失败只记录日志，不中断其余实例的注销
    pub async fn deregister_all(&self) -> usize {
        let owned = self.registered_instances();
        if owned.is_empty() {
            debug!("没有需要注销的服务实例");
            return 0;
        }

        let results = join_all(owned.iter().map(|request| {
            let key = OwnerKey::new(
                &request.service_name,
                &request.group_name,
                &request.cluster_name,
            );
            async move { self.deregister_resolved(&key, request).await }
        }))
        .await;

        results
            .into_iter()
            .filter(|result| matches!(result, Ok(true)))
            .count()
    }

    fn forget(&self, key: &OwnerKey, ip: &str, port: u16) {
        let now_empty = match self.owned.get_mut(key) {
            Some(mut endpoints) => {
                endpoints.retain(|owned| owned.ip != ip || owned.port != port);
                endpoints.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.owned.remove_if(key, |_, endpoints| endpoints.is_empty());
        }
    }
}
