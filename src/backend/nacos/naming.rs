//! Nacos 注册中心会话

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::client::{ApiRequest, NacosHttpClient};
use crate::backend::{BackendResult, NamingSession};
use crate::naming::{DeregisterRequest, ServiceInstance, ServiceRegisterRequest, instance_id_for};

const INSTANCE_PATH: &str = "/v1/ns/instance";
const INSTANCE_LIST_PATH: &str = "/v1/ns/instance/list";

#[derive(Debug, Default, Deserialize)]
struct InstanceListResponse {
    #[serde(default)]
    hosts: Vec<ServiceInstance>,
}

pub struct NacosNamingSession {
    client: Arc<NacosHttpClient>,
}

impl NacosNamingSession {
    pub(crate) fn new(client: Arc<NacosHttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NamingSession for NacosNamingSession {
    async fn register_instance(&self, request: &ServiceRegisterRequest) -> BackendResult<()> {
        let metadata = serde_json::to_string(&request.metadata)?;
        let api = ApiRequest::new(Method::POST, INSTANCE_PATH)
            .param("serviceName", request.service_name.clone())
            .param("groupName", request.group_name.clone())
            .param("namespaceId", self.client.namespace())
            .param("clusterName", request.cluster_name.clone())
            .param("ip", request.ip.clone())
            .param("port", request.port.to_string())
            .param("weight", request.weight.to_string())
            .param("ephemeral", request.ephemeral.to_string())
            .param("enabled", "true")
            .param("healthy", "true")
            .param("metadata", metadata);

        let body = self.client.execute(api).await?.ensure_success()?;
        debug!(service = %request.service_name, response = %body.trim(), "Nacos 注册响应");
        Ok(())
    }

    async fn deregister_instance(&self, request: &DeregisterRequest) -> BackendResult<bool> {
        let api = ApiRequest::new(Method::DELETE, INSTANCE_PATH)
            .param("serviceName", request.service_name.clone())
            .param("groupName", request.group_name.clone())
            .param("namespaceId", self.client.namespace())
            .param("clusterName", request.cluster_name.clone())
            .param("ip", request.ip.clone())
            .param("port", request.port.to_string())
            .param("ephemeral", request.ephemeral.to_string());

        let body = self.client.execute(api).await?.ensure_success()?;
        Ok(body.trim().eq_ignore_ascii_case("ok"))
    }

    async fn list_instances(
        &self,
        service_name: &str,
        group_name: &str,
        clusters: &[String],
    ) -> BackendResult<Vec<ServiceInstance>> {
        let api = ApiRequest::new(Method::GET, INSTANCE_LIST_PATH)
            .param("serviceName", service_name)
            .param("groupName", group_name)
            .param("namespaceId", self.client.namespace())
            .param("clusters", clusters.join(","))
            .param("healthyOnly", "false");

        let response = self.client.execute(api).await?;
        if response.status == StatusCode::NOT_FOUND || is_service_not_found(&response.body) {
            return Ok(Vec::new());
        }
        let body = response.ensure_success()?;
        parse_instance_list(&body, service_name, group_name)
    }
}

fn is_service_not_found(body: &str) -> bool {
    body.to_ascii_lowercase().contains("service not found")
}

/// 解析实例列表，`serviceName` 去掉 `group@@` 前缀
pub(crate) fn parse_instance_list(
    body: &str,
    service_name: &str,
    group_name: &str,
) -> BackendResult<Vec<ServiceInstance>> {
    let response: InstanceListResponse = serde_json::from_str(body)?;
    Ok(response
        .hosts
        .into_iter()
        .map(|mut instance| {
            instance.service_name = service_name.to_string();
            instance.group_name = group_name.to_string();
            if instance.instance_id.is_empty() {
                instance.instance_id = instance_id_for(
                    &instance.ip,
                    instance.port,
                    &instance.cluster_name,
                    group_name,
                    service_name,
                );
            }
            instance
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hosts_and_normalizes_names() {
        let body = r#"{
            "name": "DEFAULT_GROUP@@order-service",
            "clusters": "",
            "hosts": [
                {"ip": "10.0.0.1", "port": 8080, "weight": 2.0, "healthy": true,
                 "enabled": true, "ephemeral": true, "clusterName": "DEFAULT",
                 "serviceName": "DEFAULT_GROUP@@order-service",
                 "metadata": {"zone": "a"}},
                {"instanceId": "custom", "ip": "10.0.0.2", "port": 8081, "healthy": false}
            ]
        }"#;

        let instances = parse_instance_list(body, "order-service", "DEFAULT_GROUP").unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].service_name, "order-service");
        assert_eq!(
            instances[0].instance_id,
            "10.0.0.1#8080#DEFAULT#DEFAULT_GROUP@@order-service"
        );
        assert_eq!(instances[0].weight, 2.0);
        assert_eq!(instances[0].metadata.get("zone").map(String::as_str), Some("a"));
        assert_eq!(instances[1].instance_id, "custom");
        assert!(!instances[1].healthy);
        assert_eq!(instances[1].weight, 1.0);
    }

    #[test]
    fn empty_hosts_is_empty_list() {
        let instances = parse_instance_list(r#"{"hosts": []}"#, "svc", "DEFAULT_GROUP").unwrap();
        assert!(instances.is_empty());
        assert!(is_service_not_found("caused: service not found: public##DEFAULT_GROUP@@svc"));
    }
}
