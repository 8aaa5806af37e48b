//! Nacos 配置中心会话

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::client::{ApiRequest, NacosHttpClient};
use super::listener::{WatchKey, WatchRegistry, run_long_poll};
use crate::backend::{BackendResult, ConfigCallback, ConfigSession};

const CONFIG_PATH: &str = "/v1/cs/configs";

pub struct NacosConfigSession {
    client: Arc<NacosHttpClient>,
    watches: Arc<WatchRegistry>,
    poller_started: AtomicBool,
    cancel: CancellationToken,
}

impl NacosConfigSession {
    pub(crate) fn new(client: Arc<NacosHttpClient>) -> Self {
        Self {
            client,
            watches: Arc::new(WatchRegistry::default()),
            poller_started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    fn ensure_poller(&self) {
        if self
            .poller_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tokio::spawn(run_long_poll(
                self.client.clone(),
                self.watches.clone(),
                self.cancel.clone(),
            ));
        }
    }
}

/// 读取配置，404 视为不存在
pub(crate) async fn fetch_config(
    client: &NacosHttpClient,
    data_id: &str,
    group: &str,
) -> BackendResult<Option<String>> {
    let request = ApiRequest::new(Method::GET, CONFIG_PATH)
        .param("dataId", data_id)
        .param("group", group)
        .param("tenant", client.namespace());
    let response = client.execute(request).await?;
    if response.status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    response.ensure_success().map(Some)
}

fn accepted(body: &str) -> bool {
    body.trim().eq_ignore_ascii_case("true")
}

#[async_trait]
impl ConfigSession for NacosConfigSession {
    async fn get_config(&self, data_id: &str, group: &str) -> BackendResult<Option<String>> {
        fetch_config(&self.client, data_id, group).await
    }

    async fn publish_config(&self, data_id: &str, group: &str, content: &str) -> BackendResult<bool> {
        let request = ApiRequest::new(Method::POST, CONFIG_PATH)
            .param("dataId", data_id)
            .param("group", group)
            .param("tenant", self.client.namespace())
            .param("content", content);
        let body = self.client.execute(request).await?.ensure_success()?;
        Ok(accepted(&body))
    }

    async fn remove_config(&self, data_id: &str, group: &str) -> BackendResult<bool> {
        let request = ApiRequest::new(Method::DELETE, CONFIG_PATH)
            .param("dataId", data_id)
            .param("group", group)
            .param("tenant", self.client.namespace());
        let body = self.client.execute(request).await?.ensure_success()?;
        Ok(accepted(&body))
    }

    async fn add_listener(
        &self,
        data_id: &str,
        group: &str,
        callback: ConfigCallback,
    ) -> BackendResult<()> {
        let current = fetch_config(&self.client, data_id, group).await?;
        let key = WatchKey {
            data_id: data_id.to_string(),
            group: group.to_string(),
        };
        self.watches.add(key, current.as_deref(), callback);
        self.ensure_poller();
        debug!(data_id, group, "已登记 Nacos 配置监听");
        Ok(())
    }

    async fn remove_listener(
        &self,
        data_id: &str,
        group: &str,
        callback: &ConfigCallback,
    ) -> BackendResult<()> {
        let key = WatchKey {
            data_id: data_id.to_string(),
            group: group.to_string(),
        };
        self.watches.remove(&key, callback);
        Ok(())
    }

    async fn shutdown(&self) -> BackendResult<()> {
        self.cancel.cancel();
        Ok(())
    }
}

impl Drop for NacosConfigSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
