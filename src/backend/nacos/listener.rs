//! Nacos 配置长轮询
//!
//! 后台任务把所有被监听的配置及其 MD5 打包提交到 `/v1/cs/configs/listener`，
//! 服务端在超时时间内返回发生变更的配置列表，任务随后拉取新内容并回调。
//! 第一次添加监听器时启动，会话关闭时通过 `CancellationToken` 退出。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{ApiRequest, NacosHttpClient};
use crate::backend::{BackendResult, ConfigCallback};

const LISTENER_PATH: &str = "/v1/cs/configs/listener";
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(2);
const IDLE_DELAY: Duration = Duration::from_secs(1);

const FIELD_SEPARATOR: char = '\u{2}';
const RECORD_SEPARATOR: char = '\u{1}';

/// 被监听配置的标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct WatchKey {
    pub data_id: String,
    pub group: String,
}

struct WatchEntry {
    md5: String,
    callbacks: Vec<ConfigCallback>,
}

/// 监听登记表
#[derive(Default)]
pub(crate) struct WatchRegistry {
    entries: Mutex<HashMap<WatchKey, WatchEntry>>,
}

impl WatchRegistry {
    /// 登记回调，首次登记时记录当前内容的 MD5
    pub fn add(&self, key: WatchKey, content: Option<&str>, callback: ConfigCallback) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(key).or_insert_with(|| WatchEntry {
            md5: content_md5(content),
            callbacks: Vec::new(),
        });
        if !entry.callbacks.iter().any(|existing| Arc::ptr_eq(existing, &callback)) {
            entry.callbacks.push(callback);
        }
    }

    /// 按指针移除回调，回调清空后不再监听该配置
    pub fn remove(&self, key: &WatchKey, callback: &ConfigCallback) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(key) {
            entry.callbacks.retain(|existing| !Arc::ptr_eq(existing, callback));
            if entry.callbacks.is_empty() {
                entries.remove(key);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// 拼装 `Listening-Configs` 报文
    pub fn packet(&self, tenant: &str) -> String {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut packet = String::new();
        for (key, entry) in entries.iter() {
            packet.push_str(&key.data_id);
            packet.push(FIELD_SEPARATOR);
            packet.push_str(&key.group);
            packet.push(FIELD_SEPARATOR);
            packet.push_str(&entry.md5);
            if !tenant.is_empty() {
                packet.push(FIELD_SEPARATOR);
                packet.push_str(tenant);
            }
            packet.push(RECORD_SEPARATOR);
        }
        packet
    }

    /// 更新 MD5，返回需要通知的回调；内容未变化时返回空
    fn update(&self, key: &WatchKey, content: Option<&str>) -> Vec<ConfigCallback> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get_mut(key) else {
            return Vec::new();
        };
        let md5 = content_md5(content);
        if entry.md5 == md5 {
            return Vec::new();
        }
        entry.md5 = md5;
        entry.callbacks.clone()
    }
}

/// 内容 MD5，配置不存在时为空串
pub(crate) fn content_md5(content: Option<&str>) -> String {
    match content {
        Some(content) => format!("{:x}", md5::compute(content.as_bytes())),
        None => String::new(),
    }
}

/// 解析长轮询响应：URL 解码后按记录分隔符拆分
pub(crate) fn parse_changed_keys(body: &str) -> Vec<WatchKey> {
    let decoded: String = url::form_urlencoded::parse(body.trim().as_bytes())
        .map(|(key, value)| {
            if value.is_empty() {
                key.into_owned()
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    decoded
        .split(RECORD_SEPARATOR)
        .filter_map(|record| {
            let mut fields = record.split(FIELD_SEPARATOR);
            let data_id = fields.next().filter(|id| !id.is_empty())?;
            let group = fields.next()?;
            Some(WatchKey {
                data_id: data_id.to_string(),
                group: group.to_string(),
            })
        })
        .collect()
}

/// 长轮询任务
pub(crate) async fn run_long_poll(
    client: Arc<NacosHttpClient>,
    registry: Arc<WatchRegistry>,
    cancel: CancellationToken,
) {
    info!("Nacos 配置长轮询任务启动");
    loop {
        if registry.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(IDLE_DELAY) => continue,
            }
        }

        let packet = registry.packet(client.namespace());
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = poll_once(&client, packet) => result,
        };

        match result {
            Ok(changed) => {
                for key in changed {
                    if cancel.is_cancelled() {
                        break;
                    }
                    dispatch_change(&client, &registry, &key).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "Nacos 配置长轮询失败，稍后重试");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
    info!("Nacos 配置长轮询任务退出");
}

async fn poll_once(client: &NacosHttpClient, packet: String) -> BackendResult<Vec<WatchKey>> {
    let request = ApiRequest::new(Method::POST, LISTENER_PATH)
        .param("Listening-Configs", packet)
        .header("Long-Pulling-Timeout", LONG_POLL_TIMEOUT.as_millis().to_string())
        .timeout(LONG_POLL_TIMEOUT + Duration::from_secs(10));
    let body = client.execute(request).await?.ensure_success()?;
    Ok(parse_changed_keys(&body))
}

async fn dispatch_change(client: &NacosHttpClient, registry: &WatchRegistry, key: &WatchKey) {
    let content = match super::config::fetch_config(client, &key.data_id, &key.group).await {
        Ok(content) => content,
        Err(err) => {
            warn!(data_id = %key.data_id, group = %key.group, error = %err, "拉取变更配置失败");
            return;
        }
    };

    let callbacks = registry.update(key, content.as_deref());
    debug!(data_id = %key.data_id, listeners = callbacks.len(), "配置已变更");
    let content = content.unwrap_or_default();
    for callback in callbacks {
        callback(content.clone());
    }
}
