//! 配置中心管理器
//!
//! 本地缓存只是读加速，不具权威性：远端变更在下一次显式读取之前可能是陈旧的。
//! 监听器回调由后端在检测到变更时直接调用，回调触发不会自动更新缓存。

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::parser::{detect_content_type, parse_structured, parse_typed};
use super::{ConfigListener, ConfigRequest, ConfigResponse, ContentType, cache_key};
use crate::backend::ConfigSession;
use crate::error::{BackendResultExt, ClientError, ErrorCode, Result, map_backend_error};

/// 单个键的监听器槽位，异步锁保证同一键的添加/移除互斥
type ListenerSlot = Arc<Mutex<Option<ConfigListener>>>;

/// 配置中心管理器
pub struct ConfigManager {
    session: Arc<dyn ConfigSession>,
    cache: DashMap<String, String>,
    listeners: DashMap<String, ListenerSlot>,
}

impl ConfigManager {
    pub fn new(session: Arc<dyn ConfigSession>) -> Self {
        Self {
            session,
            cache: DashMap::new(),
            listeners: DashMap::new(),
        }
    }

    /// 获取配置
    ///
    /// 读取结果写入缓存；配置不存在时返回 `None` 并移除对应缓存键
    pub async fn get(&self, request: &ConfigRequest) -> Result<Option<String>> {
        validate_data_id(&request.data_id)?;
        info!(
            data_id = %request.data_id,
            group = %request.group,
            namespace = %request.namespace,
            "获取配置"
        );

        let content = self
            .session
            .get_config(&request.data_id, &request.group)
            .await
            .inspect_err(|err| {
                error!(data_id = %request.data_id, error = %err, "获取配置失败");
            })
            .into_client(
                ErrorCode::ConfigFetchFailed,
                format!("获取配置失败: {}", request.data_id),
            )?;

        let key = request.cache_key();
        match &content {
            Some(value) => {
                debug!(data_id = %request.data_id, content = %value, "配置获取结果");
                self.cache.insert(key, value.clone());
            }
            None => {
                debug!(data_id = %request.data_id, "配置不存在");
                self.cache.remove(&key);
            }
        }
        Ok(content)
    }

    /// 获取配置并附带推断出的内容类型
    pub async fn get_response(&self, request: &ConfigRequest) -> Result<ConfigResponse> {
        let content = self.get(request).await?;
        let content_type = content
            .as_deref()
            .map(detect_content_type)
            .unwrap_or(ContentType::Text);
        Ok(ConfigResponse {
            data_id: request.data_id.clone(),
            group: request.group.clone(),
            namespace: request.namespace.clone(),
            content,
            content_type,
        })
    }

    /// 获取配置并解析为键值映射（JSON 优先，YAML 兜底）
    ///
    /// 配置不存在或为空时返回空映射
    pub async fn get_structured(&self, request: &ConfigRequest) -> Result<Map<String, Value>> {
        let Some(content) = self.get(request).await? else {
            return Ok(Map::new());
        };
        parse_structured(&content).inspect_err(|err| {
            error!(data_id = %request.data_id, error = %err, "配置内容解析失败");
        })
    }

    /// 获取配置并反序列化为指定类型，配置不存在时返回 `None`
    pub async fn get_typed<T: DeserializeOwned>(&self, request: &ConfigRequest) -> Result<Option<T>> {
        match self.get(request).await? {
            Some(content) => parse_typed(&content).map(Some),
            None => Ok(None),
        }
    }

    /// 发布配置
    ///
    /// 后端返回 `false` 时不修改缓存，调用方必须检查返回值
    pub async fn set(&self, data_id: &str, group: &str, content: &str, namespace: &str) -> Result<bool> {
        validate_data_id(data_id)?;
        info!(data_id, group, namespace, "设置配置");

        let published = self
            .session
            .publish_config(data_id, group, content)
            .await
            .inspect_err(|err| error!(data_id, error = %err, "设置配置失败"))
            .into_client(
                ErrorCode::ConfigPublishFailed,
                format!("设置配置失败: {}", data_id),
            )?;

        if published {
            self.cache
                .insert(cache_key(namespace, group, data_id), content.to_string());
            info!(data_id, "配置设置成功");
        } else {
            warn!(data_id, "配置设置失败");
        }
        Ok(published)
    }

    /// 删除配置
    ///
    /// 成功后移除缓存键；后端返回 `false` 时不修改缓存
    pub async fn delete(&self, data_id: &str, group: &str, namespace: &str) -> Result<bool> {
        validate_data_id(data_id)?;
        info!(data_id, group, namespace, "删除配置");

        let removed = self
            .session
            .remove_config(data_id, group)
            .await
            .inspect_err(|err| error!(data_id, error = %err, "删除配置失败"))
            .into_client(
                ErrorCode::ConfigRemoveFailed,
                format!("删除配置失败: {}", data_id),
            )?;

        if removed {
            self.cache.remove(&cache_key(namespace, group, data_id));
            info!(data_id, "配置删除成功");
        } else {
            warn!(data_id, "配置删除失败");
        }
        Ok(removed)
    }

    /// 添加配置监听器
    ///
    /// 同一键已有监听器时先从后端移除旧回调，再注册新回调，保证任一时刻最多一个生效
    pub async fn add_listener(&self, listener: ConfigListener) -> Result<bool> {
        validate_data_id(&listener.data_id)?;
        let key = listener.key();
        info!(key = %key, "添加配置监听器");

        let slot = self.listener_slot(&key);
        let mut current = slot.lock().await;

        if let Some(previous) = current.take() {
            debug!(key = %key, "替换已有的配置监听器");
            if let Err(err) = self
                .session
                .remove_listener(&previous.data_id, &previous.group, previous.callback())
                .await
            {
                error!(key = %key, error = %err, "移除旧配置监听器失败");
                *current = Some(previous);
                return Err(map_backend_error(
                    err,
                    ErrorCode::ListenerAddFailed,
                    format!("替换配置监听器失败: {}", key),
                ));
            }
        }

        let added = self
            .session
            .add_listener(&listener.data_id, &listener.group, listener.callback().clone())
            .await
            .inspect_err(|err| error!(key = %key, error = %err, "添加配置监听器失败"))
            .into_client(
                ErrorCode::ListenerAddFailed,
                format!("添加配置监听器失败: {}", key),
            );

        match added {
            Ok(()) => {
                *current = Some(listener);
                info!(key = %key, "配置监听器添加成功");
                Ok(true)
            }
            Err(err) => {
                drop(current);
                drop(slot);
                self.prune_slot(&key);
                Err(err)
            }
        }
    }

    /// 移除配置监听器，未注册过监听器时返回 `false`
    pub async fn remove_listener(&self, data_id: &str, group: &str, namespace: &str) -> Result<bool> {
        let key = cache_key(namespace, group, data_id);
        info!(key = %key, "移除配置监听器");

        let Some(slot) = self.listeners.get(&key).map(|slot| slot.value().clone()) else {
            warn!(key = %key, "配置监听器不存在");
            return Ok(false);
        };
        let mut current = slot.lock().await;
        let Some(listener) = current.as_ref() else {
            drop(current);
            drop(slot);
            self.prune_slot(&key);
            warn!(key = %key, "配置监听器不存在");
            return Ok(false);
        };

        self.session
            .remove_listener(&listener.data_id, &listener.group, listener.callback())
            .await
            .inspect_err(|err| error!(key = %key, error = %err, "移除配置监听器失败"))
            .into_client(
                ErrorCode::ListenerRemoveFailed,
                format!("移除配置监听器失败: {}", key),
            )?;

        *current = None;
        drop(current);
        drop(slot);
        self.prune_slot(&key);
        info!(key = %key, "配置监听器移除成功");
        Ok(true)
    }

    /// 当前生效的监听器
    pub async fn active_listener(
        &self,
        data_id: &str,
        group: &str,
        namespace: &str,
    ) -> Option<ConfigListener> {
        let slot = self
            .listeners
            .get(&cache_key(namespace, group, data_id))
            .map(|slot| slot.value().clone())?;
        let current = slot.lock().await;
        current.clone()
    }

    /// 当前生效监听器的键
    pub async fn listener_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for (key, slot) in self.slots_snapshot() {
            if slot.lock().await.is_some() {
                keys.push(key);
            }
        }
        keys.sort();
        keys
    }

    /// 移除全部监听器，返回成功移除的数量
    pub async fn remove_all_listeners(&self) -> usize {
        let mut removed = 0;
        for (key, slot) in self.slots_snapshot() {
            let mut current = slot.lock().await;
            if let Some(listener) = current.as_ref() {
                match self
                    .session
                    .remove_listener(&listener.data_id, &listener.group, listener.callback())
                    .await
                {
                    Ok(()) => {
                        *current = None;
                        removed += 1;
                    }
                    Err(err) => error!(key = %key, error = %err, "移除配置监听器失败"),
                }
            }
            drop(current);
            drop(slot);
            self.prune_slot(&key);
        }
        removed
    }

    /// 重新读取一个配置以刷新缓存，失败只记录日志
    pub async fn refresh_cache(&self, data_id: &str, group: &str, namespace: &str) -> bool {
        let request = ConfigRequest::new(data_id).group(group).namespace(namespace);
        match self.get(&request).await {
            Ok(_) => {
                info!(data_id, "配置缓存刷新成功");
                true
            }
            Err(err) => {
                error!(data_id, error = %err, "刷新配置缓存失败");
                false
            }
        }
    }

    /// 配置缓存快照
    pub fn get_cache(&self) -> HashMap<String, String> {
        self.cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// 清空配置缓存，不影响监听器和后端
    pub fn clear_cache(&self) -> bool {
        self.cache.clear();
        info!("配置缓存清除成功");
        true
    }

    fn listener_slot(&self, key: &str) -> ListenerSlot {
        self.listeners
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone()
    }

    /// 移除空闲槽位；仍被其他调用持有或占用的槽位保留
    fn prune_slot(&self, key: &str) {
        self.listeners.remove_if(key, |_, slot| {
            Arc::strong_count(slot) == 1
                && slot.try_lock().is_ok_and(|current| current.is_none())
        });
    }

    fn slots_snapshot(&self) -> Vec<(String, ListenerSlot)> {
        self.listeners
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

fn validate_data_id(data_id: &str) -> Result<()> {
    if data_id.trim().is_empty() {
        return Err(ClientError::invalid_parameter("dataId 不能为空"));
    }
    Ok(())
}
