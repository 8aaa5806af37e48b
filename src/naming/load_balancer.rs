//! 负载均衡模块
//!
//! 提供多种负载均衡策略，用于从多个服务实例中选择一个

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ServiceInstance;
use crate::error::ClientError;

/// 负载均衡策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// 均匀随机
    Random,
    /// 轮询（按服务/分组/集群独立计数）
    RoundRobin,
    /// 加权随机
    WeightRandom,
}

impl LoadBalanceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalanceStrategy::Random => "random",
            LoadBalanceStrategy::RoundRobin => "round_robin",
            LoadBalanceStrategy::WeightRandom => "weight_random",
        }
    }
}

impl Default for LoadBalanceStrategy {
    fn default() -> Self {
        LoadBalanceStrategy::RoundRobin
    }
}

impl fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadBalanceStrategy {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "random" => Ok(LoadBalanceStrategy::Random),
            "round_robin" | "roundrobin" => Ok(LoadBalanceStrategy::RoundRobin),
            "weight_random" | "weighted_random" | "weightrandom" => {
                Ok(LoadBalanceStrategy::WeightRandom)
            }
            _ => Err(ClientError::invalid_parameter(format!(
                "未知的负载均衡策略: {}",
                s
            ))),
        }
    }
}

/// 轮询游标键：服务名 + 分组 + 集群集合
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorKey {
    service_name: String,
    group_name: String,
    clusters: String,
}

impl CursorKey {
    /// 集群集合与顺序无关
    pub fn new(service_name: &str, group_name: &str, clusters: &[String]) -> Self {
        let mut sorted: Vec<&str> = clusters.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();
        Self {
            service_name: service_name.to_string(),
            group_name: group_name.to_string(),
            clusters: sorted.join(","),
        }
    }
}

/// 负载均衡器
///
/// 轮询游标按 [`CursorKey`] 懒创建，进程生命周期内一直保留
#[derive(Debug, Default)]
pub struct LoadBalancer {
    cursors: DashMap<CursorKey, Arc<AtomicUsize>>,
}

impl LoadBalancer {
    /// 创建新的负载均衡器
    pub fn new() -> Self {
        Self {
            cursors: DashMap::new(),
        }
    }

    /// 选择服务实例，列表为空时返回 `None`
    pub fn select<'a>(
        &self,
        key: &CursorKey,
        instances: &'a [ServiceInstance],
        strategy: LoadBalanceStrategy,
    ) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }

        match strategy {
            LoadBalanceStrategy::Random => select_random(instances),
            LoadBalanceStrategy::RoundRobin => self.select_round_robin(key, instances),
            LoadBalanceStrategy::WeightRandom => select_weight_random(instances),
        }
    }

    /// 当前游标值（尚未轮询过的键返回 `None`）
    pub fn cursor_position(&self, key: &CursorKey) -> Option<usize> {
        self.cursors
            .get(key)
            .map(|cursor| cursor.load(Ordering::Acquire))
    }

    /// 轮询选择
    ///
    /// 游标每次调用都递增，列表长度变化时按当前长度取模
    fn select_round_robin<'a>(
        &self,
        key: &CursorKey,
        instances: &'a [ServiceInstance],
    ) -> Option<&'a ServiceInstance> {
        let cursor = self.cursor(key);
        let index = cursor.fetch_add(1, Ordering::AcqRel);
        instances.get(index % instances.len())
    }

    fn cursor(&self, key: &CursorKey) -> Arc<AtomicUsize> {
        if let Some(cursor) = self.cursors.get(key) {
            return cursor.value().clone();
        }
        self.cursors
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
            .value()
            .clone()
    }
}

/// 随机选择
fn select_random(instances: &[ServiceInstance]) -> Option<&ServiceInstance> {
    let index = rand::thread_rng().gen_range(0..instances.len());
    instances.get(index)
}

/// 加权随机选择
///
/// 权重之和为 0 时退化为均匀随机
fn select_weight_random(instances: &[ServiceInstance]) -> Option<&ServiceInstance> {
    let weights: Vec<f64> = instances
        .iter()
        .map(|instance| effective_weight(instance.weight))
        .collect();
    let total: f64 = weights.iter().sum();

    if total <= 0.0 || !total.is_finite() {
        return select_random(instances);
    }

    let point = rand::thread_rng().gen_range(0.0..total);
    let mut prefix = 0.0_f64;
    for (instance, weight) in instances.iter().zip(&weights) {
        prefix += weight;
        if prefix > point {
            return Some(instance);
        }
    }

    // 浮点累加误差：落到最后一个权重为正的实例
    instances
        .iter()
        .zip(&weights)
        .rev()
        .find(|(_, weight)| **weight > 0.0)
        .map(|(instance, _)| instance)
}

/// 负数与 NaN 按 0 处理
fn effective_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}
