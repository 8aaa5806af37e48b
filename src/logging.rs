//! 日志初始化
//!
//! 库本身只产生 `tracing` 事件；嵌入的应用通常自行安装订阅器，
//! 这里只为没有日志配置的宿主提供一个便捷入口。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 安装 fmt 订阅器
///
/// `RUST_LOG` 优先于 `default_level`。已有全局订阅器时返回 `false`。
pub fn init_tracing(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("flare_registry_client={}", default_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

/// 安装 JSON 格式的订阅器，适合采集到日志平台
pub fn init_json_tracing(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("flare_registry_client={}", default_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .is_ok()
}
