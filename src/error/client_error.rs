//! 客户端统一错误类型

use super::code::{ErrorCategory, ErrorCode};
use std::collections::HashMap;
use thiserror::Error;

/// 客户端统一错误类型
///
/// 后端返回的原始错误在调用点被捕获，并以文本形式保存在 `details` 中
#[derive(Error, Debug, Clone)]
#[error("错误 [{code}] {reason}")]
pub struct ClientError {
    pub(crate) code: ErrorCode,
    pub(crate) reason: String,
    pub(crate) details: Option<String>,
    pub(crate) params: Option<HashMap<String, String>>,
    pub(crate) timestamp: chrono::DateTime<chrono::Utc>,
}

impl ClientError {
    /// 创建带错误代码的错误
    pub fn coded(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            details: None,
            params: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// 配置内容解析失败
    pub fn config_parse_failed(reason: impl Into<String>) -> Self {
        Self::coded(ErrorCode::ConfigParseFailed, reason)
    }

    /// 注册中心客户端未初始化
    pub fn naming_not_initialized() -> Self {
        Self::coded(
            ErrorCode::NamingNotInitialized,
            "注册中心客户端未初始化，请先调用 init_registry_discovery",
        )
    }

    /// 配置中心客户端未初始化
    pub fn config_not_initialized() -> Self {
        Self::coded(
            ErrorCode::ConfigNotInitialized,
            "配置中心客户端未初始化，请先调用 init_config",
        )
    }

    /// 参数非法
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::coded(ErrorCode::InvalidParameter, reason)
    }

    /// 附加错误详情
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// 获取错误详情（通常是后端返回的原始错误）
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.as_ref()?.get(key).map(String::as_str)
    }

    /// 错误发生时间
    pub fn timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        self.timestamp
    }

    /// 是否为未初始化错误
    pub fn is_not_initialized(&self) -> bool {
        self.category() == ErrorCategory::NotInitialized
    }

    /// 判断是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ClientError>;
