//! 客户端错误处理模块
//!
//! 错误按类别划分：连接、服务注册、服务发现、配置、配置监听器、未初始化。
//! 所有后端错误都在调用点被包装为对应类别的 `ClientError`，原始错误保存在 details 中。

pub mod builder;
pub mod client_error;
pub mod code;
pub mod conversions;

pub use builder::ErrorBuilder;
pub use client_error::{ClientError, Result};
pub use code::{ErrorCategory, ErrorCode};

use crate::backend::BackendResult;

/// 将后端错误转换为 `ClientError`
pub fn map_backend_error<E, S>(error: E, code: ErrorCode, message: S) -> ClientError
where
    E: std::fmt::Display,
    S: Into<String>,
{
    ErrorBuilder::new(code, message.into())
        .details(error.to_string())
        .build()
}

/// `BackendResult` 的辅助扩展，用于在后端调用点转换为统一的错误类型
pub trait BackendResultExt<T> {
    fn into_client<S>(self, code: ErrorCode, message: S) -> Result<T>
    where
        S: Into<String>;
}

impl<T> BackendResultExt<T> for BackendResult<T> {
    fn into_client<S>(self, code: ErrorCode, message: S) -> Result<T>
    where
        S: Into<String>,
    {
        self.map_err(|err| map_backend_error(err, code, message))
    }
}
