//! 错误构建器

use super::{ClientError, ErrorCode};

/// 链式构建 `ClientError`，用于需要附加参数的调用点
pub struct ErrorBuilder {
    error: ClientError,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            error: ClientError::coded(code, reason),
        }
    }

    /// 后端原始错误文本
    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.error.details = Some(details.into());
        self
    }

    /// 附加上下文参数，例如服务名、dataId
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.error
            .params
            .get_or_insert_with(Default::default)
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ClientError {
        self.error
    }
}
