//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 连接相关错误（会话建立、认证、网络）
/// - 2000-2999: 服务注册/注销错误
/// - 3000-3999: 服务发现错误
/// - 4000-4999: 配置读写与解析错误
/// - 5000-5999: 配置监听器错误
/// - 6000-6999: 客户端状态错误（未初始化）
/// - 9000-9999: 通用错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 连接相关错误 (1000-1999)
    // ============================================================
    ConnectionFailed = 1000,
    ConnectionTimeout = 1001,
    AuthenticationFailed = 1002,
    InvalidServerAddress = 1003,

    // ============================================================
    // 服务注册相关错误 (2000-2999)
    // ============================================================
    ServiceRegistrationFailed = 2000,
    ServiceDeregistrationFailed = 2001,
    InstanceNotRegistered = 2002,

    // ============================================================
    // 服务发现相关错误 (3000-3999)
    // ============================================================
    ServiceDiscoveryFailed = 3000,

    // ============================================================
    // 配置相关错误 (4000-4999)
    // ============================================================
    ConfigFetchFailed = 4000,
    ConfigPublishFailed = 4001,
    ConfigRemoveFailed = 4002,
    ConfigParseFailed = 4003,

    // ============================================================
    // 配置监听器相关错误 (5000-5999)
    // ============================================================
    ListenerAddFailed = 5000,
    ListenerRemoveFailed = 5001,

    // ============================================================
    // 客户端状态错误 (6000-6999)
    // ============================================================
    NamingNotInitialized = 6000,
    ConfigNotInitialized = 6001,
    ClientNotInitialized = 6002,

    // ============================================================
    // 通用错误 (9000-9999)
    // ============================================================
    InvalidParameter = 9001,
    SettingsError = 9002,
    InternalError = 9003,
    UnknownError = 9999,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 从数字值创建错误代码
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1000 => Some(ErrorCode::ConnectionFailed),
            1001 => Some(ErrorCode::ConnectionTimeout),
            1002 => Some(ErrorCode::AuthenticationFailed),
            1003 => Some(ErrorCode::InvalidServerAddress),
            2000 => Some(ErrorCode::ServiceRegistrationFailed),
            2001 => Some(ErrorCode::ServiceDeregistrationFailed),
            2002 => Some(ErrorCode::InstanceNotRegistered),
            3000 => Some(ErrorCode::ServiceDiscoveryFailed),
            4000 => Some(ErrorCode::ConfigFetchFailed),
            4001 => Some(ErrorCode::ConfigPublishFailed),
            4002 => Some(ErrorCode::ConfigRemoveFailed),
            4003 => Some(ErrorCode::ConfigParseFailed),
            5000 => Some(ErrorCode::ListenerAddFailed),
            5001 => Some(ErrorCode::ListenerRemoveFailed),
            6000 => Some(ErrorCode::NamingNotInitialized),
            6001 => Some(ErrorCode::ConfigNotInitialized),
            6002 => Some(ErrorCode::ClientNotInitialized),
            9001 => Some(ErrorCode::InvalidParameter),
            9002 => Some(ErrorCode::SettingsError),
            9003 => Some(ErrorCode::InternalError),
            9999 => Some(ErrorCode::UnknownError),
            _ => None,
        }
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
            ErrorCode::ConnectionTimeout => "CONNECTION_TIMEOUT",
            ErrorCode::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorCode::InvalidServerAddress => "INVALID_SERVER_ADDRESS",
            ErrorCode::ServiceRegistrationFailed => "SERVICE_REGISTRATION_FAILED",
            ErrorCode::ServiceDeregistrationFailed => "SERVICE_DEREGISTRATION_FAILED",
            ErrorCode::InstanceNotRegistered => "INSTANCE_NOT_REGISTERED",
            ErrorCode::ServiceDiscoveryFailed => "SERVICE_DISCOVERY_FAILED",
            ErrorCode::ConfigFetchFailed => "CONFIG_FETCH_FAILED",
            ErrorCode::ConfigPublishFailed => "CONFIG_PUBLISH_FAILED",
            ErrorCode::ConfigRemoveFailed => "CONFIG_REMOVE_FAILED",
            ErrorCode::ConfigParseFailed => "CONFIG_PARSE_FAILED",
            ErrorCode::ListenerAddFailed => "LISTENER_ADD_FAILED",
            ErrorCode::ListenerRemoveFailed => "LISTENER_REMOVE_FAILED",
            ErrorCode::NamingNotInitialized => "NAMING_NOT_INITIALIZED",
            ErrorCode::ConfigNotInitialized => "CONFIG_NOT_INITIALIZED",
            ErrorCode::ClientNotInitialized => "CLIENT_NOT_INITIALIZED",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::SettingsError => "SETTINGS_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// 获取错误代码的类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::InvalidParameter => ErrorCategory::InvalidArgument,
            _ => match self.as_u32() {
                1000..=1999 => ErrorCategory::Connection,
                2000..=2999 => ErrorCategory::ServiceRegistration,
                3000..=3999 => ErrorCategory::ServiceDiscovery,
                4000..=4999 => ErrorCategory::Config,
                5000..=5999 => ErrorCategory::ConfigListener,
                6000..=6999 => ErrorCategory::NotInitialized,
                _ => ErrorCategory::Internal,
            },
        }
    }

    /// 是否为可重试的错误
    ///
    /// 本层不做自动重试，该标记仅供调用方决定重试策略
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ConnectionFailed
                | ErrorCode::ConnectionTimeout
                | ErrorCode::ServiceRegistrationFailed
                | ErrorCode::ServiceDeregistrationFailed
                | ErrorCode::ServiceDiscoveryFailed
                | ErrorCode::ConfigFetchFailed
                | ErrorCode::ConfigPublishFailed
                | ErrorCode::ConfigRemoveFailed
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// 会话建立或网络失败
    Connection,
    /// 服务注册/注销失败
    ServiceRegistration,
    /// 服务查询失败（空结果不属于错误）
    ServiceDiscovery,
    /// 配置读写或解析失败
    Config,
    /// 配置监听器添加/移除失败
    ConfigListener,
    /// 对应会话尚未初始化
    NotInitialized,
    /// 参数非法
    InvalidArgument,
    /// 内部错误
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Connection => "connection",
            ErrorCategory::ServiceRegistration => "service_registration",
            ErrorCategory::ServiceDiscovery => "service_discovery",
            ErrorCategory::Config => "config",
            ErrorCategory::ConfigListener => "config_listener",
            ErrorCategory::NotInitialized => "not_initialized",
            ErrorCategory::InvalidArgument => "invalid_argument",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}
