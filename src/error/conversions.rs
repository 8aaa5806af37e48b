//! 错误类型转换实现

use super::{ClientError, ErrorBuilder, ErrorCode};
use std::io;

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        ErrorBuilder::new(ErrorCode::InternalError, "IO 错误")
            .details(err.to_string())
            .build()
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::config_parse_failed("JSON 解析错误").with_details(err.to_string())
    }
}

impl From<serde_yaml::Error> for ClientError {
    fn from(err: serde_yaml::Error) -> Self {
        ClientError::config_parse_failed("YAML 解析错误").with_details(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ErrorBuilder::new(ErrorCode::SettingsError, "客户端配置文件格式错误")
            .details(err.to_string())
            .build()
    }
}
