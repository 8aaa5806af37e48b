//! 配置内容解析
//!
//! 先按 JSON 解析，失败后按 YAML 解析，两者都失败时返回配置错误

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::ContentType;
use crate::error::{ClientError, Result};

/// 将配置内容解析为键值映射
///
/// 空内容返回空映射；顶层不是映射时返回配置错误
pub fn parse_structured(content: &str) -> Result<Map<String, Value>> {
    if content.trim().is_empty() {
        return Ok(Map::new());
    }

    let value = match serde_json::from_str::<Value>(content) {
        Ok(value) => value,
        Err(json_err) => serde_yaml::from_str::<Value>(content).map_err(|yaml_err| {
            ClientError::config_parse_failed("配置内容既不是合法的 JSON 也不是合法的 YAML")
                .with_details(format!("json: {}; yaml: {}", json_err, yaml_err))
        })?,
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ClientError::config_parse_failed(format!(
            "配置内容不是键值映射: {}",
            value_kind(&other)
        ))),
    }
}

/// 将配置内容反序列化为指定类型（JSON 优先，YAML 兜底）
pub fn parse_typed<T: DeserializeOwned>(content: &str) -> Result<T> {
    match serde_json::from_str::<T>(content) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_str::<T>(content).map_err(|yaml_err| {
            ClientError::config_parse_failed("配置内容无法反序列化为目标类型")
                .with_details(format!("json: {}; yaml: {}", json_err, yaml_err))
        }),
    }
}

/// 推断配置内容类型
///
/// 只有对象/数组才视为 JSON，只有映射/序列才视为 YAML，其余均为文本
pub fn detect_content_type(content: &str) -> ContentType {
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        if value.is_object() || value.is_array() {
            return ContentType::Json;
        }
    }
    match serde_yaml::from_str::<serde_yaml::Value>(content) {
        Ok(serde_yaml::Value::Mapping(_)) | Ok(serde_yaml::Value::Sequence(_)) => ContentType::Yaml,
        _ => ContentType::Text,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
