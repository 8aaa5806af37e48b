//! 错误模型测试

use flare_registry_client::error::map_backend_error;
use flare_registry_client::{BackendError, ClientError, ErrorBuilder, ErrorCategory, ErrorCode};

#[test]
fn codes_map_to_categories_by_range() {
    let cases = [
        (ErrorCode::InvalidServerAddress, ErrorCategory::Connection),
        (ErrorCode::InstanceNotRegistered, ErrorCategory::ServiceRegistration),
        (ErrorCode::ServiceDiscoveryFailed, ErrorCategory::ServiceDiscovery),
        (ErrorCode::ConfigParseFailed, ErrorCategory::Config),
        (ErrorCode::ListenerRemoveFailed, ErrorCategory::ConfigListener),
        (ErrorCode::ClientNotInitialized, ErrorCategory::NotInitialized),
        (ErrorCode::InvalidParameter, ErrorCategory::InvalidArgument),
        (ErrorCode::SettingsError, ErrorCategory::Internal),
    ];
    for (code, category) in cases {
        assert_eq!(code.category(), category, "{}", code);
        assert_eq!(ErrorCode::from_u32(code.as_u32()), Some(code));
    }
    assert_eq!(ErrorCode::from_u32(4242), None);
}

#[test]
fn backend_errors_keep_cause_in_details() {
    let cause: BackendError = "503 service unavailable".into();
    let err = map_backend_error(cause, ErrorCode::ConfigFetchFailed, "获取配置失败: app.yaml");

    assert_eq!(err.category(), ErrorCategory::Config);
    assert_eq!(err.reason(), "获取配置失败: app.yaml");
    assert_eq!(err.details(), Some("503 service unavailable"));
    assert!(err.is_retryable());
    assert!(err.to_string().contains("CONFIG_FETCH_FAILED"));
}

#[test]
fn builder_attaches_params() {
    let err = ErrorBuilder::new(ErrorCode::InstanceNotRegistered, "未找到注册记录")
        .param("service_name", "order-service")
        .details("no owned endpoint")
        .build();

    assert_eq!(err.code(), ErrorCode::InstanceNotRegistered);
    assert_eq!(err.param("service_name"), Some("order-service"));
    assert_eq!(err.param("missing"), None);
    assert!(!err.is_retryable());
}

#[test]
fn invalid_parameter_is_not_retryable() {
    let err = ClientError::invalid_parameter("unknown strategy: fastest").with_details("hint");
    assert_eq!(err.code(), ErrorCode::InvalidParameter);
    assert_eq!(err.category(), ErrorCategory::InvalidArgument);
    assert_eq!(err.details(), Some("hint"));
    assert!(err.timestamp() <= chrono::Utc::now());
    assert!(!err.is_not_initialized());
    assert!(!err.is_retryable());
}

#[test]
fn conversions_from_parse_errors() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: ClientError = json_err.into();
    assert_eq!(err.category(), ErrorCategory::Config);
    assert!(err.details().is_some());

    let toml_err = toml::from_str::<toml::Table>("[broken").unwrap_err();
    let err: ClientError = toml_err.into();
    assert_eq!(err.code(), ErrorCode::SettingsError);

    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
    let err: ClientError = io_err.into();
    assert_eq!(err.code(), ErrorCode::InternalError);
}
