//! Nacos Open API HTTP 传输层
//!
//! 按配置顺序尝试各服务端地址，传输失败时切换到下一个地址。
//! 配置了用户名时先登录获取 accessToken，收到 403 时重新登录一次。

use std::time::Duration;

use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, BackendResult, SessionConfig};

const CONTEXT_PATH: &str = "/nacos";

/// 一次 Open API 调用
pub(crate) struct ApiRequest<'a> {
    pub method: Method,
    pub path: &'a str,
    pub params: Vec<(&'static str, String)>,
    pub headers: Vec<(&'static str, String)>,
    pub timeout: Option<Duration>,
}

impl<'a> ApiRequest<'a> {
    pub fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            params: Vec::new(),
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    pub fn header(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((key, value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// 原始响应
pub(crate) struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// 非 2xx 状态转换为后端错误
    pub fn ensure_success(self) -> BackendResult<String> {
        if self.status.is_success() {
            Ok(self.body)
        } else {
            Err(format!("nacos server returned {}: {}", self.status, self.body.trim()).into())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    token_ttl: Option<u64>,
}

/// Nacos HTTP 客户端
pub(crate) struct NacosHttpClient {
    http: HttpClient,
    servers: Vec<String>,
    namespace: String,
    username: Option<String>,
    password: Option<String>,
    access_token: RwLock<Option<String>>,
}

impl NacosHttpClient {
    /// 建立连接：有认证信息时登录，否则探测服务端存活
    pub async fn connect(config: &SessionConfig) -> BackendResult<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()?;

        let client = Self {
            http,
            servers: config
                .server_addresses
                .iter()
                .map(|addr| normalize_server(addr))
                .collect(),
            namespace: config.namespace.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            access_token: RwLock::new(None),
        };

        if client.username.is_some() {
            client.login().await?;
        } else {
            client
                .execute(ApiRequest::new(Method::GET, "/v1/console/health/liveness"))
                .await?
                .ensure_success()?;
        }
        info!(servers = ?client.servers, namespace = %client.namespace, "Nacos 会话已建立");
        Ok(client)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// 登录并保存 accessToken
    async fn login(&self) -> BackendResult<()> {
        let username = self.username.clone().unwrap_or_default();
        let password = self.password.clone().unwrap_or_default();
        let mut last_error: Option<BackendError> = None;

        for server in &self.servers {
            let url = format!("{}{}/v1/auth/login", server, CONTEXT_PATH);
            let result = self
                .http
                .post(&url)
                .form(&[("username", username.as_str()), ("password", password.as_str())])
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let login: LoginResponse = resp.json().await?;
                    debug!(server = %server, ttl = ?login.token_ttl, "Nacos 登录成功");
                    *self.access_token.write().await = Some(login.access_token);
                    return Ok(());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(format!("nacos login failed ({}): {}", status, body.trim()).into());
                }
                Err(err) => {
                    warn!(server = %server, error = %err, "Nacos 登录请求失败，尝试下一个地址");
                    last_error = Some(err.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| "no nacos server address configured".into()))
    }

    /// 执行请求，传输失败时依次尝试其余地址
    pub async fn execute(&self, request: ApiRequest<'_>) -> BackendResult<ApiResponse> {
        let mut last_error: Option<BackendError> = None;

        for server in &self.servers {
            match self.send_once(server, &request).await {
                Ok(resp) if resp.status == StatusCode::FORBIDDEN && self.username.is_some() => {
                    debug!(server = %server, "accessToken 失效，重新登录");
                    self.login().await?;
                    return self.send_once(server, &request).await.map_err(Into::into);
                }
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    warn!(server = %server, path = request.path, error = %err, "Nacos 请求失败，尝试下一个地址");
                    last_error = Some(err.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| "no nacos server address configured".into()))
    }

    async fn send_once(
        &self,
        server: &str,
        request: &ApiRequest<'_>,
    ) -> Result<ApiResponse, reqwest::Error> {
        let url = format!("{}{}{}", server, CONTEXT_PATH, request.path);
        let mut params = request.params.clone();
        if let Some(token) = self.access_token.read().await.as_ref() {
            params.push(("accessToken", token.clone()));
        }

        let mut builder = self.http.request(request.method.clone(), &url);
        builder = if request.method == Method::POST {
            builder.form(&params)
        } else {
            builder.query(&params)
        };
        for (key, value) in &request.headers {
            builder = builder.header(*key, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok(ApiResponse { status, body })
    }
}

/// 补全协议前缀并去掉末尾斜杠
fn normalize_server(addr: &str) -> String {
    let addr = addr.trim().trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}
