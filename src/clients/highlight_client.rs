/// CAST Highlight API 客户端
///
/// 封装创建远程应用的 HTTP 调用
use crate::config::Config;
use crate::error::RegistrationError;
use crate::models::{ApplicationRef, RepositoryDescriptor};
use crate::services::ApplicationRegistrar;
use crate::utils::logging::truncate_text;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// 错误响应体在错误信息里最多保留的字符数
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Highlight API 客户端
#[derive(Debug, Clone, Default)]
pub struct HighlightClient {
    http: reqwest::Client,
}

impl HighlightClient {
    /// 创建新的客户端
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// 应用创建接口地址
    fn applications_endpoint(config: &Config) -> String {
        format!(
            "{}/domains/{}/applications",
            config.cast.base_url.trim_end_matches('/'),
            config.cast.company_id.trim()
        )
    }

    /// 远程应用名称
    pub fn application_name(descriptor: &RepositoryDescriptor, config: &Config) -> String {
        format!("{}{}", descriptor.name, config.cast.application_suffix)
    }

    /// 构建请求体
    fn build_payload(app_name: &str, config: &Config) -> Result<Value, RegistrationError> {
        let domain_id: u64 = config.cast.company_id.trim().parse().map_err(|_| {
            RegistrationError::transport(format!(
                "company id '{}' 不是数字",
                config.cast.company_id
            ))
        })?;

        Ok(json!([{
            "name": app_name,
            "domains": [{ "id": domain_id }]
        }]))
    }

    /// 从响应中提取应用 ID（数字或字符串）
    pub fn extract_application_id(body: &Value) -> Option<String> {
        let id = body.get("result")?.as_array()?.first()?.get("id")?;
        match id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl ApplicationRegistrar for HighlightClient {
    async fn create_application(
        &self,
        descriptor: &RepositoryDescriptor,
        config: &Config,
    ) -> Result<ApplicationRef, RegistrationError> {
        let endpoint = Self::applications_endpoint(config);
        let app_name = Self::application_name(descriptor, config);
        let payload = Self::build_payload(&app_name, config)?;

        info!(
            "正在创建应用 '{}' (domain {})",
            app_name, config.cast.company_id
        );
        debug!("POST {} Payload: {}", endpoint, payload);

        let mut request = self
            .http
            .post(&endpoint)
            .timeout(config.http_timeout())
            .json(&payload);

        request = match config.cast.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => request.bearer_auth(token),
            None => request.basic_auth(
                config.cast.login.clone().unwrap_or_default(),
                config.cast.password.clone(),
            ),
        };

        let response = request.send().await.map_err(|e| {
            warn!("创建应用请求失败 ({}): {}", endpoint, e);
            if e.is_timeout() {
                RegistrationError::transport(format!(
                    "请求超时 ({}s): {}",
                    config.cast.http_timeout_secs, e
                ))
            } else {
                RegistrationError::transport(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RegistrationError::transport(format!("读取响应失败: {}", e)))?;

        if !status.is_success() {
            return Err(RegistrationError::status(
                status.as_u16(),
                truncate_text(&text, MAX_ERROR_BODY_CHARS),
            ));
        }

        let body: Value = serde_json::from_str(&text).map_err(|_| {
            RegistrationError::status(
                status.as_u16(),
                format!("响应不是 JSON: {}", truncate_text(&text, MAX_ERROR_BODY_CHARS)),
            )
        })?;

        debug!("创建应用结果: {}", body);

        let id = Self::extract_application_id(&body).ok_or_else(|| {
            RegistrationError::status(
                status.as_u16(),
                format!("响应中没有应用ID: {}", truncate_text(&text, MAX_ERROR_BODY_CHARS)),
            )
        })?;

        info!("✓ 应用创建成功，ID: {}", id);

        Ok(ApplicationRef { id, name: app_name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> Config {
        let mut config = Config::default();
        config.cast.base_url = base_url.to_string();
        config.cast.company_id = "42".to_string();
        config.cast.token = Some("secret-token".to_string());
        config.cast.docker_image = "img".to_string();
        config.cast.http_timeout_secs = 2;
        config
    }

    fn repo() -> RepositoryDescriptor {
        RepositoryDescriptor::new("alpha", "https://x/alpha.git")
    }

    #[tokio::test]
    async fn test_create_application_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/domains/42/applications"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_json(json!([
                { "name": "alpha-analysis", "domains": [{ "id": 42 }] }
            ])))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": [{ "id": 1001 }] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HighlightClient::new();
        let app = client
            .create_application(&repo(), &test_config(&server.uri()))
            .await
            .unwrap();

        assert_eq!(
            app,
            ApplicationRef {
                id: "1001".to_string(),
                name: "alpha-analysis".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_basic_auth_used_without_token() {
        let server = MockServer::start().await;
        // "user:pw" 的 base64
        Mock::given(method("POST"))
            .and(header("authorization", "Basic dXNlcjpwdw=="))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": [{ "id": "abc" }] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.cast.token = None;
        config.cast.login = Some("user".to_string());
        config.cast.password = Some("pw".to_string());

        let app = HighlightClient::new()
            .create_application(&repo(), &config)
            .await
            .unwrap();
        assert_eq!(app.id, "abc");
    }

    #[tokio::test]
    async fn test_non_2xx_returns_code_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let err = HighlightClient::new()
            .create_application(&repo(), &test_config(&server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err, RegistrationError::status(403, "forbidden"));
    }

    #[tokio::test]
    async fn test_missing_id_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .mount(&server)
            .await;

        let err = HighlightClient::new()
            .create_application(&repo(), &test_config(&server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.code, Some(200));
        assert!(err.body.contains("没有应用ID"));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_secs(5))
                    .set_body_json(json!({ "result": [{ "id": 1 }] })),
            )
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.cast.http_timeout_secs = 1;

        let err = HighlightClient::new()
            .create_application(&repo(), &config)
            .await
            .unwrap_err();

        assert_eq!(err.code, None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // 占用一个空闲端口后立即释放，之后连接会被拒绝
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = test_config(&format!("http://127.0.0.1:{}", port));
        let err = HighlightClient::new()
            .create_application(&repo(), &config)
            .await
            .unwrap_err();
        assert_eq!(err.code, None);
    }

    #[test]
    fn test_extract_application_id() {
        assert_eq!(
            HighlightClient::extract_application_id(&json!({ "result": [{ "id": 7 }] })),
            Some("7".to_string())
        );
        assert_eq!(
            HighlightClient::extract_application_id(&json!({ "result": [{ "id": "x9" }] })),
            Some("x9".to_string())
        );
        assert_eq!(
            HighlightClient::extract_application_id(&json!({ "result": [{ "name": "n" }] })),
            None
        );
        assert_eq!(HighlightClient::extract_application_id(&json!([])), None);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = test_config("https://example.test/WS2/");
        assert_eq!(
            HighlightClient::applications_endpoint(&config),
            "https://example.test/WS2/domains/42/applications"
        );
    }
}
