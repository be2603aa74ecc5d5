//! HTTP client wrapper for the MyJKKN API.
//!
//! Every call re-reads the shared [`ApiConfigStore`], so toggling proxy mode or
//! replacing the key takes effect on the next request without rebuilding the client.
//! Requests with a missing or malformed key, or made while mock mode is on, fail
//! locally before any network traffic.

use super::error::{ApiError, ApiResult};
use super::normalize::{NormalizeMode, normalize_document};
use super::transport::{HttpMethod, HttpRequest, Transport};
use crate::config::api::{ApiConfig, ApiConfigStore, validate_api_key};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Client for the MyJKKN administrative API.
pub struct MyJkknClient {
    config: Arc<ApiConfigStore>,
    transport: Arc<dyn Transport>,
    mode: NormalizeMode,
}

impl std::fmt::Debug for MyJkknClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MyJkknClient")
            .field("config", &self.config)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Joins the active base (direct or proxy) with `endpoint`.
#[must_use]
pub fn build_url(config: &ApiConfig, endpoint: &str) -> String {
    let base = if config.proxy_mode {
        &config.proxy_url
    } else {
        &config.base_url
    };
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

fn parse_body(body: &str) -> ApiResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

impl MyJkknClient {
    /// Creates a client reading its settings from `config`.
    #[must_use]
    pub fn new(config: Arc<ApiConfigStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            mode: NormalizeMode::default(),
        }
    }

    /// Chooses how unrecognised nested shapes are handled.
    #[must_use]
    pub const fn with_normalize_mode(mut self, mode: NormalizeMode) -> Self {
        self.mode = mode;
        self
    }

    /// The configuration store this client reads from.
    #[must_use]
    pub const fn config(&self) -> &Arc<ApiConfigStore> {
        &self.config
    }

    /// The underlying transport, shared with the local proxy route.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Checks mock mode and the key, returning the bearer token to use.
    fn authorize(config: &ApiConfig) -> ApiResult<&str> {
        if config.mock_mode {
            return Err(ApiError::MockModeDisabled);
        }
        let key = config.api_key.trim();
        if key.is_empty() {
            return Err(ApiError::MissingApiKey);
        }
        if !validate_api_key(key) {
            return Err(ApiError::InvalidApiKey);
        }
        Ok(key)
    }

    /// Performs one call and returns the normalised JSON body.
    #[instrument(skip(self, params, body), fields(method = %method))]
    pub async fn request(
        &self,
        endpoint: &str,
        method: HttpMethod,
        params: &[(&str, String)],
        body: Option<Value>,
    ) -> ApiResult<Value> {
        let config = self.config.current();
        let key = Self::authorize(&config).inspect_err(|e| warn!("Request rejected locally: {e}"))?;

        let request = HttpRequest {
            method,
            url: build_url(&config, endpoint),
            query: params
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.clone()))
                .collect(),
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {key}")),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body,
        };
        debug!(
            "{} {} (proxy_mode={}, key {})",
            request.method,
            request.url,
            config.proxy_mode,
            config.masked_key()
        );

        let response = self
            .transport
            .send(request)
            .await
            .map_err(ApiError::Network)
            .inspect_err(|e| warn!("{e}"))?;

        if !(200..300).contains(&response.status) {
            let error = ApiError::from_status(response.status, endpoint, &response.body);
            warn!("MyJKKN {endpoint} returned {}: {error}", response.status);
            return Err(error);
        }

        let raw = parse_body(&response.body)?;
        normalize_document(raw, self.mode)
    }

    /// GET shorthand.
    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> ApiResult<Value> {
        self.request(endpoint, HttpMethod::Get, params, None).await
    }

    /// Fetches a single institution to prove the key and routing work.
    pub async fn test_connection(&self) -> ApiResult<()> {
        self.get(
            "/api-management/institutions",
            &[("page", "1".to_string()), ("limit", "1".to_string())],
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{StubTransport, VALID_TEST_KEY, stub_client, test_api_config};
    use serde_json::json;

    #[test]
    fn test_build_url_switches_on_proxy_mode() {
        let mut config = test_api_config();
        config.base_url = "https://upstream.example/api/".to_string();
        config.proxy_url = "http://localhost:8080/api/myjkkn".to_string();

        assert_eq!(
            build_url(&config, "/api-management/students"),
            "https://upstream.example/api/api-management/students"
        );
        config.proxy_mode = true;
        assert_eq!(
            build_url(&config, "api-management/students"),
            "http://localhost:8080/api/myjkkn/api-management/students"
        );
    }

    #[tokio::test]
    async fn test_valid_key_is_sent_as_bearer_token() {
        let transport = Arc::new(StubTransport::always(200, json!({"data": []})));
        let client = stub_client(&transport, test_api_config());

        client
            .get("/api-management/students", &[("page", "1".to_string())])
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].header("authorization"),
            Some(format!("Bearer {VALID_TEST_KEY}").as_str())
        );
        assert_eq!(requests[0].query_param("page"), Some("1"));
        assert_eq!(requests[0].method, HttpMethod::Get);
    }

    #[tokio::test]
    async fn test_invalid_key_rejected_before_network() {
        let transport = Arc::new(StubTransport::always(200, json!({"data": []})));
        let mut config = test_api_config();
        config.api_key = "invalid-key".to_string();
        let client = stub_client(&transport, config);

        let result = client.get("/api-management/students", &[]).await;

        assert_eq!(result.unwrap_err(), ApiError::InvalidApiKey);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_and_mock_mode_fail_locally() {
        let transport = Arc::new(StubTransport::always(200, json!({})));

        let mut config = test_api_config();
        config.api_key = String::new();
        let client = stub_client(&transport, config);
        assert_eq!(
            client.get("/x", &[]).await.unwrap_err(),
            ApiError::MissingApiKey
        );

        let mut config = test_api_config();
        config.mock_mode = true;
        let client = stub_client(&transport, config);
        assert_eq!(
            client.get("/x", &[]).await.unwrap_err(),
            ApiError::MockModeDisabled
        );

        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_config_changes_apply_to_next_request() {
        let transport = Arc::new(StubTransport::always(200, json!([])));
        let client = stub_client(&transport, test_api_config());

        client.get("/a", &[]).await.unwrap();
        client.config().update(|c| c.proxy_mode = true).unwrap();
        client.get("/a", &[]).await.unwrap();

        let requests = transport.requests();
        assert!(requests[0].url.starts_with(&test_api_config().base_url));
        assert!(requests[1].url.starts_with(&test_api_config().proxy_url));
    }

    #[tokio::test]
    async fn test_http_errors_are_classified() {
        let transport = Arc::new(StubTransport::new());
        transport.push_json(401, json!({"error": "bad key"}));
        transport.push_json(429, json!({}));
        transport.push_json(500, json!({}));
        transport.push_error("connection refused");
        let client = stub_client(&transport, test_api_config());

        assert_eq!(client.get("/x", &[]).await.unwrap_err(), ApiError::Unauthorized);
        assert_eq!(client.get("/x", &[]).await.unwrap_err(), ApiError::RateLimited);
        assert_eq!(
            client.get("/x", &[]).await.unwrap_err(),
            ApiError::Server { status: 500 }
        );
        assert!(matches!(
            client.get("/x", &[]).await.unwrap_err(),
            ApiError::Network(msg) if msg.contains("connection refused")
        ));
    }

    #[tokio::test]
    async fn test_response_is_normalized_and_empty_body_is_null() {
        let transport = Arc::new(StubTransport::new());
        transport.push_json(
            200,
            json!({"data": [{"id": 1, "department": {"department_name": "MECH"}}], "total": 1}),
        );
        transport.push_raw(204, "");
        let client = stub_client(&transport, test_api_config());

        let value = client.get("/x", &[]).await.unwrap();
        assert_eq!(value["data"][0]["department"], json!("MECH"));

        let value = client
            .request("/x", HttpMethod::Delete, &[], None)
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let transport = Arc::new(StubTransport::new());
        transport.push_raw(200, "<html>gateway</html>");
        let client = stub_client(&transport, test_api_config());

        assert!(matches!(
            client.get("/x", &[]).await.unwrap_err(),
            ApiError::Decode(_)
        ));
    }
}
