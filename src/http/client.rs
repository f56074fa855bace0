//! Authenticated API client with explicit retry and envelope normalization.

use log::{debug, warn};
use reqwest::{Method, Url};
use serde_json::Value;
use std::time::Duration;

use super::error::{ClientError, TransportError};
use super::params::QueryParams;
use super::response::{error_detail, normalize};
use super::retry::RetryPolicy;
use super::transport::{HttpTransport, RawResponse, RequestBody, Transport, TransportRequest};
use super::upload::{FileUpload, UPLOAD_PATH};

/// Request timeout used when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client session for one site: base URL, credentials (held by the
/// transport), timeout and retry policy. Immutable once built.
pub struct ApiClient<T: Transport = HttpTransport> {
    base_url: String,
    base: Url,
    timeout: Duration,
    retry: RetryPolicy,
    transport: T,
}

impl ApiClient<HttpTransport> {
    /// Creates a client with the default 30 second timeout.
    pub fn new(base_url: &str, api_key: &str, api_secret: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, api_key, api_secret, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        api_secret: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(base_url);
        let transport = HttpTransport::new(api_key, api_secret, timeout)
            .map_err(|e| ClientError::connection(e, &base_url, timeout.as_secs()))?;
        Self::with_transport(&base_url, transport, timeout)
    }
}

impl<T: Transport> ApiClient<T> {
    /// Creates a client over an arbitrary transport.
    pub fn with_transport(
        base_url: &str,
        transport: T,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(base_url);
        let base = Url::parse(&base_url).map_err(|e| {
            ClientError::connection(
                TransportError::Other(format!("Invalid base URL {}: {}", base_url, e)),
                &base_url,
                timeout.as_secs(),
            )
        })?;

        Ok(Self {
            base_url,
            base,
            timeout,
            retry: RetryPolicy::default(),
            transport,
        })
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Builds the full URL for `path`. The path always replaces any path on
    /// the base URL; structured parameters are sent as JSON strings.
    pub fn build_url(&self, path: &str, params: Option<&QueryParams>) -> Result<Url, ClientError> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let mut url = self.base.join(&path).map_err(|e| {
            ClientError::connection(
                TransportError::Other(format!("Invalid request path {}: {}", path, e)),
                &self.base_url,
                self.timeout.as_secs(),
            )
        })?;

        if let Some(params) = params.filter(|p| !p.is_empty()) {
            let mut query = url.query_pairs_mut();
            for (key, value) in params.encoded_pairs() {
                query.append_pair(&key, &value);
            }
        }

        Ok(url)
    }

    /// Performs a request and returns the normalized payload.
    #[tracing::instrument(skip(self, body, params), fields(base_url = %self.base_url))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        params: Option<&QueryParams>,
    ) -> Result<Value, ClientError> {
        let url = self.build_url(path, params)?;
        let body = match body {
            Some(value) => RequestBody::Json(value.clone()),
            None => RequestBody::Empty,
        };

        let response = self.execute(method, url, body).await?;
        Ok(normalize(&response.text()))
    }

    pub async fn get(
        &self,
        path: &str,
        params: Option<&QueryParams>,
    ) -> Result<Value, ClientError> {
        self.request(Method::GET, path, None, params).await
    }

    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value, ClientError> {
        self.request(Method::POST, path, body, None).await
    }

    pub async fn put(&self, path: &str, body: Option<&Value>) -> Result<Value, ClientError> {
        self.request(Method::PUT, path, body, None).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        self.request(Method::DELETE, path, None, None).await
    }

    /// Uploads a file through the upload RPC and returns the normalized
    /// payload (the created File document).
    #[tracing::instrument(skip(self, upload), fields(file = %upload.file_name))]
    pub async fn upload_file(&self, upload: &FileUpload) -> Result<Value, ClientError> {
        let url = self.build_url(UPLOAD_PATH, None)?;
        let response = self
            .execute(Method::POST, url, RequestBody::Multipart(upload.to_form()))
            .await?;
        Ok(normalize(&response.text()))
    }

    /// Fetches a server file (e.g. `/private/files/report.pdf`) as raw bytes.
    #[tracing::instrument(skip(self))]
    pub async fn download(&self, file_url: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.build_url(file_url, None)?;
        let response = self.execute(Method::GET, url, RequestBody::Empty).await?;
        debug!("Downloaded {} bytes from {}", response.body.len(), file_url);
        Ok(response.body)
    }

    /// Runs one logical request: attempts, retries transient statuses per the
    /// policy, and classifies the final outcome.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: RequestBody,
    ) -> Result<RawResponse, ClientError> {
        let mut retries = 0;

        loop {
            debug!("{} {}", method, url);
            let request = TransportRequest {
                method: method.clone(),
                url: url.clone(),
                body: body.clone(),
            };

            let response = self.transport.send(request).await.map_err(|cause| {
                debug!("{} {}: transport failure: {}", method, url.path(), cause);
                ClientError::connection(cause, &self.base_url, self.timeout.as_secs())
            })?;

            if response.is_success() {
                return Ok(response);
            }

            if self.retry.should_retry(&method, response.status, retries) {
                retries += 1;
                let delay = self
                    .retry
                    .delay_for(response.status, response.retry_after, retries);
                warn!(
                    "{} {}: status {} (retry {}/{}), retrying in {:?}...",
                    method,
                    url.path(),
                    response.status,
                    retries,
                    self.retry.max_retries,
                    delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                continue;
            }

            debug!(
                "{} {}: failed with status {} after {} retries",
                method,
                url.path(),
                response.status,
                retries
            );
            return Err(ClientError::Api {
                status: response.status,
                detail: error_detail(&response.text()),
            });
        }
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::transport::MockTransport;
    use mockall::Sequence;
    use serde_json::json;

    const BASE: &str = "https://test.example.com";

    fn client_with(transport: MockTransport) -> ApiClient<MockTransport> {
        ApiClient::with_transport(BASE, transport, DEFAULT_TIMEOUT)
            .unwrap()
            .with_retry_policy(RetryPolicy::default().without_backoff())
    }

    fn ok(status: u16, body: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse::new(status, body))
    }

    // --- Construction and URL building ---

    #[test]
    fn test_trailing_slash_stripped() {
        let with_slash = ApiClient::new("https://example.com/", "key", "secret").unwrap();
        let without = ApiClient::new("https://example.com", "key", "secret").unwrap();
        assert_eq!(with_slash.base_url(), "https://example.com");
        assert_eq!(with_slash.base_url(), without.base_url());
    }

    #[test]
    fn test_default_timeout() {
        let client = ApiClient::new("https://example.com", "key", "secret").unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(30));
        assert_eq!(client.retry_policy().max_retries, 3);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = ApiClient::new("not a url", "key", "secret");
        assert!(matches!(result, Err(ClientError::Connection { .. })));
    }

    #[test]
    fn test_build_url_normalizes_path() {
        let client = client_with(MockTransport::new());
        let a = client.build_url("api/x", None).unwrap();
        let b = client.build_url("/api/x", None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://test.example.com/api/x");
    }

    #[test]
    fn test_build_url_replaces_base_path() {
        let client =
            ApiClient::with_transport(
                "https://erp.example.com/desk/",
                MockTransport::new(),
                DEFAULT_TIMEOUT,
            )
                .unwrap();
        let url = client.build_url("/api/resource/User", None).unwrap();
        assert_eq!(url.as_str(), "https://erp.example.com/api/resource/User");
    }

    #[test]
    fn test_build_url_keeps_port() {
        let client =
            ApiClient::with_transport(
                "http://localhost:8000",
                MockTransport::new(),
                DEFAULT_TIMEOUT,
            )
                .unwrap();
        let url = client.build_url("/api/method/version", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/method/version");
    }

    #[test]
    fn test_build_url_scalar_params() {
        let client = client_with(MockTransport::new());
        let params = QueryParams::new()
            .with("limit", 10)
            .with("offset", 0)
            .with("order_by", "modified desc");
        let url = client.build_url("/api/test", Some(&params)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://test.example.com/api/test?limit=10&offset=0&order_by=modified+desc"
        );
    }

    #[test]
    fn test_build_url_structured_params_round_trip() {
        let client = client_with(MockTransport::new());
        let filters = json!({"status": "Open", "owner": ["like", "%@example.com"]});
        let params = QueryParams::new()
            .with("filters", filters.clone())
            .with("fields", json!(["name", "status"]));
        let url = client.build_url("/api/resource/ToDo", Some(&params)).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0].0, "filters");
        assert_eq!(serde_json::from_str::<Value>(&pairs[0].1).unwrap(), filters);
        assert_eq!(pairs[1].1, r#"["name","status"]"#);
    }

    #[test]
    fn test_build_url_empty_params_no_query() {
        let client = client_with(MockTransport::new());
        let url = client.build_url("/api/test", Some(&QueryParams::new())).unwrap();
        assert_eq!(url.query(), None);
    }

    // --- Retry boundary ---

    #[test_log::test(tokio::test)]
    async fn test_retries_500_until_success() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_send()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| ok(500, r#"{"message": "Internal Server Error"}"#));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ok(200, r#"{"message": {"ok": true}}"#));

        let result = client_with(transport).get("/api/test", None).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_404_not_retried() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| ok(404, r#"{"message": "Document not found"}"#));

        let err = client_with(transport).get("/api/test", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 404, .. }));
        assert!(err.to_string().contains("Document not found"));
    }

    #[tokio::test]
    async fn test_retries_exhausted_is_api_failure() {
        let mut transport = MockTransport::new();
        // One attempt plus three retries
        transport
            .expect_send()
            .times(4)
            .returning(|_| ok(503, "Service Unavailable"));

        let err = client_with(transport).post("/api/method/run", None).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "API request failed with status 503: Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_patch_not_retried() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| ok(500, "boom"));

        let err = client_with(transport)
            .request(Method::PATCH, "/api/x", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_connection_refused_not_retried() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::Connect("Connection refused".to_string())));

        let err = client_with(transport).get("/api/test", None).await.unwrap_err();
        assert!(err.is_connection());
        let msg = err.to_string();
        assert!(msg.contains("Failed to connect"));
        assert!(msg.contains(BASE));
    }

    #[tokio::test]
    async fn test_timeout_not_retried() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::Timeout("operation timed out".to_string())));

        let err = client_with(transport).get("/api/test", None).await.unwrap_err();
        assert!(err.is_connection());
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("30 seconds"));
    }

    #[tokio::test]
    async fn test_other_transport_failure() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::Other("invalid header".to_string())));

        let err = client_with(transport).delete("/api/x").await.unwrap_err();
        assert_eq!(err.to_string(), "Request failed: invalid header");
    }

    #[tokio::test]
    async fn test_403_detail_from_message() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .returning(|_| ok(403, r#"{"message": "Not permitted"}"#));

        let err = client_with(transport)
            .get("/api/resource/User/test", None)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("Not permitted"));
    }

    // --- Verb wiring ---

    #[tokio::test]
    async fn test_delete_202_unwraps_message() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.method == Method::DELETE && req.body == RequestBody::Empty)
            .returning(|_| ok(202, r#"{"message": "ok"}"#));

        let result = client_with(transport)
            .delete("/api/resource/User/test@example.com")
            .await
            .unwrap();
        assert_eq!(result, json!("ok"));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::POST
                    && req.url.path() == "/api/resource/User"
                    && req.body == RequestBody::Json(json!({"email": "new@example.com"}))
            })
            .returning(|_| ok(200, r#"{"data": {"name": "new@example.com"}}"#));

        let body = json!({"email": "new@example.com"});
        let result = client_with(transport)
            .post("api/resource/User", Some(&body))
            .await
            .unwrap();
        assert_eq!(result, json!({"name": "new@example.com"}));
    }

    #[tokio::test]
    async fn test_put_without_body() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.method == Method::PUT && req.body == RequestBody::Empty)
            .returning(|_| ok(200, "updated"));

        let result = client_with(transport).put("/api/x", None).await.unwrap();
        assert_eq!(result, json!("updated"));
    }

    #[tokio::test]
    async fn test_upload_posts_multipart_to_upload_endpoint() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::POST
                    && req.url.path() == UPLOAD_PATH
                    && matches!(
                        &req.body,
                        RequestBody::Multipart(form) if form.file_name == "a.txt"
                    )
            })
            .returning(|_| ok(200, r#"{"message": {"file_url": "/private/files/a.txt"}}"#));

        let upload = FileUpload::new("a.txt", b"hello".to_vec());
        let result = client_with(transport).upload_file(&upload).await.unwrap();
        assert_eq!(result["file_url"], "/private/files/a.txt");
    }

    #[tokio::test]
    async fn test_download_returns_raw_bytes() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.method == Method::GET && req.url.path() == "/files/data.json")
            .returning(|_| ok(200, r#"{"message": "not unwrapped"}"#));

        let bytes = client_with(transport).download("files/data.json").await.unwrap();
        assert_eq!(bytes, br#"{"message": "not unwrapped"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_download_not_found() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| ok(404, "missing"));

        let err = client_with(transport).download("/files/x").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    // --- Against a real HTTP server ---

    #[tokio::test]
    async fn test_wire_headers_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/resource/ToDo")
            .match_header("authorization", "token test_key:test_secret")
            .match_header("content-type", "application/json")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("limit_page_length".into(), "20".into()),
                mockito::Matcher::UrlEncoded("filters".into(), r#"{"status":"Open"}"#.into()),
            ]))
            .with_status(200)
            .with_body(r#"{"data": [{"name": "TD-1"}]}"#)
            .create_async()
            .await;

        let client =
            ApiClient::new(&format!("{}/", server.url()), "test_key", "test_secret").unwrap();
        let params = QueryParams::new()
            .with("limit_page_length", 20)
            .with("filters", json!({"status": "Open"}));
        let result = client.get("/api/resource/ToDo", Some(&params)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result, json!([{"name": "TD-1"}]));
    }

    #[tokio::test]
    async fn test_real_connection_refused() {
        let client = ApiClient::new("http://127.0.0.1:1", "key", "secret").unwrap();
        let err = client.get("/api/method/version", None).await.unwrap_err();
        assert!(err.is_connection());
        assert!(err.to_string().contains("Failed to connect"));
        assert!(err.to_string().contains("http://127.0.0.1:1"));
    }
}
