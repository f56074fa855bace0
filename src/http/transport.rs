//! Transport seam between the request executor and the HTTP stack.

use async_trait::async_trait;
use log::debug;
use reqwest::{
    Client, Method, Url,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER},
    multipart::{Form, Part},
};
use serde_json::Value;
use std::time::Duration;

use super::error::TransportError;
use super::retry::parse_retry_after;

/// Value of the `Authorization` header for a credential pair.
pub fn authorization_header(api_key: &str, api_secret: &str) -> String {
    format!("token {}:{}", api_key, api_secret)
}

/// Multipart form with a single file part.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub file_field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl MultipartForm {
    fn into_form(self) -> Form {
        let part = Part::bytes(self.bytes).file_name(self.file_name);
        self.fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
            .part(self.file_field, part)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

/// One HTTP attempt as seen by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub body: RequestBody,
}

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// `Retry-After` in seconds, when the server sent one.
    pub retry_after: Option<u64>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// 2xx and 3xx count as success.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends a single request attempt. Implementations must not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError>;
}

/// Production transport backed by a `reqwest::Client` that carries the
/// credential and content-type headers on every request.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(api_key: &str, api_secret: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();

        let mut auth_value = HeaderValue::from_str(&authorization_header(api_key, api_secret))
            .map_err(|e| TransportError::Other(format!("Invalid API credentials: {}", e)))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(concat!("frappe-cli/", env!("FRAPPE_CLI_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        debug!("HTTP transport configured with {}s timeout", timeout.as_secs());
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        let builder = self.client.request(request.method, request.url);
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(form.into_form()),
        };

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}
