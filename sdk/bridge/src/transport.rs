//! # Transport
//!
//! The one seam between the SDK and the network. [`Transport`] executes a
//! single request and reports the raw outcome; it never interprets bodies.
//! [`HttpTransport`] is the reqwest implementation used in production.

use std::future::Future;
use std::time::Duration;

use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;

use crate::config::{ClientConfig, ConfigError};
use crate::error::RemoteError;

const AUTH_HEADER: &str = "Authtoken";
const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    /// `POST` without a body.
    pub fn post_empty(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path, None)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path, Some(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// Whether the status was 2xx.
    pub success: bool,
    pub status: u16,
    pub text: String,
}

impl ApiResponse {
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        Self {
            success: (200..300).contains(&status),
            status,
            text: text.into(),
        }
    }

    pub fn ok_json(body: &Value) -> Self {
        Self::new(200, body.to_string())
    }

    /// Decoded body, or `None` when it is empty or not JSON.
    pub fn json(&self) -> Option<Value> {
        if self.text.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.text).ok()
    }
}

/// Executes one request against the service.
pub trait Transport: Send + Sync {
    fn execute(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse, RemoteError>> + Send;
}

// ============================================================================
// HTTP TRANSPORT
// ============================================================================

pub struct HttpTransport {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let trimmed = path.trim_start_matches('/');
        format!("{}/{}", self.base_url, trimmed)
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RemoteError> {
        let url = self.endpoint(&request.path);
        let request_id = uuid::Uuid::new_v4().to_string();
        let operation = format!("{} {}", request.method.as_str(), request.path);
        debug!("{} (request id {})", operation, request_id);

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .header(ACCEPT, "application/json")
            .header(REQUEST_ID_HEADER, request_id.as_str());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &self.auth_token {
            builder = builder.header(AUTH_HEADER, token.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = builder.send().await.map_err(|e| RemoteError::Transport {
            operation: operation.clone(),
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| RemoteError::Transport {
            operation,
            message: format!("failed to read body: {e}"),
        })?;
        Ok(ApiResponse::new(status, text))
    }
}
