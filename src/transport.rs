//! The wire: plain request/response values and the blocking HTTP transport.

use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::ClientError;

/// An outbound call, before the gateway has looked at it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Public calls carry no credential and do not end the session on a 401.
    pub public: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            public: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What came back, with the body kept as text so it can be decoded lazily.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_str(&self.body).or(Err(ClientError::FailedToDecode))
    }
}

/// Sends a request over the network. Errors are transport failures only:
/// any HTTP status, including 4xx and 5xx, is a successful exchange.
#[cfg_attr(test, automock)]
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError>;
}

/// Transport backed by `reqwest`'s blocking client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    http: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(base_url: Url) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            base_url: with_trailing_slash(base_url),
            http,
        })
    }

    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, ClientError> {
        let mut url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidOptions(e.to_string()))?;

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = self.url_for(request)?;

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(ApiResponse { status, body })
    }
}

// Url::join drops the last path segment unless it ends with a slash
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
