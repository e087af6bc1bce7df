//! Otto API client utilities.
//!
//! This crate provides a lightweight client for the Otto administrative REST
//! API. It focuses on:
//!
//! - Constructing an HTTP client with sensible defaults
//! - Validating the configured base URL for safety
//! - Building requests with a consistent User-Agent and Accept headers
//! - Reading, listing, creating and updating resources as JSON
//!
//! The primary entry point is [`OttoClient`]. Create an instance via
//! [`OttoClient::new`] with [`ClientSettings`], and then use the resource
//! helpers such as [`OttoClient::get_resource`].
//!
//! # Example
//!
//! ```ignore
//! use otto_api::{ClientSettings, OttoClient};
//! use otto_types::ResourceKind;
//!
//! async fn show() -> anyhow::Result<()> {
//!     let client = OttoClient::new(&ClientSettings::default())?;
//!     let workflow = client.get_resource(ResourceKind::Workflows, "w1").await?;
//!     println!("{workflow}");
//!     Ok(())
//! }
//! ```

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use otto_types::ResourceKind;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url, header};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Base URL used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
/// Request timeout used when nothing is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1", "[::1]"];

/// Connection settings for [`OttoClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    /// Bearer token sent with every request, when present.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Failure of a single API call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, timeout, ...).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    Status { status: StatusCode, url: String, body: String },

    /// The response body was not the expected JSON.
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status of the failed call, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure is worth retrying later without changing the request.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::REQUEST_TIMEOUT || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Decode { .. } => false,
        }
    }
}

#[derive(Debug, Clone)]
/// Thin wrapper around a configured `reqwest::Client` for Otto API access.
///
/// The client pre-configures default headers and builds requests against a
/// validated base URL.
pub struct OttoClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl OttoClient {
    /// Construct an [`OttoClient`] from explicit settings.
    ///
    /// Non-localhost hosts must use HTTPS. A trailing slash on the base URL is
    /// ignored.
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let base_url = settings.base_url.trim().trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;

        let mut default_headers = header::HeaderMap::new();
        if let Some(token) = settings.token.as_deref().filter(|token| !token.trim().is_empty()) {
            let mut authorization = header::HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .context("API token contains characters not allowed in a header")?;
            authorization.set_sensitive(true);
            default_headers.insert(header::AUTHORIZATION, authorization);
        }
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(settings.timeout)
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url,
            http,
            user_agent: format!("otto-console/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    /// Build a `reqwest::RequestBuilder` for a method and API-relative path.
    ///
    /// The resulting request includes the configured User-Agent and base
    /// headers, and is resolved relative to `self.base_url`.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url_for(path);
        debug!(%url, %method, "building request");

        self.http.request(method, url).header(header::USER_AGENT, &self.user_agent)
    }

    /// Fetch one resource by id.
    pub async fn get_resource(&self, kind: ResourceKind, id: &str) -> Result<Value, ApiError> {
        self.send_json(Method::GET, &resource_path(kind, Some(id)), None).await
    }

    /// List a collection. Accepts either a bare array or an `{"items": [...]}` wrapper.
    pub async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<Value>, ApiError> {
        let payload = self.send_json(Method::GET, &resource_path(kind, None), None).await?;
        Ok(match payload {
            Value::Array(items) => items,
            Value::Object(mut object) => match object.remove("items") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        })
    }

    /// Create a resource in a collection and return the stored representation.
    pub async fn create_resource(&self, kind: ResourceKind, body: &Value) -> Result<Value, ApiError> {
        self.send_json(Method::POST, &resource_path(kind, None), Some(body)).await
    }

    /// Replace a resource with `body` and return the stored representation.
    pub async fn update_resource(&self, kind: ResourceKind, id: &str, body: &Value) -> Result<Value, ApiError> {
        self.send_json(Method::PUT, &resource_path(kind, Some(id)), Some(body)).await
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_json(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        let url = self.url_for(path);
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
        debug!(%url, status = status.as_u16(), bytes = text.len(), "received response");

        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                url,
                body: error_message(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|source| ApiError::Decode { url, source })
    }
}

/// Path of a collection or of one member in it.
pub fn resource_path(kind: ResourceKind, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("{}/{}", kind.collection_path(), percent_encoding::utf8_percent_encode(id, PATH_SEGMENT)),
        None => kind.collection_path().to_string(),
    }
}

const PATH_SEGMENT: &percent_encoding::AsciiSet = &percent_encoding::NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Extract a human-readable message from an error body.
///
/// The API reports errors either as plain text or as `{"error": "..."}` /
/// `{"message": "..."}`; anything else is returned trimmed.
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(Value::String(message)) = object.get(key) {
                return message.clone();
            }
        }
    }
    body.trim().to_string()
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost`, `127.0.0.1` or `[::1]`: any scheme is allowed
/// - otherwise: scheme must be HTTPS
fn validate_base_url(base: &str) -> Result<()> {
    let parsed_base_url = Url::parse(base).map_err(|e| anyhow!("Invalid Otto API base URL '{}': {}", base, e))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| anyhow!("Otto API base URL must include a host"))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(anyhow!(
            "Otto API base URL must use https for non-localhost hosts; got '{}://'",
            parsed_base_url.scheme()
        ));
    }

    Ok(())
}
