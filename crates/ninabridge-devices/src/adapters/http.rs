//! HTTP client for the NINA Advanced API.
//!
//! Status documents, images and commands are all plain `GET` requests
//! against the configured base URI:
//!
//! ```toml
//! [nina]
//! api_uri = "http://127.0.0.1:1888/v2/api"
//! request_timeout = 10  # seconds
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, trace};

use ninabridge_core::{config_err, NinaConfig, Result};

use crate::adapter::{ApiResult, DeviceApi, DeviceApiError};
use crate::command::{CommandError, CommandPlan, CommandRequest, ResponseKind};
use crate::mdl::{DeviceKind, ImageSource, StatusSource};

const ENVELOPE_FIELD: &str = "Response";

/// reqwest-backed [`DeviceApi`].
#[derive(Debug, Clone)]
pub struct NinaClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    command_timeout: Duration,
}

impl NinaClient {
    /// Build a client. Polls use `nina.request_timeout`; commands use
    /// `command_timeout`.
    pub fn new(config: &NinaConfig, command_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| config_err!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: config.api_uri.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout),
            command_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> ApiResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        trace!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DeviceApiError::Connection(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(DeviceApiError::Status(response.status().as_u16()));
        }
        Ok(response)
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> ApiResult<Value> {
        self.get(path, query, timeout)
            .await?
            .json()
            .await
            .map_err(|e| DeviceApiError::Decode(format!("JSON parse error: {}", e)))
    }

    async fn get_bytes(
        &self,
        path: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> ApiResult<Vec<u8>> {
        let bytes = self
            .get(path, query, timeout)
            .await?
            .bytes()
            .await
            .map_err(|e| DeviceApiError::Decode(format!("Body read error: {}", e)))?;
        Ok(bytes.to_vec())
    }

    /// `/version` and `/application-start` folded into one document.
    async fn fetch_application(&self) -> ApiResult<Value> {
        let version = self.get_json("/version", &[], self.request_timeout).await?;
        let started = self
            .get_json("/application-start", &[], self.request_timeout)
            .await?;

        let version = unwrap_envelope(version);
        Ok(json!({
            "nina_version": version.clone(),
            "api_version": version,
            "application_start": unwrap_envelope(started),
        }))
    }

    async fn fetch_livestack(&self) -> ApiResult<Option<Vec<u8>>> {
        let available = self
            .get_json("/livestack/image/available", &[], self.request_timeout)
            .await?;
        let Some(path) = livestack_path(&available) else {
            debug!("No livestack image available");
            return Ok(None);
        };
        let bytes = self
            .get_bytes(&path, &stream_query(), self.request_timeout)
            .await?;
        Ok(Some(bytes))
    }
}

#[async_trait]
impl DeviceApi for NinaClient {
    async fn fetch_status(&self, kind: DeviceKind) -> ApiResult<Value> {
        match kind.descriptor().source {
            StatusSource::Endpoint(path) => self.get_json(path, &[], self.request_timeout).await,
            StatusSource::Application => self.fetch_application().await,
            StatusSource::Image(_) => Err(DeviceApiError::Unsupported(kind)),
        }
    }

    async fn fetch_image(&self, kind: DeviceKind) -> ApiResult<Option<Vec<u8>>> {
        let StatusSource::Image(source) = kind.descriptor().source else {
            return Err(DeviceApiError::Unsupported(kind));
        };

        match source {
            ImageSource::PreparedImage => {
                let query = [
                    ("autoPrepare".to_string(), "true".to_string()),
                    ("stream".to_string(), "true".to_string()),
                ];
                let bytes = self
                    .get_bytes("/prepared-image", &query, self.request_timeout)
                    .await?;
                Ok(Some(bytes))
            }
            ImageSource::Screenshot => {
                let bytes = self
                    .get_bytes("/application/screenshot", &stream_query(), self.request_timeout)
                    .await?;
                Ok(Some(bytes))
            }
            ImageSource::Livestack => self.fetch_livestack().await,
        }
    }

    async fn send_command(
        &self,
        device: &str,
        request: &CommandRequest,
    ) -> std::result::Result<Value, CommandError> {
        let plan = CommandPlan::resolve(device, request)?;
        debug!(device = %device, action = %request.action, path = plan.path, "Dispatching command");

        match plan.response {
            ResponseKind::Json => Ok(self
                .get_json(plan.path, &plan.query, self.command_timeout)
                .await?),
            ResponseKind::ImageBase64 => {
                let bytes = self
                    .get_bytes(plan.path, &plan.query, self.command_timeout)
                    .await?;
                Ok(json!({ "image_base64": STANDARD.encode(bytes) }))
            }
        }
    }
}

fn stream_query() -> [(String, String); 1] {
    [("stream".to_string(), "true".to_string())]
}

/// Take `Response` out of an API envelope, or return the document as is.
fn unwrap_envelope(document: Value) -> Value {
    match document {
        Value::Object(mut map) if map.contains_key(ENVELOPE_FIELD) => {
            map.remove(ENVELOPE_FIELD).unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Image path of the first available stack, if it names a target and a
/// filter.
fn livestack_path(available: &Value) -> Option<String> {
    let latest = available.get(ENVELOPE_FIELD)?.as_array()?.first()?;
    let field = |upper: &str, lower: &str| {
        latest
            .get(upper)
            .filter(|v| !is_blank(v))
            .or_else(|| latest.get(lower).filter(|v| !is_blank(v)))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    };

    let target = field("Target", "target")?;
    let filter = field("Filter", "filter")?;
    Some(format!(
        "/livestack/image/{}/{}",
        urlencoding::encode(&target),
        urlencoding::encode(&filter)
    ))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
