//! Device API interface.
//!
//! The bridge talks to NINA only through [`DeviceApi`]. The HTTP
//! implementation lives in [`crate::adapters::http`]; tests substitute
//! scripted fakes.

use async_trait::async_trait;
use serde_json::Value;

use crate::command::{CommandError, CommandRequest};
use crate::mdl::DeviceKind;

/// Errors raised by device API calls.
#[derive(Debug, thiserror::Error)]
pub enum DeviceApiError {
    /// The request could not be sent or timed out
    #[error("Connection error: {0}")]
    Connection(String),

    /// The API answered with a non-success HTTP status
    #[error("HTTP error: {0}")]
    Status(u16),

    /// The response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The kind has no endpoint of the requested sort
    #[error("Unsupported device kind for this call: {0}")]
    Unsupported(DeviceKind),
}

pub type ApiResult<T> = std::result::Result<T, DeviceApiError>;

/// Access to the NINA device API.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Fetch the raw status document of a value-producing kind.
    async fn fetch_status(&self, kind: DeviceKind) -> ApiResult<Value>;

    /// Fetch the latest image of an image-producing kind. `Ok(None)` means
    /// the API answered but no image is currently available.
    async fn fetch_image(&self, kind: DeviceKind) -> ApiResult<Option<Vec<u8>>>;

    /// Dispatch a command addressed to `device` (the topic segment, which
    /// need not be a known kind).
    async fn send_command(
        &self,
        device: &str,
        request: &CommandRequest,
    ) -> std::result::Result<Value, CommandError>;
}
