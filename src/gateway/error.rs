//! Gateway error types

use crate::attachment::AttachmentError;
use thiserror::Error;

/// Gateway error with classification
///
/// The message is what ends up in the assistant's error bubble, so it must
/// read well on its own.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Network, message)
    }

    /// Server returned a structured `detail`; surfaced verbatim
    pub fn server(detail: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Server, detail)
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Status, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Decode, message)
    }
}

impl From<AttachmentError> for GatewayError {
    fn from(e: AttachmentError) -> Self {
        Self::new(GatewayErrorKind::Io, e.to_string())
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Unreachable, timed out, connection reset
    Network,
    /// Non-success status with a parseable `detail`
    Server,
    /// Non-success status without a usable body
    Status,
    /// Success status but the body was not the expected JSON
    Decode,
    /// Attachment bytes could not be read locally
    Io,
}
