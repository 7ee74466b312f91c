//! Chat service boundary
//!
//! The session only depends on the [`Gateway`] trait; [`HttpGateway`] is the
//! production implementation talking to the study-assistant backend.

mod config;
mod error;
mod http;
mod types;

pub use config::{GatewayConfig, DEFAULT_BASE_URL};
pub use error::{GatewayError, GatewayErrorKind};
pub use http::HttpGateway;
pub use types::{ChatReply, HealthStatus, ModelList, UploadReceipt};

use crate::attachment::Attachment;
use async_trait::async_trait;
use std::sync::Arc;

/// Turns a message plus optional attachment into a model reply
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send one chat turn. Called at most once per submission.
    async fn send(
        &self,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<ChatReply, GatewayError>;
}

#[async_trait]
impl<T: Gateway + ?Sized> Gateway for Arc<T> {
    async fn send(
        &self,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<ChatReply, GatewayError> {
        (**self).send(message, attachment).await
    }
}

/// Logging wrapper for gateways
pub struct LoggingGateway<G> {
    inner: G,
}

impl<G: Gateway> LoggingGateway<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<G: Gateway> Gateway for LoggingGateway<G> {
    async fn send(
        &self,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<ChatReply, GatewayError> {
        let start = std::time::Instant::now();
        let result = self.inner.send(message, attachment).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    model = %reply.model,
                    duration_ms = %duration.as_millis(),
                    reply_chars = reply.response.chars().count(),
                    "Chat request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Chat request failed"
                );
            }
        }

        result
    }
}
