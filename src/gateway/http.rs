//! HTTP implementation of the chat service contract

use super::types::{ChatReply, ErrorBody, HealthStatus, ModelList, UploadReceipt};
use super::{Gateway, GatewayConfig, GatewayError};
use crate::attachment::Attachment;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

/// How a non-success status is turned into an error
#[derive(Debug, Clone, Copy)]
enum FailurePolicy {
    /// Prefer the body's `detail`, else the status message
    Detail(&'static str),
    /// Always the status message
    StatusOnly(&'static str),
}

impl FailurePolicy {
    fn error(self, status: StatusCode, body: &str) -> GatewayError {
        match self {
            FailurePolicy::Detail(prefix) => ErrorBody::detail_from(body).map_or_else(
                || status_error(prefix, status),
                GatewayError::server,
            ),
            FailurePolicy::StatusOnly(prefix) => status_error(prefix, status),
        }
    }
}

fn status_error(prefix: &str, status: StatusCode) -> GatewayError {
    GatewayError::status(format!("{prefix} status: {}", status.as_u16()))
}

/// Client for the study-assistant backend
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// `POST /api/upload` with just the file
    pub async fn upload(&self, attachment: &Attachment) -> Result<UploadReceipt, GatewayError> {
        let form = Form::new().part("file", file_part(attachment).await?);
        let response = self
            .client
            .post(self.config.endpoint("/api/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;
        decode(response, FailurePolicy::Detail("Upload failed!")).await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, GatewayError> {
        let response = self
            .client
            .get(self.config.endpoint("/health"))
            .send()
            .await
            .map_err(request_error)?;
        decode(response, FailurePolicy::StatusOnly("Health check failed!")).await
    }

    /// `GET /api/models`
    pub async fn models(&self) -> Result<ModelList, GatewayError> {
        let response = self
            .client
            .get(self.config.endpoint("/api/models"))
            .send()
            .await
            .map_err(request_error)?;
        decode(response, FailurePolicy::StatusOnly("Failed to fetch models!")).await
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn send(
        &self,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<ChatReply, GatewayError> {
        let mut form = Form::new().text("message", message.to_string());
        if let Some(attachment) = attachment {
            form = form.part("file", file_part(attachment).await?);
        }

        let response = self
            .client
            .post(self.config.endpoint("/api/chat"))
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;
        decode(response, FailurePolicy::Detail("HTTP error!")).await
    }
}

async fn file_part(attachment: &Attachment) -> Result<Part, GatewayError> {
    let bytes = attachment.read().await?;
    let part = Part::bytes(bytes).file_name(attachment.name.clone());

    // The media type comes from the picker; an unparseable one is sent untyped
    // rather than failing the turn.
    if let Err(e) = attachment.media_type.parse::<mime_guess::mime::Mime>() {
        tracing::debug!(media_type = %attachment.media_type, error = %e, "Sending attachment without content type");
        return Ok(part);
    }
    part.mime_str(&attachment.media_type)
        .map_err(|e| GatewayError::decode(format!("Invalid media type: {e}")))
}

fn request_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        GatewayError::network(format!("Connection failed: {e}"))
    } else {
        GatewayError::network(format!("Request failed: {e}"))
    }
}

async fn decode<T: DeserializeOwned>(
    response: Response,
    policy: FailurePolicy,
) -> Result<T, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        // An unreadable error body still yields the status message
        let body = response.text().await.unwrap_or_default();
        return Err(policy.error(status, &body));
    }

    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::network(format!("Failed to read response: {e}")))?;
    serde_json::from_str(&body)
        .map_err(|e| GatewayError::decode(format!("Failed to parse response: {e}")))
}
