//! Mock implementations for testing
//!
//! These mocks enable session and copy-state tests without real I/O.

use super::{spawn_session, SessionHandle, SessionSnapshot};
use crate::attachment::Attachment;
use crate::copy_state::{Clipboard, CopyError};
use crate::gateway::{ChatReply, Gateway, GatewayError};
use crate::state_machine::SessionState;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Gateway
// ============================================================================

/// What the session passed to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub message: String,
    /// Attachment name, if one was bound
    pub attachment: Option<String>,
}

/// Mock gateway that returns queued results
pub struct MockGateway {
    results: Mutex<VecDeque<Result<ChatReply, GatewayError>>>,
    /// Record of all calls made
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, response: impl Into<String>, model: impl Into<String>) {
        self.results.lock().unwrap().push_back(Ok(ChatReply {
            response: response.into(),
            model: model.into(),
        }));
    }

    /// Queue a failure
    pub fn queue_error(&self, error: GatewayError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, message: &str, attachment: Option<&Attachment>) {
        self.calls.lock().unwrap().push(RecordedCall {
            message: message.to_string(),
            attachment: attachment.map(|a| a.name.clone()),
        });
    }

    fn next_result(&self) -> Result<ChatReply, GatewayError> {
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::network("No mock response queued")))
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn send(
        &self,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<ChatReply, GatewayError> {
        self.record(message, attachment);
        self.next_result()
    }
}

// ============================================================================
// Delayed Mock Gateway (for in-flight behavior)
// ============================================================================

/// Mock gateway that holds each reply for a fixed delay
pub struct DelayedMockGateway {
    inner: MockGateway,
    delay: Duration,
}

impl DelayedMockGateway {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockGateway::new(),
            delay,
        }
    }

    pub fn queue_reply(&self, response: impl Into<String>, model: impl Into<String>) {
        self.inner.queue_reply(response, model);
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.inner.recorded_calls()
    }
}

#[async_trait]
impl Gateway for DelayedMockGateway {
    async fn send(
        &self,
        message: &str,
        attachment: Option<&Attachment>,
    ) -> Result<ChatReply, GatewayError> {
        self.inner.record(message, attachment);
        tokio::time::sleep(self.delay).await;
        self.inner.next_result()
    }
}

// ============================================================================
// In-memory Clipboard
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    fail: bool,
}

impl MemoryClipboard {
    /// A clipboard whose writes always fail
    pub fn failing() -> Self {
        Self {
            contents: Mutex::new(None),
            fail: true,
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().unwrap().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<(), CopyError> {
        if self.fail {
            return Err(CopyError("no display".to_string()));
        }
        *self.contents.lock().unwrap() = Some(text.to_string());
        Ok(())
    }
}

// ============================================================================
// Test Session Builder
// ============================================================================

/// A real session runtime wired to a mock gateway
pub struct TestSession<G> {
    pub handle: SessionHandle,
    pub gateway: Arc<G>,
}

impl TestSession<MockGateway> {
    /// Start building a session with an instant mock gateway
    pub fn new() -> TestSessionBuilder<MockGateway> {
        TestSessionBuilder { gateway: None }
    }
}

pub struct TestSessionBuilder<G> {
    gateway: Option<G>,
}

impl<G> TestSessionBuilder<G> {
    pub fn gateway<H>(self, gateway: H) -> TestSessionBuilder<H> {
        TestSessionBuilder {
            gateway: Some(gateway),
        }
    }
}

impl TestSessionBuilder<MockGateway> {
    pub fn build(self) -> TestSession<MockGateway> {
        let gateway = self.gateway.unwrap_or_default();
        TestSession::start(gateway)
    }
}

impl TestSessionBuilder<DelayedMockGateway> {
    pub fn build(self) -> TestSession<DelayedMockGateway> {
        let gateway = self
            .gateway
            .unwrap_or_else(|| DelayedMockGateway::new(Duration::from_millis(50)));
        TestSession::start(gateway)
    }
}

impl<G: Gateway + 'static> TestSession<G> {
    fn start(gateway: G) -> Self {
        let gateway = Arc::new(gateway);
        let handle = spawn_session(Arc::clone(&gateway));
        Self { handle, gateway }
    }

    /// Wait until the snapshot satisfies `predicate`
    pub async fn wait_for(
        &self,
        timeout: Duration,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> bool {
        let mut rx = self.handle.watch();
        let ready = matches!(
            tokio::time::timeout(timeout, rx.wait_for(predicate)).await,
            Ok(Ok(_))
        );
        ready
    }

    pub async fn wait_for_state(&self, state: SessionState, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| s.state == state).await
    }

    pub async fn wait_for_history_len(&self, len: usize, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| s.history.len() == len).await
    }

    pub async fn wait_for_attachment(&self, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| s.attachment.is_some()).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway() {
        let mock = MockGateway::new();
        mock.queue_reply("Hello", "test-model");

        let reply = mock.send("hi", None).await.unwrap();
        assert_eq!(reply.response, "Hello");
        assert_eq!(reply.model, "test-model");

        // Second call should fail (no more responses)
        let err = mock.send("again", None).await.unwrap_err();
        assert_eq!(err.message, "No mock response queued");

        assert_eq!(
            mock.recorded_calls(),
            vec![
                RecordedCall {
                    message: "hi".to_string(),
                    attachment: None
                },
                RecordedCall {
                    message: "again".to_string(),
                    attachment: None
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_gateway_waits() {
        let mock = DelayedMockGateway::new(Duration::from_secs(3));
        mock.queue_reply("late", "m");

        let start = tokio::time::Instant::now();
        let reply = mock.send("q", None).await.unwrap();
        assert_eq!(reply.response, "late");
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[test]
    fn test_memory_clipboard() {
        let clipboard = MemoryClipboard::default();
        clipboard.write_text("copied").unwrap();
        assert_eq!(clipboard.contents(), Some("copied".to_string()));

        let failing = MemoryClipboard::failing();
        assert!(failing.write_text("x").is_err());
        assert_eq!(failing.contents(), None);
    }
}
