//! Session runtime
//!
//! Owns history, the bound attachment and the submission state, applies
//! transitions one event at a time and publishes every change to observers.

mod executor;

#[cfg(test)]
pub(crate) mod testing;

pub use executor::SessionRuntime;

use crate::attachment::{Attachment, AttachmentInfo};
use crate::gateway::Gateway;
use crate::message::Message;
use crate::render::{render_message, MessageView};
use crate::state_machine::{Event, SessionState};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};

/// Notifications sent to observers, in the order the changes happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    MessageAppended {
        index: usize,
        message: Message,
    },
    HistoryCleared,
    StateChanged {
        state: SessionState,
    },
    AttachmentChanged {
        attachment: Option<AttachmentInfo>,
    },
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub history: Vec<Message>,
    pub attachment: Option<AttachmentInfo>,
}

impl SessionSnapshot {
    /// History rendered for display, one view per message
    pub fn views(&self) -> Vec<MessageView> {
        self.history
            .iter()
            .enumerate()
            .map(|(index, message)| render_message(index, message))
            .collect()
    }
}

#[derive(Debug, Error)]
#[error("Session runtime has stopped")]
pub struct SessionClosed;

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Queue a submission. Blank text and submissions while a reply is
    /// pending are ignored by the session.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(Event::Submit { text: text.into() }).await
    }

    /// Bind a new attachment, starting a fresh conversation
    pub async fn select_attachment(&self, attachment: Attachment) -> Result<(), SessionClosed> {
        self.send(Event::AttachmentSelected { attachment }).await
    }

    /// Unbind the attachment, starting a fresh conversation
    pub async fn clear_attachment(&self) -> Result<(), SessionClosed> {
        self.send(Event::AttachmentCleared).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that is marked changed after every processed event
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    async fn send(&self, event: Event) -> Result<(), SessionClosed> {
        self.event_tx.send(event).await.map_err(|_| SessionClosed)
    }
}

/// Start a session on the current tokio runtime
pub fn spawn_session<G: Gateway + 'static>(gateway: G) -> SessionHandle {
    let (runtime, handle) = SessionRuntime::new(gateway);
    tokio::spawn(runtime.run());
    handle
}
