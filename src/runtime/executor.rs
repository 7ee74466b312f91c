//! Session runtime executor

use super::{SessionEvent, SessionHandle, SessionSnapshot};
use crate::attachment::Attachment;
use crate::gateway::Gateway;
use crate::message::Message;
use crate::state_machine::{transition, Effect, Event, SessionState};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

const EVENT_QUEUE: usize = 32;
const BROADCAST_CAPACITY: usize = 128;

/// Drives one session: the only place history and state are mutated
pub struct SessionRuntime<G: Gateway + 'static> {
    gateway: Arc<G>,
    state: SessionState,
    history: Vec<Message>,
    attachment: Option<Attachment>,
    event_rx: mpsc::Receiver<Event>,
    /// Weak so the loop ends once every handle and in-flight request is gone
    event_tx: mpsc::WeakSender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// History was reset after the pending request went out. Only used to
    /// log the late reply; the reply is appended either way.
    reply_is_stale: bool,
}

impl<G: Gateway + 'static> SessionRuntime<G> {
    pub fn new(gateway: G) -> (Self, SessionHandle) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let runtime = Self {
            gateway: Arc::new(gateway),
            state: SessionState::Idle,
            history: Vec::new(),
            attachment: None,
            event_rx,
            event_tx: event_tx.downgrade(),
            broadcast_tx: broadcast_tx.clone(),
            snapshot_tx,
            reply_is_stale: false,
        };
        let handle = SessionHandle {
            event_tx,
            broadcast_tx,
            snapshot_rx,
        };
        (runtime, handle)
    }

    pub async fn run(mut self) {
        tracing::info!("Starting session runtime");

        // Process events in a loop, one at a time
        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        tracing::info!("Session runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let settles = matches!(
            event,
            Event::GatewayReply { .. } | Event::GatewayFailed { .. }
        );

        // Pure state transition
        let result = match transition(self.state, event) {
            Ok(r) => r,
            Err(e) => {
                // Not user-facing: the event is simply dropped
                tracing::debug!(state = self.state.as_str(), error = %e, "Event rejected");
                return;
            }
        };

        if settles && std::mem::take(&mut self.reply_is_stale) {
            tracing::debug!("Reply landed after history reset");
        }

        let old_state = std::mem::replace(&mut self.state, result.new_state);

        for effect in result.effects {
            self.execute_effect(effect);
        }

        if old_state != self.state {
            let _ = self
                .broadcast_tx
                .send(SessionEvent::StateChanged { state: self.state });
        }

        self.snapshot_tx.send_replace(self.snapshot());
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendMessage(message) => {
                let index = self.history.len();
                self.history.push(message.clone());
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::MessageAppended { index, message });
            }

            Effect::ClearHistory => {
                self.history.clear();
                self.reply_is_stale = self.state.is_sending();
                let _ = self.broadcast_tx.send(SessionEvent::HistoryCleared);
            }

            Effect::BindAttachment(attachment) => {
                if let Some(att) = &attachment {
                    tracing::info!(
                        name = %att.name,
                        kind = %att.kind(),
                        size = %att.display_size(),
                        "Attachment bound"
                    );
                }
                self.attachment = attachment;
                let _ = self.broadcast_tx.send(SessionEvent::AttachmentChanged {
                    attachment: self.attachment.as_ref().map(Attachment::info),
                });
            }

            Effect::DispatchRequest { text } => self.dispatch(text),
        }
    }

    /// Spawn the gateway call; its outcome comes back as an event
    fn dispatch(&mut self, text: String) {
        let Some(event_tx) = self.event_tx.upgrade() else {
            // Every sender is gone, so nobody could observe the reply
            tracing::warn!("Session closing, request not dispatched");
            return;
        };

        let request_id = uuid::Uuid::new_v4().to_string();
        let gateway = Arc::clone(&self.gateway);
        let attachment = self.attachment.clone();
        self.reply_is_stale = false;

        tracing::info!(
            request_id = %request_id,
            attachment = attachment.as_ref().map(|a| a.name.as_str()),
            kind = attachment.as_ref().map(|a| a.kind().label()),
            "Dispatching chat request"
        );

        tokio::spawn(async move {
            let event = match gateway.send(&text, attachment.as_ref()).await {
                Ok(reply) => Event::GatewayReply {
                    response: reply.response,
                    model: reply.model,
                },
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Chat request failed");
                    Event::GatewayFailed { message: e.message }
                }
            };
            if event_tx.send(event).await.is_err() {
                tracing::debug!(request_id = %request_id, "Session gone before reply");
            }
        });
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            history: self.history.clone(),
            attachment: self.attachment.as_ref().map(Attachment::info),
        }
    }
}
