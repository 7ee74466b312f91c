//! Effects produced by state transitions

use crate::attachment::Attachment;
use crate::message::Message;

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append to history
    AppendMessage(Message),

    /// Drop all history; a new artifact starts a new conversation
    ClearHistory,

    /// Replace (or remove) the bound attachment
    BindAttachment(Option<Attachment>),

    /// Call the gateway with this text and the attachment bound at dispatch time
    DispatchRequest { text: String },
}

impl Effect {
    pub fn append_user(text: impl Into<String>) -> Self {
        Effect::AppendMessage(Message::user(text))
    }

    pub fn append_reply(response: impl Into<String>, model: impl Into<String>) -> Self {
        Effect::AppendMessage(Message::assistant(response, model))
    }

    pub fn append_error(message: &str) -> Self {
        Effect::AppendMessage(Message::error_reply(message))
    }
}
