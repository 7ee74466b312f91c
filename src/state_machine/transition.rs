//! Pure state transition function

use super::{Effect, Event, SessionState};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Events the current state does not accept.
///
/// None of these are user-facing failures: the runtime drops the event and
/// leaves history untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("A reply is still pending")]
    Busy,
    #[error("Gateway settled while no request was in flight")]
    UnexpectedReply,
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(state: SessionState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Submission
        // ============================================================

        // Rejected outright; nothing is appended
        (_, Event::Submit { text }) if text.trim().is_empty() => Err(TransitionError::EmptyMessage),

        (SessionState::Sending, Event::Submit { .. }) => Err(TransitionError::Busy),

        // User message goes into history before the request is dispatched
        (SessionState::Idle, Event::Submit { text }) => {
            Ok(TransitionResult::new(SessionState::Sending)
                .with_effect(Effect::append_user(text.clone()))
                .with_effect(Effect::DispatchRequest { text }))
        }

        // ============================================================
        // Settlement
        // ============================================================
        (SessionState::Sending, Event::GatewayReply { response, model }) => {
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::append_reply(response, model)))
        }

        // Failures are recovered into an ordinary assistant bubble
        (SessionState::Sending, Event::GatewayFailed { message }) => {
            Ok(TransitionResult::new(SessionState::Idle).with_effect(Effect::append_error(&message)))
        }

        (SessionState::Idle, Event::GatewayReply { .. } | Event::GatewayFailed { .. }) => {
            Err(TransitionError::UnexpectedReply)
        }

        // ============================================================
        // Attachment changes reset the conversation from any state.
        // An in-flight request keeps the session sending; its reply
        // still lands in the fresh history.
        // ============================================================
        (state, Event::AttachmentSelected { attachment }) => Ok(TransitionResult::new(state)
            .with_effect(Effect::BindAttachment(Some(attachment)))
            .with_effect(Effect::ClearHistory)),

        (state, Event::AttachmentCleared) => Ok(TransitionResult::new(state)
            .with_effect(Effect::BindAttachment(None))
            .with_effect(Effect::ClearHistory)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::Attachment;
    use crate::message::Message;

    fn submit(text: &str) -> Event {
        Event::Submit {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_idle_submit_appends_then_dispatches() {
        let result = transition(SessionState::Idle, submit("Explain photosynthesis")).unwrap();
        assert_eq!(result.new_state, SessionState::Sending);
        assert_eq!(
            result.effects,
            vec![
                Effect::AppendMessage(Message::user("Explain photosynthesis")),
                Effect::DispatchRequest {
                    text: "Explain photosynthesis".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_submit_keeps_original_text() {
        // Trimming is only the guard; the untrimmed text is what gets sent
        let result = transition(SessionState::Idle, submit("  what?  ")).unwrap();
        assert_eq!(
            result.effects[1],
            Effect::DispatchRequest {
                text: "  what?  ".to_string()
            }
        );
    }

    #[test]
    fn test_blank_submit_rejected() {
        for text in ["", "   ", "\n\t "] {
            assert_eq!(
                transition(SessionState::Idle, submit(text)).unwrap_err(),
                TransitionError::EmptyMessage
            );
        }
    }

    #[test]
    fn test_submit_while_sending_rejected() {
        assert_eq!(
            transition(SessionState::Sending, submit("again")).unwrap_err(),
            TransitionError::Busy
        );
    }

    #[test]
    fn test_reply_returns_to_idle() {
        let result = transition(
            SessionState::Sending,
            Event::GatewayReply {
                response: "Photosynthesis is...".to_string(),
                model: "gpt-x".to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.new_state, SessionState::Idle);
        assert_eq!(
            result.effects,
            vec![Effect::AppendMessage(Message::assistant(
                "Photosynthesis is...",
                "gpt-x"
            ))]
        );
    }

    #[test]
    fn test_failure_recovers_to_idle() {
        let result = transition(
            SessionState::Sending,
            Event::GatewayFailed {
                message: "upstream timeout".to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.new_state, SessionState::Idle);
        let Effect::AppendMessage(msg) = &result.effects[0] else {
            panic!("expected append, got {:?}", result.effects);
        };
        assert_eq!(
            msg.content,
            "Sorry, I encountered an error: upstream timeout. Please try again."
        );
    }

    #[test]
    fn test_reply_while_idle_rejected() {
        assert_eq!(
            transition(
                SessionState::Idle,
                Event::GatewayFailed {
                    message: "x".to_string()
                }
            )
            .unwrap_err(),
            TransitionError::UnexpectedReply
        );
    }

    #[test]
    fn test_attachment_change_clears_history_in_any_state() {
        let att = Attachment::from_bytes("cell.png", "image/png", b"img".to_vec());
        for state in [SessionState::Idle, SessionState::Sending] {
            let result = transition(
                state,
                Event::AttachmentSelected {
                    attachment: att.clone(),
                },
            )
            .unwrap();
            assert_eq!(result.new_state, state);
            assert!(result.effects.contains(&Effect::ClearHistory));
            assert!(result
                .effects
                .contains(&Effect::BindAttachment(Some(att.clone()))));

            let result = transition(state, Event::AttachmentCleared).unwrap();
            assert_eq!(
                result.effects,
                vec![Effect::BindAttachment(None), Effect::ClearHistory]
            );
        }
    }
}
