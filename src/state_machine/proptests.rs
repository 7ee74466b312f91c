//! Property-based tests for the session state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::attachment::Attachment;
use crate::message::{Message, Role};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

/// Minimal model of the runtime: applies effects to a history and counts
/// requests in flight.
#[derive(Debug, Default)]
struct Model {
    state: SessionState,
    history: Vec<Message>,
    attachment: Option<Attachment>,
    in_flight: usize,
}

impl Model {
    fn apply(&mut self, event: Event) -> Result<(), TransitionError> {
        if matches!(event, Event::GatewayReply { .. } | Event::GatewayFailed { .. }) {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        let result = transition(self.state, event)?;
        self.state = result.new_state;
        for effect in result.effects {
            match effect {
                Effect::AppendMessage(msg) => self.history.push(msg),
                Effect::ClearHistory => self.history.clear(),
                Effect::BindAttachment(att) => self.attachment = att,
                Effect::DispatchRequest { .. } => self.in_flight += 1,
            }
        }
        Ok(())
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_blank_text() -> impl Strategy<Value = String> {
    "[ \t\n\r]{0,8}"
}

fn arb_text() -> impl Strategy<Value = String> {
    "[ ]{0,2}[a-zA-Z0-9?]{1,30}[ ]{0,2}"
}

fn arb_attachment() -> impl Strategy<Value = Attachment> {
    (
        "[a-z]{1,8}",
        prop_oneof![
            Just("image/png"),
            Just("video/mp4"),
            Just("audio/mpeg"),
            Just("application/pdf"),
        ],
    )
        .prop_map(|(name, media_type)| Attachment::from_bytes(name, media_type, vec![0u8; 4]))
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_text().prop_map(|text| Event::Submit { text }),
        arb_blank_text().prop_map(|text| Event::Submit { text }),
        ("[a-zA-Z ]{0,30}", "[a-z-]{1,10}")
            .prop_map(|(response, model)| Event::GatewayReply { response, model }),
        "[a-zA-Z ]{1,30}".prop_map(|message| Event::GatewayFailed { message }),
        arb_attachment().prop_map(|attachment| Event::AttachmentSelected { attachment }),
        Just(Event::AttachmentCleared),
    ]
}

fn arb_state() -> impl Strategy<Value = SessionState> {
    prop_oneof![Just(SessionState::Idle), Just(SessionState::Sending)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Non-blank submit while idle appends exactly one user message and starts sending
    #[test]
    fn prop_idle_submit_appends_one_user_message(text in arb_text()) {
        let mut model = Model::default();
        model.apply(Event::Submit { text: text.clone() }).unwrap();

        prop_assert_eq!(model.state, SessionState::Sending);
        prop_assert_eq!(model.history.len(), 1);
        prop_assert_eq!(model.history[0].role, Role::User);
        prop_assert_eq!(&model.history[0].content, &text);
        prop_assert_eq!(model.in_flight, 1);
    }

    // Blank submit is a no-op in every state
    #[test]
    fn prop_blank_submit_is_noop(state in arb_state(), text in arb_blank_text()) {
        let result = transition(state, Event::Submit { text });
        prop_assert_eq!(result.unwrap_err(), TransitionError::EmptyMessage);
    }

    // Submitting while sending never dispatches a second request
    #[test]
    fn prop_submit_while_sending_rejected(text in "[ a-z]{0,20}") {
        let result = transition(SessionState::Sending, Event::Submit { text });
        prop_assert!(result.is_err());
    }

    // Settling appends exactly one assistant message and returns to idle
    #[test]
    fn prop_settle_appends_one_assistant_message(
        response in "[a-zA-Z ]{0,30}",
        model_name in "[a-z-]{1,10}",
        failed in any::<bool>(),
        error in "[a-zA-Z ]{1,30}",
    ) {
        let mut model = Model::default();
        model.apply(Event::Submit { text: "question".to_string() }).unwrap();

        let event = if failed {
            Event::GatewayFailed { message: error.clone() }
        } else {
            Event::GatewayReply { response: response.clone(), model: model_name.clone() }
        };
        model.apply(event).unwrap();

        prop_assert_eq!(model.state, SessionState::Idle);
        prop_assert_eq!(model.history.len(), 2);
        let reply = &model.history[1];
        prop_assert_eq!(reply.role, Role::Assistant);
        if failed {
            prop_assert_eq!(
                &reply.content,
                &format!("Sorry, I encountered an error: {error}. Please try again.")
            );
            prop_assert_eq!(&reply.model, &None);
        } else {
            prop_assert_eq!(&reply.content, &response);
            prop_assert_eq!(&reply.model, &Some(model_name));
        }
    }

    // Attachment changes always leave an empty history
    #[test]
    fn prop_attachment_change_resets_history(
        events in proptest::collection::vec(arb_event(), 0..20),
        attachment in proptest::option::of(arb_attachment()),
    ) {
        let mut model = Model::default();
        for event in events {
            let _ = model.apply(event);
        }

        let change = match attachment.clone() {
            Some(attachment) => Event::AttachmentSelected { attachment },
            None => Event::AttachmentCleared,
        };
        model.apply(change).unwrap();

        prop_assert!(model.history.is_empty());
        prop_assert_eq!(model.attachment, attachment);
    }

    // At most one request is ever in flight, whatever the event order
    #[test]
    fn prop_at_most_one_in_flight(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut model = Model::default();
        for event in events {
            let before = model.history.len();
            let was_cleared = matches!(
                event,
                Event::AttachmentSelected { .. } | Event::AttachmentCleared
            );
            if model.apply(event).is_err() {
                // Rejected events never touch history
                prop_assert_eq!(model.history.len(), before);
            } else if !was_cleared {
                prop_assert!(model.history.len() == before + 1);
            }
            prop_assert!(model.in_flight <= 1);
            prop_assert_eq!(model.in_flight == 1, model.state.is_sending());
        }
    }
}
