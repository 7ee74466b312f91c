//! Conversation session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `submit` and `settle` are separate events so the machine can be driven
//! without a network.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::SessionState;
pub use transition::{transition, TransitionError, TransitionResult};
