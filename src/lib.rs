//! LearnSynth - study assistant client core
//!
//! A conversation session bound to at most one study artifact, a gateway to
//! the chat backend, and a render pipeline that turns model replies into a
//! safe structured document with copyable code blocks.

pub mod attachment;
pub mod copy_state;
pub mod gateway;
pub mod message;
pub mod render;
pub mod runtime;
pub mod state_machine;
pub mod terminal;
