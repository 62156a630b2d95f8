//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `transition` reads the current state and message log, and returns the
//! next state plus the effects the runtime has to carry out.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvState, PendingAction};
pub use transition::{transition, TransitionError};
