//! Pipeline state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! Four steps run in a fixed order; effects carry all I/O out to the
//! runtime.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Event, StepError};
pub use state::{Message, PipelineState, Role, Step};
pub use transition::{start, transition, StepResult, TransitionError};
