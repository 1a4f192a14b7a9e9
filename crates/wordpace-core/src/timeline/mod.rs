//! Trial timeline: the clock abstraction and the state machine that
//! presents trials.

mod clock;
mod controller;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    block_ranges, ControllerOutcome, ControllerState, Signal, TrialTimelineController,
};
