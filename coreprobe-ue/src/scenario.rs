//! Scenario event stream
//!
//! Each UE publishes its mobility state changes on an unbounded channel
//! the scenario driver reads to cue the next action (register, request
//! a session, terminate). The stream closes when the UE terminates.

use crate::nas::mm::MmState;

/// Event published to the scenario driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioMessage {
    /// The UE entered a new 5GMM state.
    StateChange(MmState),
}
