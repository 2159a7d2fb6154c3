//! Agent module - turn loop, dispatch and safety
//!
//! Contains the loop that alternates between the decision service and the
//! browser, plus the pieces it drives.

pub mod dispatcher;
pub mod loop_state;
pub mod orchestrator;
pub mod safety;
pub mod transcript;

pub use dispatcher::{normalize_key, ActionDispatcher, DispatchSettings};
pub use loop_state::LoopState;
pub use orchestrator::{Agent, CancelFlag, ObservationCallback, RunReport, StopReason};
pub use safety::{Acknowledger, FixedAcknowledger, SafetyDecision, SafetyGate};
pub use transcript::Transcript;
