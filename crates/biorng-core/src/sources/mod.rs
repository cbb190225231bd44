//! Sample source implementations.
//!
//! The live device transport is an external collaborator; what ships here is
//! what the rest of the workspace needs to run and test end to end.

pub mod replay;
pub mod simulated;

pub use replay::ReplaySource;
pub use simulated::{SimulatedMea, SimulatedMeaConfig};
