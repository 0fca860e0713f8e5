//! Job orchestrator: submission, a bounded worker pool, and the watchdog.
//!
//! The orchestrator owns the job state machine. Workers and the watchdog
//! never write state directly; every transition goes through the store's
//! compare-and-set, so racing writers resolve deterministically.

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::CreationOrchestrator;
pub use types::{
    CreateRequest, InputKind, OrchestratorError, OrchestratorStatus, SubmitError,
};
