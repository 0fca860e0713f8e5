//! Testing utilities and mock implementations for E2E tests.
//!
//! Mock implementations of the external collaborator traits, so the
//! orchestrator and the HTTP surface can be exercised without real
//! inference, billing, or storage infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use fabrica_core::testing::{MockGenerationBackend, MockObjectStore, MockPaymentProcessor};
//!
//! let backend = MockGenerationBackend::new();
//! backend.push_transient_failure("gpu pool exhausted");
//!
//! let payments = MockPaymentProcessor::new();
//! payments.fail_next("card declined");
//!
//! // Use in an orchestrator or AppState...
//! ```

mod mock_backend;
mod mock_payment;
mod mock_storage;

pub use mock_backend::MockGenerationBackend;
pub use mock_payment::{MockPaymentProcessor, RecordedCharge};
pub use mock_storage::{MockObjectStore, StoredArtifact};
