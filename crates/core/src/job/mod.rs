//! Creation jobs and the versioned status store.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{CasOutcome, JobFilter, JobStore, JobStoreError, NewJob};
pub use types::{
    CreationJob, CreationType, FailureReason, InputDescriptor, JobState, ShareLink, SharePlatform,
};
