//! Job storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::pricing::PriceQuote;

use super::types::{CreationJob, CreationType, InputDescriptor, JobState};

/// Error type for job store operations.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Request to persist a new job. The store assigns id, timestamps, the
/// initial Queued state, and version 1.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner: String,
    pub creation_type: CreationType,
    pub input: InputDescriptor,
    pub language: String,
    pub price_charged: PriceQuote,
    pub idempotency_key: Option<String>,
}

/// Filter for querying jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Filter by state type ("queued", "processing", ...).
    pub state: Option<String>,
    /// Filter by owner.
    pub owner: Option<String>,
    /// Only jobs whose Processing state started before this instant.
    pub started_before: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            state: None,
            owner: None,
            started_before: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_started_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.started_before = Some(cutoff);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Outcome of a compare-and-set attempt.
#[derive(Debug)]
pub enum CasOutcome {
    /// The write won; the returned snapshot carries the bumped version.
    Updated(CreationJob),
    /// Another writer got there first (or the job is already terminal).
    /// Nothing was mutated.
    Conflict,
}

/// Trait for job storage backends.
///
/// State is only ever mutated through `compare_and_set`; terminal states are
/// immutable regardless of the version presented.
pub trait JobStore: Send + Sync {
    /// Persist a new job in Queued at version 1.
    /// Fails with `AlreadyExists` on a duplicate id or a duplicate
    /// (owner, idempotency_key) pair.
    fn create(&self, new_job: NewJob) -> Result<CreationJob, JobStoreError>;

    /// Get a job by id.
    fn get(&self, id: &str) -> Result<Option<CreationJob>, JobStoreError>;

    /// Look up a job by the caller-supplied idempotency key.
    fn find_by_idempotency_key(
        &self,
        owner: &str,
        key: &str,
    ) -> Result<Option<CreationJob>, JobStoreError>;

    /// Atomically replace the state iff the stored version matches
    /// `expected_version` and the job is not terminal.
    fn compare_and_set(
        &self,
        id: &str,
        expected_version: u64,
        new_state: JobState,
    ) -> Result<CasOutcome, JobStoreError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<CreationJob>, JobStoreError>;

    /// Count jobs matching the filter.
    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError>;

    /// Number of distinct owners with non-terminal jobs. Feeds the surge
    /// sampler's active-user signal.
    fn count_active_owners(&self) -> Result<i64, JobStoreError>;

    /// Delete terminal jobs last updated before the cutoff. Returns how many
    /// were evicted.
    fn evict_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JobStoreError>;
}
