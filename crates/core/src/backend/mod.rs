//! Generation backend: the external AI inference collaborator.

mod http;

pub use http::HttpGenerationBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{CreationJob, CreationType, InputDescriptor};

/// Errors from the generation backend.
///
/// The split drives retry policy: transient failures are retried exactly
/// once, rejections never are.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Infrastructure-level failure (timeout, connection reset, 5xx).
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The backend refused the job (validation-style 4xx). Retrying the
    /// same input cannot succeed.
    #[error("backend rejected job: {0}")]
    Rejected(String),
}

/// The subset of a job handed to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: String,
    pub owner: String,
    pub creation_type: CreationType,
    pub input: InputDescriptor,
    pub language: String,
}

impl From<&CreationJob> for JobSpec {
    fn from(job: &CreationJob) -> Self {
        Self {
            job_id: job.id.clone(),
            owner: job.owner.clone(),
            creation_type: job.creation_type,
            input: job.input.clone(),
            language: job.language.clone(),
        }
    }
}

/// A generated artifact, ready for upload to object storage.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArtifact {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl GeneratedArtifact {
    /// File name to store the artifact under, derived from its media type.
    pub fn suggested_name(&self) -> &'static str {
        match self.content_type.as_str() {
            "application/json" => "result.json",
            "text/plain" => "result.txt",
            "image/jpeg" => "result.jpg",
            "image/png" => "result.png",
            "audio/mpeg" => "result.mp3",
            _ => "result.bin",
        }
    }
}

/// Trait for generation backends.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run one generation job to completion.
    async fn process(&self, spec: &JobSpec) -> Result<GeneratedArtifact, GenerationError>;

    /// Name of this backend, for logs and metrics.
    fn backend_name(&self) -> &'static str;
}
