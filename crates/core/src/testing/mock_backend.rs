//! Mock generation backend for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

use crate::backend::{GeneratedArtifact, GenerationBackend, GenerationError, JobSpec};

/// Scripted outcome for one `process` call.
enum ScriptedResult {
    Success(GeneratedArtifact),
    Transient(String),
    Rejected(String),
}

/// Mock implementation of the GenerationBackend trait.
///
/// Behaviour is scripted per call: queued results are consumed in order, and
/// once the queue is empty every call succeeds with a default artifact. An
/// optional per-call delay simulates slow inference for watchdog tests.
pub struct MockGenerationBackend {
    script: Arc<RwLock<VecDeque<ScriptedResult>>>,
    processed: Arc<RwLock<Vec<JobSpec>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            script: Arc::new(RwLock::new(VecDeque::new())),
            processed: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    fn default_artifact() -> GeneratedArtifact {
        GeneratedArtifact {
            content_type: "application/json".to_string(),
            data: br#"{"text":"generated content"}"#.to_vec(),
        }
    }

    /// Queue a successful result.
    pub async fn push_success(&self, artifact: GeneratedArtifact) {
        self.script
            .write()
            .await
            .push_back(ScriptedResult::Success(artifact));
    }

    /// Queue a transient failure (retried once by the orchestrator).
    pub async fn push_transient_failure(&self, message: impl Into<String>) {
        self.script
            .write()
            .await
            .push_back(ScriptedResult::Transient(message.into()));
    }

    /// Queue a permanent rejection (never retried).
    pub async fn push_rejection(&self, message: impl Into<String>) {
        self.script
            .write()
            .await
            .push_back(ScriptedResult::Rejected(message.into()));
    }

    /// Delay every subsequent call, to simulate slow inference.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// All specs processed so far, in call order.
    pub async fn processed_specs(&self) -> Vec<JobSpec> {
        self.processed.read().await.clone()
    }

    /// Number of `process` calls made.
    pub async fn call_count(&self) -> usize {
        self.processed.read().await.len()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn process(&self, spec: &JobSpec) -> Result<GeneratedArtifact, GenerationError> {
        self.processed.write().await.push(spec.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.script.write().await.pop_front() {
            Some(ScriptedResult::Success(artifact)) => Ok(artifact),
            Some(ScriptedResult::Transient(msg)) => Err(GenerationError::Transient(msg)),
            Some(ScriptedResult::Rejected(msg)) => Err(GenerationError::Rejected(msg)),
            None => Ok(Self::default_artifact()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{CreationType, InputDescriptor};

    fn spec() -> JobSpec {
        JobSpec {
            job_id: "job-1".to_string(),
            owner: "alice".to_string(),
            creation_type: CreationType::General,
            input: InputDescriptor::Text {
                content: "a cat".to_string(),
            },
            language: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn test_scripted_results_consumed_in_order() {
        let backend = MockGenerationBackend::new();
        backend.push_transient_failure("hiccup").await;

        let first = backend.process(&spec()).await;
        assert!(matches!(first, Err(GenerationError::Transient(_))));

        // Script exhausted: defaults to success.
        let second = backend.process(&spec()).await;
        assert!(second.is_ok());

        assert_eq!(backend.call_count().await, 2);
        assert_eq!(backend.processed_specs().await[0].job_id, "job-1");
    }
}
