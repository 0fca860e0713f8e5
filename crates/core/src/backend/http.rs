//! HTTP implementation of the generation backend.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::BackendConfig;

use super::{GeneratedArtifact, GenerationBackend, GenerationError, JobSpec};

/// Generation backend that POSTs job specs to an inference service.
pub struct HttpGenerationBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

/// Wire format of a successful backend response.
#[derive(Debug, Deserialize)]
struct ProcessResponse {
    content_type: String,
    content: String,
}

impl HttpGenerationBackend {
    pub fn new(config: BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn process(&self, spec: &JobSpec) -> Result<GeneratedArtifact, GenerationError> {
        let url = format!("{}/process", self.config.url.trim_end_matches('/'));
        debug!(job_id = %spec.job_id, %url, "dispatching job to backend");

        let response = self
            .client
            .post(&url)
            .json(spec)
            .send()
            .await
            .map_err(|e| GenerationError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error()
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            return Err(GenerationError::Transient(format!(
                "backend returned HTTP {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Rejected(format!(
                "backend returned HTTP {}: {}",
                status, body
            )));
        }

        let body: ProcessResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transient(format!("invalid backend response: {}", e)))?;

        Ok(GeneratedArtifact {
            content_type: body.content_type,
            data: body.content.into_bytes(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
