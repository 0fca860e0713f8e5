//! Types for the creation orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admission::AdmissionError;
use crate::job::{CreationType, InputDescriptor, JobStoreError};
use crate::payment::PaymentError;
use crate::pricing::PriceTier;

/// Largest accepted inline text prompt.
const MAX_TEXT_INPUT_CHARS: usize = 10_000;

/// Errors from status reads and background sweeps.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Unknown id, or a job the caller does not own. The two are
    /// indistinguishable on purpose.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Job store error.
    #[error("job store error: {0}")]
    Store(#[from] JobStoreError),
}

/// Errors from `submit`. Each variant maps to a distinct response code.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Malformed request, refused before any token or quote is consumed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Rate limit exceeded.
    #[error(transparent)]
    Rejected(#[from] AdmissionError),

    /// The payment processor refused the charge. No job was created, so the
    /// caller will not be double-charged by resubmitting.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The orchestrator is disabled or shutting down.
    #[error("creation service unavailable")]
    Unavailable,

    /// Job store error.
    #[error("job store error: {0}")]
    Store(#[from] JobStoreError),
}

/// Declared kind of the submitted input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Audio,
    Image,
}

/// A content creation request, as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest {
    pub input_type: InputKind,

    #[serde(default)]
    pub creation_type: CreationType,

    /// Inline prompt; required when input_type is text.
    #[serde(default)]
    pub text_input: Option<String>,

    /// Upload reference; required when input_type is audio or image.
    #[serde(default)]
    pub payload_ref: Option<String>,

    #[serde(default)]
    pub tier: PriceTier,

    #[serde(default = "default_language")]
    pub language: String,

    /// Optional idempotency key; resubmissions with the same key return the
    /// original job.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

impl CreateRequest {
    /// Check the request and produce the input descriptor.
    ///
    /// Runs before admission: a malformed request must not consume a rate
    /// limit token or a price quote.
    pub fn validate(&self) -> Result<InputDescriptor, String> {
        if self.language.is_empty() || self.language.len() > 8 {
            return Err("language must be a short ISO 639 code".to_string());
        }

        if let Some(key) = &self.idempotency_key {
            if key.is_empty() || key.len() > 128 {
                return Err("idempotency key must be 1-128 characters".to_string());
            }
        }

        match self.input_type {
            InputKind::Text => match self.text_input.as_deref() {
                None | Some("") => Err("text_input is required for text input".to_string()),
                Some(content) if content.chars().count() > MAX_TEXT_INPUT_CHARS => {
                    Err(format!(
                        "text_input exceeds {} characters",
                        MAX_TEXT_INPUT_CHARS
                    ))
                }
                Some(content) => Ok(InputDescriptor::Text {
                    content: content.to_string(),
                }),
            },
            InputKind::Audio => match self.payload_ref.as_deref() {
                None | Some("") => Err("payload_ref is required for audio input".to_string()),
                Some(payload_ref) => Ok(InputDescriptor::Audio {
                    payload_ref: payload_ref.to_string(),
                }),
            },
            InputKind::Image => match self.payload_ref.as_deref() {
                None | Some("") => Err("payload_ref is required for image input".to_string()),
                Some(payload_ref) => Ok(InputDescriptor::Image {
                    payload_ref: payload_ref.to_string(),
                }),
            },
        }
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the orchestrator is running.
    pub running: bool,
    /// Worker slots currently free.
    pub available_workers: usize,
    /// Worker pool size.
    pub max_workers: usize,
    /// Jobs waiting for a worker.
    pub queued_count: usize,
    /// Jobs currently processing.
    pub processing_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_request(content: &str) -> CreateRequest {
        CreateRequest {
            input_type: InputKind::Text,
            creation_type: CreationType::General,
            text_input: Some(content.to_string()),
            payload_ref: None,
            tier: PriceTier::Standard,
            language: "en".to_string(),
            idempotency_key: None,
        }
    }

    #[test]
    fn test_valid_text_request() {
        let input = text_request("a cat").validate().unwrap();
        assert_eq!(
            input,
            InputDescriptor::Text {
                content: "a cat".to_string()
            }
        );
    }

    #[test]
    fn test_text_request_without_prompt_fails() {
        let mut request = text_request("");
        assert!(request.validate().is_err());

        request.text_input = None;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_oversized_prompt_fails() {
        let request = text_request(&"x".repeat(MAX_TEXT_INPUT_CHARS + 1));
        let err = request.validate().unwrap_err();
        assert!(err.contains("exceeds"));
    }

    #[test]
    fn test_audio_requires_payload_ref() {
        let request = CreateRequest {
            input_type: InputKind::Audio,
            creation_type: CreationType::General,
            text_input: None,
            payload_ref: None,
            tier: PriceTier::Standard,
            language: "en".to_string(),
            idempotency_key: None,
        };
        assert!(request.validate().is_err());

        let request = CreateRequest {
            payload_ref: Some("uploads/voice.mp3".to_string()),
            ..request
        };
        let input = request.validate().unwrap();
        assert_eq!(input.input_type(), "audio");
    }

    #[test]
    fn test_bad_language_fails() {
        let mut request = text_request("a cat");
        request.language = String::new();
        assert!(request.validate().is_err());

        request.language = "x".repeat(20);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_bad_idempotency_key_fails() {
        let mut request = text_request("a cat");
        request.idempotency_key = Some(String::new());
        assert!(request.validate().is_err());

        request.idempotency_key = Some("k".repeat(200));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_deserialize_request_defaults() {
        let request: CreateRequest = serde_json::from_str(
            r#"{"input_type": "text", "text_input": "a cat"}"#,
        )
        .unwrap();
        assert_eq!(request.input_type, InputKind::Text);
        assert_eq!(request.creation_type, CreationType::General);
        assert_eq!(request.tier, PriceTier::Standard);
        assert_eq!(request.language, "en");
        assert!(request.idempotency_key.is_none());
    }
}
