//! Core job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::PriceQuote;

/// What kind of content the job produces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreationType {
    #[default]
    General,
    Poster,
    Story,
    Avatar,
}

impl CreationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationType::General => "general",
            CreationType::Poster => "poster",
            CreationType::Story => "story",
            CreationType::Avatar => "avatar",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "general" => Some(CreationType::General),
            "poster" => Some(CreationType::Poster),
            "story" => Some(CreationType::Story),
            "avatar" => Some(CreationType::Avatar),
            _ => None,
        }
    }
}

/// The input handed to the generation backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputDescriptor {
    /// Inline text prompt.
    Text { content: String },
    /// Reference to a previously uploaded audio payload.
    Audio { payload_ref: String },
    /// Reference to a previously uploaded image payload.
    Image { payload_ref: String },
}

impl InputDescriptor {
    pub fn input_type(&self) -> &'static str {
        match self {
            InputDescriptor::Text { .. } => "text",
            InputDescriptor::Audio { .. } => "audio",
            InputDescriptor::Image { .. } => "image",
        }
    }
}

/// Platform a creation can be shared to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SharePlatform {
    Tiktok,
    Instagram,
    Twitter,
    Youtube,
}

impl SharePlatform {
    pub const ALL: [SharePlatform; 4] = [
        SharePlatform::Tiktok,
        SharePlatform::Instagram,
        SharePlatform::Twitter,
        SharePlatform::Youtube,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SharePlatform::Tiktok => "tiktok",
            SharePlatform::Instagram => "instagram",
            SharePlatform::Twitter => "twitter",
            SharePlatform::Youtube => "youtube",
        }
    }
}

/// A share link for a completed creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShareLink {
    pub platform: SharePlatform,
    pub url: String,
}

impl ShareLink {
    /// Build the full set of platform links for a completed job.
    pub fn links_for(base_url: &str, job_id: &str) -> Vec<ShareLink> {
        SharePlatform::ALL
            .iter()
            .map(|platform| ShareLink {
                platform: *platform,
                url: format!(
                    "{}/{}?platform={}",
                    base_url.trim_end_matches('/'),
                    job_id,
                    platform.as_str()
                ),
            })
            .collect()
    }
}

/// Reason code for a terminal failure. Recorded durably with the job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The generation backend rejected the job or kept failing after the
    /// automatic retry.
    Backend,
    /// The watchdog forced the job out of Processing.
    Timeout,
    /// The artifact could not be uploaded to object storage.
    Storage,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Backend => "backend",
            FailureReason::Timeout => "timeout",
            FailureReason::Storage => "storage",
        }
    }
}

/// Current state of a creation job.
///
/// State machine flow:
/// ```text
/// Queued -> Processing -> Completed
///                |
///                v
///             Failed
/// ```
///
/// Completed and Failed are terminal; no further transition is ever
/// accepted. Every transition goes through the store's compare-and-set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobState {
    /// Created and persisted, waiting for a worker.
    Queued,

    /// A worker owns the job.
    Processing {
        started_at: DateTime<Utc>,
        /// Backend attempt currently in flight (1 or 2).
        attempt: u32,
    },

    /// Generation finished and the artifact is stored (terminal).
    Completed {
        completed_at: DateTime<Utc>,
        /// URL of the stored artifact.
        result_reference: String,
        share_links: Vec<ShareLink>,
    },

    /// The job failed (terminal).
    Failed {
        reason: FailureReason,
        message: String,
        failed_at: DateTime<Utc>,
    },
}

impl JobState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Failed { .. })
    }

    /// Returns true while a worker owns the job.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Processing { .. })
    }

    /// Returns the state type as a string (for filtering and responses).
    pub fn state_type(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing { .. } => "processing",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
        }
    }
}

/// A content creation job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreationJob {
    /// Unique identifier (UUID). Immutable.
    pub id: String,

    /// Owning user (from auth identity). Status reads are owner-scoped.
    pub owner: String,

    pub creation_type: CreationType,

    pub input: InputDescriptor,

    /// Output language, ISO 639-1.
    pub language: String,

    /// Price snapshot taken at admission. Never mutated afterwards.
    pub price_charged: PriceQuote,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub state: JobState,

    /// Optimistic concurrency token; bumped on every successful update.
    pub version: u64,

    /// Caller-supplied idempotency key, unique per owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}
