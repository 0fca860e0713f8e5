//! Creation API handlers.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use fabrica_core::{
    AdmissionError, CreateRequest, CreationJob, CreationType, JobState, OrchestratorError,
    PriceTier, SubmitError,
};

use super::middleware::Caller;
use super::ErrorResponse;
use crate::state::AppState;

/// Canonical route paths, used for admission zone matching.
pub const CREATE_PATH: &str = "/api/creations/create";
pub const CREATIONS_PATH: &str = "/api/creations";

/// Maximum allowed limit for creation list queries
const MAX_LIMIT: i64 = 100;

/// Default limit for creation list queries
const DEFAULT_LIMIT: i64 = 20;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing creations
#[derive(Debug, Deserialize)]
pub struct ListCreationsParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for an accepted submission
#[derive(Debug, Serialize)]
pub struct CreationReceipt {
    pub creation_id: String,
    pub status: String,
    pub price: f64,
    pub surge_active: bool,
}

/// Full creation snapshot
#[derive(Debug, Serialize)]
pub struct CreationResponse {
    pub creation_id: String,
    pub status: String,
    pub creation_type: CreationType,
    pub input_type: String,
    pub language: String,
    pub price: f64,
    pub tier: PriceTier,
    pub surge_active: bool,
    pub state: JobState,
    pub created_at: String,
    pub updated_at: String,
    pub version: u64,
}

impl From<CreationJob> for CreationResponse {
    fn from(job: CreationJob) -> Self {
        Self {
            creation_id: job.id,
            status: job.state.state_type().to_string(),
            creation_type: job.creation_type,
            input_type: job.input.input_type().to_string(),
            language: job.language,
            price: job.price_charged.amount,
            tier: job.price_charged.tier,
            surge_active: job.price_charged.surge_active,
            state: job.state,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            version: job.version,
        }
    }
}

/// Response for listing creations
#[derive(Debug, Serialize)]
pub struct ListCreationsResponse {
    pub creations: Vec<CreationResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ============================================================================
// Error mapping
// ============================================================================

/// 429 with a Retry-After hint.
pub(super) fn rejection_response(zone: &str, retry_after_ms: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorResponse::new(format!(
            "rate limit exceeded for zone '{}'",
            zone
        ))),
    )
        .into_response();

    let retry_secs = retry_after_ms.div_ceil(1000).max(1);
    if let Ok(value) = HeaderValue::from_str(&retry_secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

fn submit_error_response(err: SubmitError) -> Response {
    match err {
        SubmitError::Validation(message) => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
        }
        SubmitError::Rejected(AdmissionError::Rejected {
            zone,
            retry_after_ms,
        }) => rejection_response(&zone, retry_after_ms),
        SubmitError::Rejected(other) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(other.to_string())),
        )
            .into_response(),
        SubmitError::Payment(e) => (
            StatusCode::PAYMENT_REQUIRED,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
        SubmitError::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("creation service unavailable")),
        )
            .into_response(),
        SubmitError::Store(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a new creation request.
///
/// Returns 202 with the job id and captured price; the client polls
/// `GET /api/creations/{id}` until the job is terminal.
pub async fn create_creation(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    headers: HeaderMap,
    Json(mut body): Json<CreateRequest>,
) -> Response {
    // Header takes precedence over a key in the body.
    if let Some(key) = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
    {
        body.idempotency_key = Some(key.to_string());
    }

    match state
        .orchestrator()
        .submit(CREATE_PATH, body, &identity)
        .await
    {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(CreationReceipt {
                creation_id: job.id,
                status: job.state.state_type().to_string(),
                price: job.price_charged.amount,
                surge_active: job.price_charged.surge_active,
            }),
        )
            .into_response(),
        Err(e) => submit_error_response(e),
    }
}

/// Get a creation snapshot by id.
pub async fn get_creation(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Response {
    let path = format!("{}/{}", CREATIONS_PATH, id);
    if let Err(AdmissionError::Rejected {
        zone,
        retry_after_ms,
    }) = state.admission().admit(&path, &identity).await
    {
        return rejection_response(&zone, retry_after_ms);
    }

    match state.orchestrator().get_status(&id, &identity) {
        Ok(job) => Json(CreationResponse::from(job)).into_response(),
        Err(OrchestratorError::JobNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Creation not found: {}", id))),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
    }
}

/// List the caller's creations.
pub async fn list_creations(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Query(params): Query<ListCreationsParams>,
) -> Response {
    if let Err(AdmissionError::Rejected {
        zone,
        retry_after_ms,
    }) = state.admission().admit(CREATIONS_PATH, &identity).await
    {
        return rejection_response(&zone, retry_after_ms);
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    match state.orchestrator().list_jobs(&identity, limit, offset) {
        Ok((jobs, total)) => Json(ListCreationsResponse {
            creations: jobs.into_iter().map(CreationResponse::from).collect(),
            total,
            limit,
            offset,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
    }
}
