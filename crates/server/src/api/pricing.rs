//! Pricing API handlers.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use fabrica_core::{AdmissionError, PriceTier};

use super::creations::rejection_response;
use super::middleware::Caller;
use crate::state::AppState;

pub const PRICING_PATH: &str = "/api/pricing";

/// Current price for one tier.
#[derive(Debug, Serialize)]
pub struct TierPrice {
    pub current_price: f64,
    pub surge_active: bool,
}

/// Response for the pricing endpoint.
#[derive(Debug, Serialize)]
pub struct PricingResponse {
    pub tiers: BTreeMap<String, TierPrice>,
    pub multiplier: f64,
    pub surge_active: bool,
}

/// Get current prices for all tiers.
pub async fn get_pricing(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
) -> Response {
    if let Err(AdmissionError::Rejected {
        zone,
        retry_after_ms,
    }) = state.admission().admit(PRICING_PATH, &identity).await
    {
        return rejection_response(&zone, retry_after_ms);
    }

    let mut tiers = BTreeMap::new();
    for tier in PriceTier::ALL {
        let quote = state.pricing().current_price(tier);
        tiers.insert(
            tier.as_str().to_string(),
            TierPrice {
                current_price: quote.amount,
                surge_active: quote.surge_active,
            },
        );
    }

    let surge = state.pricing().surge_state();
    Json(PricingResponse {
        tiers,
        multiplier: surge.multiplier,
        surge_active: surge.surge_active,
    })
    .into_response()
}
