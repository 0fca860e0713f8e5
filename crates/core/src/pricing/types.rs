//! Pricing data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price tier for a creation request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    #[default]
    Standard,
    Priority,
}

impl PriceTier {
    pub const ALL: [PriceTier; 2] = [PriceTier::Standard, PriceTier::Priority];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTier::Standard => "standard",
            PriceTier::Priority => "priority",
        }
    }
}

/// An immutable price snapshot captured at admission time.
///
/// Stored on the job as `price_charged`; later surge changes never alter it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub tier: PriceTier,
    /// Final amount, surge-adjusted, rounded to cents.
    pub amount: f64,
    /// The multiplier in effect when the quote was taken.
    pub multiplier: f64,
    pub surge_active: bool,
}

/// The process-wide surge record. Written only by the sampler, read by
/// everyone else as a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurgeState {
    pub sampled_cpu: f32,
    pub sampled_memory: f32,
    pub sampled_active_users: u32,
    pub multiplier: f64,
    pub surge_active: bool,
    /// Set when surge activated, cleared on deactivation.
    pub active_since: Option<DateTime<Utc>>,
}

impl Default for SurgeState {
    fn default() -> Self {
        Self {
            sampled_cpu: 0.0,
            sampled_memory: 0.0,
            sampled_active_users: 0,
            multiplier: 1.0,
            surge_active: false,
            active_since: None,
        }
    }
}

/// One host-load reading from a [`super::LoadProbe`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HostLoad {
    pub cpu_pct: f32,
    pub memory_pct: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_serialization() {
        assert_eq!(
            serde_json::to_string(&PriceTier::Standard).unwrap(),
            "\"standard\""
        );
        let tier: PriceTier = serde_json::from_str("\"priority\"").unwrap();
        assert_eq!(tier, PriceTier::Priority);
    }

    #[test]
    fn test_default_surge_state_is_inactive() {
        let state = SurgeState::default();
        assert!(!state.surge_active);
        assert_eq!(state.multiplier, 1.0);
        assert!(state.active_since.is_none());
    }

    #[test]
    fn test_quote_roundtrip() {
        let quote = PriceQuote {
            tier: PriceTier::Standard,
            amount: 1.19,
            multiplier: 1.2,
            surge_active: true,
        };
        let json = serde_json::to_string(&quote).unwrap();
        let parsed: PriceQuote = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, quote);
    }
}
