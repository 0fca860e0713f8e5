//! Load-adaptive pricing.
//!
//! A single background sampler derives a surge multiplier from host load and
//! active-user counts; request handlers read an immutable snapshot through a
//! watch channel and never contend with the sampler. The quote captured at
//! admission is stored on the job and never revised.

mod engine;
mod probe;
mod types;

pub use engine::{create_pricing_engine, ActiveUsersProbe, PricingEngine, SurgeSampler};
pub use probe::{LoadProbe, ProcLoadProbe};
pub use types::{HostLoad, PriceQuote, PriceTier, SurgeState};

use serde::{Deserialize, Serialize};

/// Pricing engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
    /// How often the load sampler runs (milliseconds).
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,

    /// Multiplier applied while surge is active. Must be >= 1.0.
    #[serde(default = "default_surge_multiplier")]
    pub surge_multiplier: f64,

    /// CPU percentage above which a sample counts as breaching.
    #[serde(default = "default_cpu_watermark")]
    pub cpu_high_watermark: f32,

    /// Memory percentage above which a sample counts as breaching.
    #[serde(default = "default_memory_watermark")]
    pub memory_high_watermark: f32,

    /// Active-user count above which a sample counts as breaching.
    #[serde(default = "default_user_watermark")]
    pub user_watermark: u32,

    /// Consecutive breaching samples required to activate surge, and
    /// consecutive clear samples required to deactivate it.
    #[serde(default = "default_activation_samples")]
    pub activation_samples: u32,

    /// Base price per tier, in the account currency.
    #[serde(default)]
    pub base_prices: BasePrices,
}

fn default_sample_interval() -> u64 {
    5000
}

fn default_surge_multiplier() -> f64 {
    1.2
}

fn default_cpu_watermark() -> f32 {
    80.0
}

fn default_memory_watermark() -> f32 {
    80.0
}

fn default_user_watermark() -> u32 {
    1000
}

fn default_activation_samples() -> u32 {
    3
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval(),
            surge_multiplier: default_surge_multiplier(),
            cpu_high_watermark: default_cpu_watermark(),
            memory_high_watermark: default_memory_watermark(),
            user_watermark: default_user_watermark(),
            activation_samples: default_activation_samples(),
            base_prices: BasePrices::default(),
        }
    }
}

impl PricingConfig {
    pub fn base_price(&self, tier: PriceTier) -> f64 {
        match tier {
            PriceTier::Standard => self.base_prices.standard,
            PriceTier::Priority => self.base_prices.priority,
        }
    }
}

/// Base prices per tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasePrices {
    #[serde(default = "default_standard_price")]
    pub standard: f64,
    #[serde(default = "default_priority_price")]
    pub priority: f64,
}

fn default_standard_price() -> f64 {
    0.99
}

fn default_priority_price() -> f64 {
    2.99
}

impl Default for BasePrices {
    fn default() -> Self {
        Self {
            standard: default_standard_price(),
            priority: default_priority_price(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PricingConfig::default();
        assert_eq!(config.sample_interval_ms, 5000);
        assert_eq!(config.surge_multiplier, 1.2);
        assert_eq!(config.cpu_high_watermark, 80.0);
        assert_eq!(config.activation_samples, 3);
        assert_eq!(config.base_price(PriceTier::Standard), 0.99);
        assert_eq!(config.base_price(PriceTier::Priority), 2.99);
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            surge_multiplier = 1.5
            activation_samples = 5

            [base_prices]
            standard = 0.49
        "#;
        let config: PricingConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.surge_multiplier, 1.5);
        assert_eq!(config.activation_samples, 5);
        assert_eq!(config.base_prices.standard, 0.49);
        assert_eq!(config.base_prices.priority, 2.99);
    }
}
