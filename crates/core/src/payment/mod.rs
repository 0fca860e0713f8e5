//! Payment processor collaborator.
//!
//! Charges happen at admission, before the job is persisted, so a payment
//! failure never leaves a half-created job behind and clients can safely
//! avoid resubmitting on a 402.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::{PaymentMethod, PaymentsConfig};
use crate::pricing::PriceQuote;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment service unavailable: {0}")]
    Unavailable(String),
}

/// Trait for payment processors.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Charge the owner the quoted amount.
    async fn charge(&self, owner: &str, quote: &PriceQuote) -> Result<(), PaymentError>;

    fn processor_name(&self) -> &'static str;
}

/// Processor that records charges in the log only. The default for
/// self-hosted deployments without billing.
pub struct NoopPaymentProcessor;

impl NoopPaymentProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoopPaymentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProcessor for NoopPaymentProcessor {
    async fn charge(&self, owner: &str, quote: &PriceQuote) -> Result<(), PaymentError> {
        info!(
            owner,
            amount = quote.amount,
            tier = quote.tier.as_str(),
            surge = quote.surge_active,
            "charge recorded (noop processor)"
        );
        Ok(())
    }

    fn processor_name(&self) -> &'static str {
        "none"
    }
}

/// Factory function to create a payment processor from config.
pub fn create_payment_processor(config: &PaymentsConfig) -> Box<dyn PaymentProcessor> {
    match config.method {
        PaymentMethod::None => Box::new(NoopPaymentProcessor::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PriceTier;

    #[tokio::test]
    async fn test_noop_processor_accepts_charges() {
        let processor = NoopPaymentProcessor::new();
        let quote = PriceQuote {
            tier: PriceTier::Standard,
            amount: 0.99,
            multiplier: 1.0,
            surge_active: false,
        };
        assert!(processor.charge("alice", &quote).await.is_ok());
        assert_eq!(processor.processor_name(), "none");
    }

    #[test]
    fn test_factory_builds_noop() {
        let processor = create_payment_processor(&PaymentsConfig::default());
        assert_eq!(processor.processor_name(), "none");
    }
}
