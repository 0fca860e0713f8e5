//! Mock payment processor for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::payment::{PaymentError, PaymentProcessor};
use crate::pricing::PriceQuote;

/// A recorded charge for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCharge {
    pub owner: String,
    pub quote: PriceQuote,
}

/// Mock implementation of the PaymentProcessor trait.
pub struct MockPaymentProcessor {
    charges: Arc<RwLock<Vec<RecordedCharge>>>,
    next_error: Arc<RwLock<Option<String>>>,
}

impl Default for MockPaymentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self {
            charges: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Decline the next charge with this message.
    pub async fn fail_next(&self, message: impl Into<String>) {
        *self.next_error.write().await = Some(message.into());
    }

    /// All recorded charges, in order.
    pub async fn charges(&self) -> Vec<RecordedCharge> {
        self.charges.read().await.clone()
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn charge(&self, owner: &str, quote: &PriceQuote) -> Result<(), PaymentError> {
        if let Some(message) = self.next_error.write().await.take() {
            return Err(PaymentError::Declined(message));
        }

        self.charges.write().await.push(RecordedCharge {
            owner: owner.to_string(),
            quote: quote.clone(),
        });
        Ok(())
    }

    fn processor_name(&self) -> &'static str {
        "mock"
    }
}
