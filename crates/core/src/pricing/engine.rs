//! Pricing engine and surge sampler.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::metrics::SURGE_TRANSITIONS;

use super::probe::LoadProbe;
use super::types::{HostLoad, PriceQuote, PriceTier, SurgeState};
use super::PricingConfig;

/// Callback supplying the current active-user count, typically backed by the
/// job store.
pub type ActiveUsersProbe = Arc<dyn Fn() -> u32 + Send + Sync>;

/// Create a pricing engine and its background sampler.
///
/// The engine is a cheap handle that reads snapshots; the sampler is the
/// single writer and is consumed by `tokio::spawn(sampler.run())`.
pub fn create_pricing_engine(
    config: PricingConfig,
    probe: Arc<dyn LoadProbe>,
    active_users: ActiveUsersProbe,
) -> (PricingEngine, SurgeSampler) {
    let (tx, rx) = watch::channel(SurgeState::default());

    let engine = PricingEngine {
        config: config.clone(),
        state_rx: rx,
    };

    let sampler = SurgeSampler {
        config,
        probe,
        active_users,
        tx,
        breach_streak: 0,
        clear_streak: 0,
    };

    (engine, sampler)
}

/// Read-side handle: returns price snapshots without ever blocking on the
/// sampler.
#[derive(Clone)]
pub struct PricingEngine {
    config: PricingConfig,
    state_rx: watch::Receiver<SurgeState>,
}

impl PricingEngine {
    /// Current price for a tier as an immutable quote.
    pub fn current_price(&self, tier: PriceTier) -> PriceQuote {
        let state = self.state_rx.borrow().clone();
        PriceQuote {
            tier,
            amount: round_cents(self.config.base_price(tier) * state.multiplier),
            multiplier: state.multiplier,
            surge_active: state.surge_active,
        }
    }

    /// Latest surge state snapshot.
    pub fn surge_state(&self) -> SurgeState {
        self.state_rx.borrow().clone()
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }
}

/// The single writer of [`SurgeState`].
///
/// Applies hysteresis: `activation_samples` consecutive breaching samples
/// turn surge on, the same number of consecutive clear samples turn it off.
/// A single spike never toggles the state.
pub struct SurgeSampler {
    config: PricingConfig,
    probe: Arc<dyn LoadProbe>,
    active_users: ActiveUsersProbe,
    tx: watch::Sender<SurgeState>,
    breach_streak: u32,
    clear_streak: u32,
}

impl SurgeSampler {
    /// Run the sampling loop until every engine handle is dropped.
    pub async fn run(mut self) {
        let interval = Duration::from_millis(self.config.sample_interval_ms);
        info!("Surge sampler started");
        loop {
            tokio::time::sleep(interval).await;
            if self.tx.is_closed() {
                break;
            }
            let host = self.probe.sample();
            let users = (self.active_users)();
            self.apply_sample(host, users);
        }
        info!("Surge sampler stopped");
    }

    /// Fold one sample into the surge state and publish the new snapshot.
    pub fn apply_sample(&mut self, host: HostLoad, active_users: u32) {
        let breaching = host.cpu_pct > self.config.cpu_high_watermark
            || host.memory_pct > self.config.memory_high_watermark
            || active_users > self.config.user_watermark;

        if breaching {
            self.breach_streak += 1;
            self.clear_streak = 0;
        } else {
            self.clear_streak += 1;
            self.breach_streak = 0;
        }

        let previous = self.tx.borrow().clone();
        let mut surge_active = previous.surge_active;
        let mut active_since = previous.active_since;

        if !surge_active && self.breach_streak >= self.config.activation_samples {
            surge_active = true;
            active_since = Some(Utc::now());
            SURGE_TRANSITIONS.with_label_values(&["activated"]).inc();
            info!(
                cpu = host.cpu_pct,
                memory = host.memory_pct,
                active_users,
                "surge pricing activated"
            );
        } else if surge_active && self.clear_streak >= self.config.activation_samples {
            surge_active = false;
            active_since = None;
            SURGE_TRANSITIONS.with_label_values(&["deactivated"]).inc();
            info!("surge pricing deactivated");
        }

        let multiplier = if surge_active {
            self.config.surge_multiplier.max(1.0)
        } else {
            1.0
        };

        let state = SurgeState {
            sampled_cpu: host.cpu_pct,
            sampled_memory: host.memory_pct,
            sampled_active_users: active_users,
            multiplier,
            surge_active,
            active_since,
        };

        debug!(
            cpu = state.sampled_cpu,
            memory = state.sampled_memory,
            users = state.sampled_active_users,
            surge = state.surge_active,
            "surge sample applied"
        );
        let _ = self.tx.send(state);
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
