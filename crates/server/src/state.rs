use std::sync::Arc;

use fabrica_core::{
    AdmissionController, Authenticator, Config, CreationOrchestrator, JobStore, PricingEngine,
    SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    admission: Arc<AdmissionController>,
    pricing: PricingEngine,
    orchestrator: Arc<CreationOrchestrator>,
    job_store: Arc<dyn JobStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        admission: Arc<AdmissionController>,
        pricing: PricingEngine,
        orchestrator: Arc<CreationOrchestrator>,
        job_store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            config,
            authenticator,
            admission,
            pricing,
            orchestrator,
            job_store,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn admission(&self) -> &AdmissionController {
        self.admission.as_ref()
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    pub fn orchestrator(&self) -> &CreationOrchestrator {
        self.orchestrator.as_ref()
    }

    pub fn job_store(&self) -> &dyn JobStore {
        self.job_store.as_ref()
    }
}
