pub mod admission;
pub mod auth;
pub mod backend;
pub mod config;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod payment;
pub mod pricing;
pub mod storage;
pub mod testing;

pub use admission::{AdmissionConfig, AdmissionController, AdmissionError, ZoneConfig, ZoneRoute};
pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use backend::{
    GeneratedArtifact, GenerationBackend, GenerationError, HttpGenerationBackend, JobSpec,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, BackendConfig,
    Config, ConfigError, DatabaseConfig, PaymentsConfig, SanitizedConfig, ServerConfig,
    SharingConfig, StorageConfig,
};
pub use job::{
    CasOutcome, CreationJob, CreationType, FailureReason, InputDescriptor, JobFilter, JobState,
    JobStore, JobStoreError, NewJob, ShareLink, SqliteJobStore,
};
pub use orchestrator::{
    CreateRequest, CreationOrchestrator, InputKind, OrchestratorConfig, OrchestratorError,
    OrchestratorStatus, SubmitError,
};
pub use payment::{
    create_payment_processor, NoopPaymentProcessor, PaymentError, PaymentProcessor,
};
pub use pricing::{
    create_pricing_engine, ActiveUsersProbe, HostLoad, LoadProbe, PriceQuote, PriceTier,
    PricingConfig, PricingEngine, ProcLoadProbe, SurgeSampler, SurgeState,
};
pub use storage::{FsObjectStore, ObjectStore, StorageError};
