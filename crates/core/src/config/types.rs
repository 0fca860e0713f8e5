use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::admission::AdmissionConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::pricing::PricingConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub sharing: SharingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// API keys accepted when method = "api_key". Each key maps to a user id
    /// so that rate limiting and job ownership are per caller.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

/// A configured API key and the user it authenticates as.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub user: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
    // Future: Oidc, Cert
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("fabrica.db")
}

/// Generation backend configuration (the external inference service).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL of the inference service (e.g. "http://localhost:9090")
    pub url: String,
    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u32,
}

fn default_backend_timeout() -> u32 {
    60
}

/// Object storage configuration for generated artifacts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory artifacts are written to.
    #[serde(default = "default_storage_root")]
    pub root_dir: PathBuf,
    /// Public base URL under which stored artifacts are reachable.
    #[serde(default = "default_storage_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root(),
            public_base_url: default_storage_base_url(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_storage_base_url() -> String {
    "http://localhost:8080/artifacts".to_string()
}

/// Payment processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub method: PaymentMethod,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            method: PaymentMethod::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Record charges in the log only. The default for self-hosted setups.
    #[default]
    None,
    // Future: Stripe
}

/// Share link configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SharingConfig {
    /// Base URL for generated share links.
    #[serde(default = "default_share_base_url")]
    pub base_url: String,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            base_url: default_share_base_url(),
        }
    }
}

fn default_share_base_url() -> String {
    "https://fabrica.app/share".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub admission: AdmissionConfig,
    pub pricing: PricingConfig,
    pub orchestrator: OrchestratorConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<SanitizedBackendConfig>,
    pub storage: StorageConfig,
    pub sharing: SharingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_keys_configured: usize,
}

/// Sanitized backend config (nothing secret today, kept symmetrical)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBackendConfig {
    pub url: String,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                api_keys_configured: config.auth.api_keys.len(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            admission: config.admission.clone(),
            pricing: config.pricing.clone(),
            orchestrator: config.orchestrator.clone(),
            backend: config.backend.as_ref().map(|b| SanitizedBackendConfig {
                url: b.url.clone(),
                timeout_secs: b.timeout_secs,
            }),
            storage: config.storage.clone(),
            sharing: config.sharing.clone(),
        }
    }
}
