//! Common test utilities for E2E testing with mocks.
//!
//! Provides a test fixture wiring the full router to an in-memory job store
//! and mock collaborators, so request flows can be exercised without real
//! inference, billing, or storage infrastructure.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use fabrica_core::{
    config::ApiKeyEntry,
    create_pricing_engine,
    testing::{MockGenerationBackend, MockObjectStore, MockPaymentProcessor},
    AdmissionConfig, AdmissionController, ApiKeyAuthenticator, AuthConfig, AuthMethod,
    Authenticator, Config, CreationOrchestrator, DatabaseConfig, GenerationBackend, HostLoad,
    JobStore, LoadProbe, NoneAuthenticator, ObjectStore, OrchestratorConfig, PaymentProcessor,
    PricingConfig, ServerConfig, SqliteJobStore, SurgeSampler, ZoneConfig, ZoneRoute,
};

use fabrica_server::api::create_router;
use fabrica_server::state::AppState;

/// Host-load probe whose readings the tests control.
pub struct SharedProbe {
    load: RwLock<HostLoad>,
}

impl SharedProbe {
    fn new() -> Self {
        Self {
            load: RwLock::new(HostLoad {
                cpu_pct: 20.0,
                memory_pct: 20.0,
            }),
        }
    }
}

impl LoadProbe for SharedProbe {
    fn sample(&self) -> HostLoad {
        *self.load.read().unwrap()
    }
}

/// Configuration for the test fixture.
#[derive(Clone)]
pub struct TestConfig {
    pub zones: Vec<ZoneConfig>,
    pub routes: Vec<ZoneRoute>,
    pub activation_samples: u32,
    pub max_processing_secs: u64,
    /// When set, the fixture authenticates with these API keys instead of
    /// accepting everything.
    pub api_keys: Option<Vec<ApiKeyEntry>>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            // Generous defaults so unrelated tests never hit limits.
            zones: vec![
                ZoneConfig {
                    name: "general".to_string(),
                    rate_per_minute: 6000.0,
                    burst: 1000,
                    reject_on_exceed: true,
                },
                ZoneConfig {
                    name: "create".to_string(),
                    rate_per_minute: 6000.0,
                    burst: 1000,
                    reject_on_exceed: true,
                },
            ],
            routes: vec![
                ZoneRoute {
                    path: "/api".to_string(),
                    zone: "general".to_string(),
                },
                ZoneRoute {
                    path: "/api/creations/create".to_string(),
                    zone: "create".to_string(),
                },
            ],
            activation_samples: 2,
            max_processing_secs: 3600,
            api_keys: None,
        }
    }
}

impl TestConfig {
    /// A tight creation zone for rate-limit tests.
    pub fn with_create_burst(burst: u32) -> Self {
        let mut config = Self::default();
        config.zones[1] = ZoneConfig {
            name: "create".to_string(),
            rate_per_minute: 10.0,
            burst,
            reject_on_exceed: true,
        };
        config
    }

    /// API key auth with per-user keys.
    pub fn with_api_keys(keys: &[(&str, &str)]) -> Self {
        Self {
            api_keys: Some(
                keys.iter()
                    .map(|(key, user)| ApiKeyEntry {
                        key: key.to_string(),
                        user: user.to_string(),
                    })
                    .collect(),
            ),
            ..Self::default()
        }
    }
}

/// Test fixture for E2E testing with mock dependencies.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock backend - script generation outcomes
    pub backend: Arc<MockGenerationBackend>,
    /// Mock payments - script charge outcomes
    pub payments: Arc<MockPaymentProcessor>,
    /// Mock object store
    pub object_store: Arc<MockObjectStore>,
    /// The shared job store, for seeding and direct assertions
    pub job_store: Arc<SqliteJobStore>,
    /// Controllable host-load probe
    pub probe: Arc<SharedProbe>,
    /// The surge sampler; drive it with `apply_samples`
    pub sampler: tokio::sync::Mutex<SurgeSampler>,
    orchestrator: Arc<CreationOrchestrator>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let backend = Arc::new(MockGenerationBackend::new());
        let payments = Arc::new(MockPaymentProcessor::new());
        let object_store = Arc::new(MockObjectStore::new());
        let job_store = Arc::new(SqliteJobStore::in_memory().expect("job store"));
        let probe = Arc::new(SharedProbe::new());

        let admission_config = AdmissionConfig {
            zones: test_config.zones.clone(),
            routes: test_config.routes.clone(),
            idle_eviction_secs: 900,
            sweep_interval_ms: 60_000,
        };

        let pricing_config = PricingConfig {
            activation_samples: test_config.activation_samples,
            ..Default::default()
        };

        let orchestrator_config = OrchestratorConfig {
            enabled: true,
            max_workers: 2,
            max_processing_secs: test_config.max_processing_secs,
            watchdog_interval_ms: 50,
            retention_secs: 86_400,
            retention_interval_ms: 3_600_000,
        };

        let authenticator: Arc<dyn Authenticator> = match &test_config.api_keys {
            Some(keys) => Arc::new(ApiKeyAuthenticator::new(keys.clone())),
            None => Arc::new(NoneAuthenticator),
        };

        let config = Config {
            auth: AuthConfig {
                method: if test_config.api_keys.is_some() {
                    AuthMethod::ApiKey
                } else {
                    AuthMethod::None
                },
                api_keys: test_config.api_keys.clone().unwrap_or_default(),
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            admission: admission_config.clone(),
            pricing: pricing_config.clone(),
            orchestrator: orchestrator_config.clone(),
            backend: None,
            storage: Default::default(),
            payments: Default::default(),
            sharing: Default::default(),
        };

        let admission =
            Arc::new(AdmissionController::new(admission_config).expect("admission controller"));

        let (pricing, sampler) = create_pricing_engine(
            pricing_config,
            Arc::clone(&probe) as Arc<dyn LoadProbe>,
            Arc::new(|| 0),
        );

        let orchestrator = Arc::new(CreationOrchestrator::new(
            orchestrator_config,
            Arc::clone(&job_store) as Arc<dyn JobStore>,
            Arc::clone(&admission),
            pricing.clone(),
            Arc::clone(&backend) as Arc<dyn GenerationBackend>,
            Arc::clone(&payments) as Arc<dyn PaymentProcessor>,
            Arc::clone(&object_store) as Arc<dyn ObjectStore>,
            "https://fabrica.app/share".to_string(),
        ));
        orchestrator.start().await;

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            admission,
            pricing,
            Arc::clone(&orchestrator),
            Arc::clone(&job_store) as Arc<dyn JobStore>,
        ));

        let router = create_router(state);

        Self {
            router,
            backend,
            payments,
            object_store,
            job_store,
            probe,
            sampler: tokio::sync::Mutex::new(sampler),
            orchestrator,
        }
    }

    /// Feed `n` identical samples through the surge sampler.
    pub async fn apply_samples(&self, load: HostLoad, users: u32, n: usize) {
        *self.probe.load.write().unwrap() = load;
        let mut sampler = self.sampler.lock().await;
        for _ in 0..n {
            sampler.apply_sample(load, users);
        }
    }

    /// Poll a creation until it reaches a terminal status.
    pub async fn wait_for_terminal(&self, creation_id: &str, timeout: Duration) -> Value {
        let start = std::time::Instant::now();
        loop {
            let response = self.get(&format!("/api/creations/{}", creation_id)).await;
            assert_eq!(response.status, StatusCode::OK, "poll failed: {:?}", response.body);
            let status = response.body["status"].as_str().unwrap_or_default().to_string();
            if status == "completed" || status == "failed" {
                return response.body;
            }
            if start.elapsed() > timeout {
                panic!("creation {} not terminal after {:?}", creation_id, timeout);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::builder().method("GET").uri(path).body(Body::empty()).unwrap())
            .await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    /// Send a GET request with an extra header.
    pub async fn get_with_header(
        &self,
        path: &str,
        header_name: &str,
        header_value: &str,
    ) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(path)
                .header(header_name, header_value)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Send a POST request with JSON body and an extra header.
    pub async fn post_with_header(
        &self,
        path: &str,
        body: Value,
        header_name: &str,
        header_value: &str,
    ) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", "application/json")
                .header(header_name, header_value)
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    /// Send a POST request with a raw string body (for malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Send a GET request and return the raw body as text (for /metrics).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&body_bytes).to_string())
    }

    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Stop background loops; call at the end of lifecycle-heavy tests.
    pub async fn shutdown(&self) {
        self.orchestrator.stop().await;
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
