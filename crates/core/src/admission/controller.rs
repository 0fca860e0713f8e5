//! The admission controller: zone resolution + per-client buckets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, RwLock};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::auth::Identity;
use crate::metrics::ADMISSION_DECISIONS;

use super::bucket::LeakyBucket;
use super::routes::RouteTable;
use super::{AdmissionConfig, AdmissionError, ZoneConfig};

type BucketKey = (usize, String);
type BucketMap = HashMap<BucketKey, Arc<Mutex<LeakyBucket>>>;

/// Admits or rejects requests under the configured zone limits.
///
/// Contention is scoped to a single (zone, client) key: the map lock is held
/// only to look up or insert a bucket, the per-bucket mutex only for the
/// token arithmetic.
pub struct AdmissionController {
    zones: Vec<ZoneConfig>,
    table: RouteTable,
    idle_eviction: Duration,
    sweep_interval: Duration,
    buckets: Arc<RwLock<BucketMap>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Result<Self, AdmissionError> {
        let table = RouteTable::build(&config.routes, &config.zones)?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            zones: config.zones,
            table,
            idle_eviction: Duration::from_secs(config.idle_eviction_secs),
            sweep_interval: Duration::from_millis(config.sweep_interval_ms),
            buckets: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
        })
    }

    /// Admit or reject one request.
    ///
    /// The most specific matching route's zone governs exclusively; no other
    /// zone's bucket is touched. Paths with no matching route are admitted
    /// without rate limiting.
    pub async fn admit(&self, path: &str, client: &Identity) -> Result<(), AdmissionError> {
        let Some(zone_idx) = self.table.resolve(path) else {
            return Ok(());
        };
        let zone = &self.zones[zone_idx];

        let bucket = self.bucket_for(zone_idx, zone, &client.user_id).await;
        let acquired = bucket.lock().unwrap().try_acquire();

        match acquired {
            Ok(()) => {
                ADMISSION_DECISIONS
                    .with_label_values(&[&zone.name, "allowed"])
                    .inc();
                Ok(())
            }
            Err(wait) if zone.reject_on_exceed => {
                debug!(
                    zone = %zone.name,
                    client = %client.user_id,
                    "admission rejected"
                );
                ADMISSION_DECISIONS
                    .with_label_values(&[&zone.name, "rejected"])
                    .inc();
                Err(AdmissionError::Rejected {
                    zone: zone.name.clone(),
                    retry_after_ms: wait.as_millis() as u64,
                })
            }
            Err(_) => {
                // Shadow mode: the request would have been rejected.
                warn!(
                    zone = %zone.name,
                    client = %client.user_id,
                    "rate limit exceeded in shadow-mode zone, admitting"
                );
                ADMISSION_DECISIONS
                    .with_label_values(&[&zone.name, "shadow_exceeded"])
                    .inc();
                Ok(())
            }
        }
    }

    async fn bucket_for(
        &self,
        zone_idx: usize,
        zone: &ZoneConfig,
        client: &str,
    ) -> Arc<Mutex<LeakyBucket>> {
        let key = (zone_idx, client.to_string());

        {
            let buckets = self.buckets.read().await;
            if let Some(bucket) = buckets.get(&key) {
                return Arc::clone(bucket);
            }
        }

        let mut buckets = self.buckets.write().await;
        Arc::clone(buckets.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(LeakyBucket::new(zone.rate_per_minute, zone.burst)))
        }))
    }

    /// Number of live buckets, for status and tests.
    pub async fn bucket_count(&self) -> usize {
        self.buckets.read().await.len()
    }

    /// Spawn the idle-bucket eviction sweep.
    pub fn start(&self) {
        let buckets = Arc::clone(&self.buckets);
        let idle_eviction = self.idle_eviction;
        let sweep_interval = self.sweep_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Admission eviction sweep started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Admission eviction sweep received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(sweep_interval) => {
                        let evicted = Self::evict_idle(&buckets, idle_eviction).await;
                        if evicted > 0 {
                            debug!(evicted, "evicted idle rate-limit buckets");
                        }
                    }
                }
            }
            info!("Admission eviction sweep stopped");
        });
    }

    /// Stop the eviction sweep.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn evict_idle(buckets: &Arc<RwLock<BucketMap>>, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| match bucket.lock() {
            Ok(bucket) => bucket.idle_for(now) < max_idle,
            Err(_) => false,
        });
        before - buckets.len()
    }
}
