//! Creation orchestrator implementation.
//!
//! Drives jobs through the state machine:
//! - submit: validate -> admit -> price -> charge -> persist -> dispatch
//! - workers: Queued -> Processing -> Completed/Failed, one retry for
//!   transient backend failures
//! - watchdog: forces Processing jobs past the deadline to Failed
//!
//! Terminal transitions are compare-and-set on the job version; a losing
//! writer discards its write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::auth::Identity;
use crate::backend::{GenerationBackend, GenerationError, JobSpec};
use crate::job::{
    CasOutcome, CreationJob, FailureReason, JobFilter, JobState, JobStore, NewJob, ShareLink,
};
use crate::metrics::{
    BACKEND_DURATION, CAS_CONFLICTS, GENERATION_RETRIES, JOBS_COMPLETED, JOBS_EVICTED,
    JOBS_FAILED, JOBS_SUBMITTED, JOB_PROCESSING_DURATION, JOB_STATE_TRANSITIONS,
    WATCHDOG_TIMEOUTS,
};
use crate::payment::PaymentProcessor;
use crate::pricing::PricingEngine;
use crate::storage::ObjectStore;

use super::config::OrchestratorConfig;
use super::types::{CreateRequest, OrchestratorError, OrchestratorStatus, SubmitError};

/// The creation orchestrator.
pub struct CreationOrchestrator {
    config: OrchestratorConfig,
    job_store: Arc<dyn JobStore>,
    admission: Arc<AdmissionController>,
    pricing: PricingEngine,
    backend: Arc<dyn GenerationBackend>,
    payments: Arc<dyn PaymentProcessor>,
    object_store: Arc<dyn ObjectStore>,
    share_base_url: String,

    // Runtime state
    worker_permits: Arc<Semaphore>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl CreationOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        job_store: Arc<dyn JobStore>,
        admission: Arc<AdmissionController>,
        pricing: PricingEngine,
        backend: Arc<dyn GenerationBackend>,
        payments: Arc<dyn PaymentProcessor>,
        object_store: Arc<dyn ObjectStore>,
        share_base_url: String,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let worker_permits = Arc::new(Semaphore::new(config.max_workers));

        Self {
            config,
            job_store,
            admission,
            pricing,
            backend,
            payments,
            object_store,
            share_base_url,
            worker_permits,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the orchestrator (spawns the watchdog and retention sweeps).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!(
            workers = self.config.max_workers,
            backend = self.backend.backend_name(),
            "Starting creation orchestrator"
        );

        self.spawn_watchdog_loop();
        self.spawn_retention_loop();

        info!("Creation orchestrator started");
    }

    /// Stop the orchestrator gracefully.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping creation orchestrator");
        let _ = self.shutdown_tx.send(());

        // Give in-flight workers a moment; unfinished jobs are recovered by
        // the watchdog after restart.
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("Creation orchestrator stopped");
    }

    /// Get current orchestrator status.
    pub fn status(&self) -> OrchestratorStatus {
        let queued_count = self
            .job_store
            .count(&JobFilter::new().with_state("queued"))
            .unwrap_or(0) as usize;
        let processing_count = self
            .job_store
            .count(&JobFilter::new().with_state("processing"))
            .unwrap_or(0) as usize;

        OrchestratorStatus {
            running: self.running.load(Ordering::Relaxed),
            available_workers: self.worker_permits.available_permits(),
            max_workers: self.config.max_workers,
            queued_count,
            processing_count,
        }
    }

    /// Submit a creation request.
    ///
    /// Validation runs first and consumes nothing. Admission, pricing, and
    /// the charge happen in that order; only then is the job persisted and
    /// handed to the worker pool. Returns as soon as a worker slot is
    /// reserved, never waiting on generation itself.
    pub async fn submit(
        &self,
        path: &str,
        request: CreateRequest,
        client: &Identity,
    ) -> Result<CreationJob, SubmitError> {
        let input = request.validate().map_err(SubmitError::Validation)?;

        if !self.running.load(Ordering::Relaxed) {
            return Err(SubmitError::Unavailable);
        }

        // Idempotent replay: return the original job, consuming nothing.
        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self
                .job_store
                .find_by_idempotency_key(&client.user_id, key)?
            {
                debug!(job_id = %existing.id, key, "idempotent resubmission");
                return Ok(existing);
            }
        }

        self.admission.admit(path, client).await?;

        let quote = self.pricing.current_price(request.tier);
        self.payments.charge(&client.user_id, &quote).await?;

        let new_job = NewJob {
            owner: client.user_id.clone(),
            creation_type: request.creation_type,
            input,
            language: request.language.clone(),
            price_charged: quote,
            idempotency_key: request.idempotency_key.clone(),
        };

        let job = match self.job_store.create(new_job) {
            Ok(job) => job,
            Err(crate::job::JobStoreError::AlreadyExists(msg)) => {
                // Two identical idempotency keys raced on insert; the loser
                // returns the winner's job.
                if let Some(key) = request.idempotency_key.as_deref() {
                    if let Some(existing) = self
                        .job_store
                        .find_by_idempotency_key(&client.user_id, key)?
                    {
                        return Ok(existing);
                    }
                }
                return Err(crate::job::JobStoreError::AlreadyExists(msg).into());
            }
            Err(e) => return Err(e.into()),
        };

        JOBS_SUBMITTED.inc();
        info!(
            job_id = %job.id,
            owner = %job.owner,
            creation_type = job.creation_type.as_str(),
            price = job.price_charged.amount,
            surge = job.price_charged.surge_active,
            "job submitted"
        );

        // The only blocking point: a brief wait for a worker slot when the
        // pool is saturated.
        let permit = Arc::clone(&self.worker_permits)
            .acquire_owned()
            .await
            .map_err(|_| SubmitError::Unavailable)?;

        self.spawn_worker(job.clone(), permit);

        Ok(job)
    }

    /// Get a job snapshot, scoped to its owner.
    pub fn get_status(
        &self,
        job_id: &str,
        client: &Identity,
    ) -> Result<CreationJob, OrchestratorError> {
        match self.job_store.get(job_id)? {
            // Unknown ids and other users' jobs are both NotFound so the
            // endpoint does not leak which ids exist.
            Some(job) if job.owner == client.user_id => Ok(job),
            _ => Err(OrchestratorError::JobNotFound(job_id.to_string())),
        }
    }

    /// List the caller's jobs, newest first.
    pub fn list_jobs(
        &self,
        client: &Identity,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CreationJob>, i64), OrchestratorError> {
        let filter = JobFilter::new()
            .with_owner(&client.user_id)
            .with_limit(limit)
            .with_offset(offset);
        let jobs = self.job_store.list(&filter)?;
        let total = self.job_store.count(
            &JobFilter::new().with_owner(&client.user_id).with_limit(i64::MAX),
        )?;
        Ok((jobs, total))
    }

    fn spawn_worker(&self, job: CreationJob, permit: OwnedSemaphorePermit) {
        let job_store = Arc::clone(&self.job_store);
        let backend = Arc::clone(&self.backend);
        let object_store = Arc::clone(&self.object_store);
        let share_base_url = self.share_base_url.clone();

        tokio::spawn(async move {
            let _permit = permit;
            Self::run_job(job_store, backend, object_store, share_base_url, job).await;
        });
    }

    /// Execute one job to a terminal state.
    async fn run_job(
        job_store: Arc<dyn JobStore>,
        backend: Arc<dyn GenerationBackend>,
        object_store: Arc<dyn ObjectStore>,
        share_base_url: String,
        job: CreationJob,
    ) {
        let started_at = Utc::now();
        let picked_up = Instant::now();

        let mut current = match job_store.compare_and_set(
            &job.id,
            job.version,
            JobState::Processing {
                started_at,
                attempt: 1,
            },
        ) {
            Ok(CasOutcome::Updated(job)) => job,
            Ok(CasOutcome::Conflict) => {
                CAS_CONFLICTS.with_label_values(&["worker"]).inc();
                debug!(job_id = %job.id, "job no longer queued, worker backing off");
                return;
            }
            Err(e) => {
                warn!(job_id = %job.id, "failed to pick up job: {}", e);
                return;
            }
        };
        JOB_STATE_TRANSITIONS
            .with_label_values(&["queued", "processing"])
            .inc();
        debug!(job_id = %current.id, "worker picked up job");

        let spec = JobSpec::from(&current);
        let mut attempt = 1u32;
        let generation = loop {
            let call_started = Instant::now();
            let result = backend.process(&spec).await;
            let elapsed = call_started.elapsed().as_secs_f64();

            match result {
                Ok(artifact) => {
                    BACKEND_DURATION
                        .with_label_values(&["success"])
                        .observe(elapsed);
                    break Ok(artifact);
                }
                Err(GenerationError::Transient(message)) if attempt == 1 => {
                    BACKEND_DURATION
                        .with_label_values(&["transient"])
                        .observe(elapsed);
                    GENERATION_RETRIES.inc();
                    warn!(
                        job_id = %current.id,
                        error = %message,
                        "transient backend failure, retrying once"
                    );

                    attempt = 2;
                    match job_store.compare_and_set(
                        &current.id,
                        current.version,
                        JobState::Processing {
                            started_at,
                            attempt,
                        },
                    ) {
                        Ok(CasOutcome::Updated(job)) => current = job,
                        Ok(CasOutcome::Conflict) => {
                            // The watchdog finalized the job while the first
                            // attempt was in flight; the retry is moot.
                            CAS_CONFLICTS.with_label_values(&["worker"]).inc();
                            debug!(job_id = %current.id, "job finalized elsewhere, dropping retry");
                            return;
                        }
                        Err(e) => {
                            warn!(job_id = %current.id, "failed to record retry: {}", e);
                            return;
                        }
                    }
                }
                Err(GenerationError::Transient(message)) => {
                    BACKEND_DURATION
                        .with_label_values(&["transient"])
                        .observe(elapsed);
                    break Err((
                        FailureReason::Backend,
                        format!("retry exhausted: {}", message),
                    ));
                }
                Err(GenerationError::Rejected(message)) => {
                    BACKEND_DURATION
                        .with_label_values(&["rejected"])
                        .observe(elapsed);
                    break Err((FailureReason::Backend, message));
                }
            }
        };

        let final_state = match generation {
            Ok(artifact) => {
                let key = format!("creations/{}/{}", current.id, artifact.suggested_name());
                match object_store
                    .store(&key, &artifact.content_type, &artifact.data)
                    .await
                {
                    Ok(result_reference) => JobState::Completed {
                        completed_at: Utc::now(),
                        result_reference,
                        share_links: ShareLink::links_for(&share_base_url, &current.id),
                    },
                    Err(e) => JobState::Failed {
                        reason: FailureReason::Storage,
                        message: e.to_string(),
                        failed_at: Utc::now(),
                    },
                }
            }
            Err((reason, message)) => JobState::Failed {
                reason,
                message,
                failed_at: Utc::now(),
            },
        };

        match job_store.compare_and_set(&current.id, current.version, final_state) {
            Ok(CasOutcome::Updated(finalized)) => {
                JOB_STATE_TRANSITIONS
                    .with_label_values(&["processing", finalized.state.state_type()])
                    .inc();
                let elapsed = picked_up.elapsed().as_secs_f64();
                match &finalized.state {
                    JobState::Completed {
                        result_reference, ..
                    } => {
                        JOBS_COMPLETED.inc();
                        JOB_PROCESSING_DURATION
                            .with_label_values(&["completed"])
                            .observe(elapsed);
                        info!(
                            job_id = %finalized.id,
                            result = %result_reference,
                            "job completed"
                        );
                    }
                    JobState::Failed {
                        reason, message, ..
                    } => {
                        JOBS_FAILED.with_label_values(&[reason.as_str()]).inc();
                        JOB_PROCESSING_DURATION
                            .with_label_values(&["failed"])
                            .observe(elapsed);
                        warn!(
                            job_id = %finalized.id,
                            reason = reason.as_str(),
                            error = %message,
                            "job failed"
                        );
                    }
                    _ => {}
                }
            }
            Ok(CasOutcome::Conflict) => {
                // The watchdog won the terminal race; its verdict stands.
                CAS_CONFLICTS.with_label_values(&["worker"]).inc();
                debug!(job_id = %current.id, "terminal write lost the version race, discarded");
            }
            Err(e) => {
                warn!(job_id = %current.id, "failed to finalize job: {}", e);
            }
        }
    }

    /// Spawn the watchdog loop.
    fn spawn_watchdog_loop(&self) {
        let running = Arc::clone(&self.running);
        let job_store = Arc::clone(&self.job_store);
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Watchdog loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Watchdog loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(config.watchdog_interval_ms)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = Self::sweep_timeouts(&job_store, &config) {
                            warn!("Watchdog sweep error: {}", e);
                        }
                    }
                }
            }
            info!("Watchdog loop stopped");
        });
    }

    /// Force jobs stuck in Processing past the deadline to Failed.
    fn sweep_timeouts(
        job_store: &Arc<dyn JobStore>,
        config: &OrchestratorConfig,
    ) -> Result<(), OrchestratorError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(config.max_processing_secs as i64);
        let filter = JobFilter::new()
            .with_state("processing")
            .with_started_before(cutoff)
            .with_limit(100);

        for job in job_store.list(&filter)? {
            let message = format!("processing exceeded {}s", config.max_processing_secs);
            match job_store.compare_and_set(
                &job.id,
                job.version,
                JobState::Failed {
                    reason: FailureReason::Timeout,
                    message,
                    failed_at: Utc::now(),
                },
            ) {
                Ok(CasOutcome::Updated(_)) => {
                    WATCHDOG_TIMEOUTS.inc();
                    JOBS_FAILED.with_label_values(&["timeout"]).inc();
                    JOB_STATE_TRANSITIONS
                        .with_label_values(&["processing", "failed"])
                        .inc();
                    warn!(job_id = %job.id, "watchdog timed out job");
                }
                Ok(CasOutcome::Conflict) => {
                    // A late worker write got there first; keep its result.
                    CAS_CONFLICTS.with_label_values(&["watchdog"]).inc();
                    debug!(job_id = %job.id, "watchdog lost the version race, discarded");
                }
                Err(e) => {
                    warn!(job_id = %job.id, "watchdog failed to update job: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Spawn the terminal-job retention sweep.
    fn spawn_retention_loop(&self) {
        let running = Arc::clone(&self.running);
        let job_store = Arc::clone(&self.job_store);
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Retention sweep started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Retention sweep received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(config.retention_interval_ms)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        let cutoff =
                            Utc::now() - chrono::Duration::seconds(config.retention_secs as i64);
                        match job_store.evict_terminal_before(cutoff) {
                            Ok(0) => {}
                            Ok(evicted) => {
                                JOBS_EVICTED.inc_by(evicted as u64);
                                debug!(evicted, "evicted terminal jobs past retention");
                            }
                            Err(e) => warn!("Retention sweep error: {}", e),
                        }
                    }
                }
            }
            info!("Retention sweep stopped");
        });
    }
}
