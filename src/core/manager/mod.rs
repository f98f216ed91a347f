//! Reconciliation of the desired job set against what this process has
//! already started.

mod registry;
mod worker;


pub use registry::{JobMetadata, JobRegistry, SharedJobRegistry};
pub use worker::JobWorker;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::core::compiler::CompileContext;
use crate::core::gateway::StatementExecutor;
use crate::core::jobs::{JobConfig, JobKind, JobSource};
use crate::core::lifecycle::{LifecycleComponent, LifecycleManager};
use crate::core::remote::RemoteError;

#[derive(Debug, Clone, Default)]
pub struct ManagerSettings {
    pub kafka_group_id: String,
    pub failed_job_retention_passes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub pass: u64,
    pub started: usize,
    pub failed: usize,
    pub already_running: usize,
    pub evicted: usize,
    pub fetch_errors: usize,
}

/// Wall clock used to stamp compiled jobs.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

#[derive(Clone)]
pub struct JobManager {
    source: Arc<dyn JobSource>,
    executor: Arc<dyn StatementExecutor>,
    registry: SharedJobRegistry,
    settings: ManagerSettings,
    clock: Clock,
    passes: Arc<AtomicU64>,
    in_flight: Arc<Mutex<()>>,
}

impl JobManager {
    pub fn new(
        source: Arc<dyn JobSource>,
        executor: Arc<dyn StatementExecutor>,
        registry: SharedJobRegistry,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            source,
            executor,
            registry,
            settings,
            clock: Arc::new(|| Local::now().naive_local()),
            passes: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> SharedJobRegistry {
        Arc::clone(&self.registry)
    }

    /// Runs one reconciliation pass. Returns `None` when a previous pass is
    /// still in progress.
    pub async fn reconcile_once(&self) -> Option<PassSummary> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("Previous reconciliation pass still running, skipping this tick");
            return None;
        };
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let mut summary = PassSummary {
            pass,
            ..PassSummary::default()
        };
        info!("Reconciliation pass {} started", pass);

        // Behavior jobs go first, each kind in the order the source lists it.
        let mut desired: Vec<JobConfig> = Vec::new();
        match self.source.behavior_jobs().await {
            Ok(jobs) => desired.extend(jobs.into_iter().map(JobConfig::Behavior)),
            Err(e) => self.fetch_failed(JobKind::Behavior, &e, pass, &mut summary).await,
        }
        match self.source.rule_jobs().await {
            Ok(jobs) => desired.extend(jobs.into_iter().map(JobConfig::Rule)),
            Err(e) => self.fetch_failed(JobKind::Rule, &e, pass, &mut summary).await,
        }

        let mut seen: HashSet<String> = HashSet::new();
        for job in desired {
            let worker = JobWorker::new(job);
            seen.insert(worker.id().to_string());
            {
                let mut registry = self.registry.lock().await;
                if registry.is_running(worker.id()) {
                    registry.touch(worker.id(), pass);
                    summary.already_running += 1;
                    continue;
                }
                if let Some(previous) = registry.clear_failed(worker.id()) {
                    info!(
                        "Retrying job {} (last attempt at {} failed)",
                        worker.id(),
                        previous.attempted_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            self.start_job(&worker, pass, &mut summary).await;
        }

        let mut registry = self.registry.lock().await;
        for id in registry.unseen_running(pass) {
            warn!(
                "Job {} is still running but no longer listed by the job source",
                id
            );
        }
        let evicted = registry.evict_failed(pass, self.settings.failed_job_retention_passes);
        for id in &evicted {
            info!("Dropped failed job {} after it left the desired state", id);
        }
        summary.evicted = evicted.len();

        info!(
            "Reconciliation pass {} done: {} desired, {} started, {} failed, {} already running, \
             {} evicted, {} fetch error(s)",
            summary.pass,
            seen.len(),
            summary.started,
            summary.failed,
            summary.already_running,
            summary.evicted,
            summary.fetch_errors
        );
        Some(summary)
    }

    async fn start_job(
        &self,
        worker: &JobWorker,
        pass: u64,
        summary: &mut PassSummary,
    ) {
        let attempted_at = Utc::now();
        // Each job is stamped when it is compiled, not when the pass began.
        let ctx = CompileContext {
            kafka_group_id: self.settings.kafka_group_id.clone(),
            compiled_at: (self.clock)(),
        };
        let outcome = worker.run(&ctx, self.executor.as_ref()).await;

        let mut registry = self.registry.lock().await;
        match outcome {
            Ok(compiled) => {
                info!(
                    "Job {} is running as {} (flink job {})",
                    worker.id(),
                    compiled.pipeline_name,
                    compiled.flink_job_id.as_deref().unwrap_or("unknown")
                );
                registry.record_running(JobMetadata::running(
                    worker.id(),
                    worker.kind(),
                    compiled.flink_job_id,
                    attempted_at,
                    pass,
                ));
                summary.started += 1;
            }
            Err(e) => {
                error!("Job {} failed to start: {}", worker.id(), e);
                registry.record_failed(JobMetadata::failed(
                    worker.id(),
                    worker.kind(),
                    e.to_string(),
                    attempted_at,
                    pass,
                ));
                summary.failed += 1;
            }
        }
    }

    async fn fetch_failed(
        &self,
        kind: JobKind,
        err: &RemoteError,
        pass: u64,
        summary: &mut PassSummary,
    ) {
        error!("Failed to fetch {} jobs: {}", kind.as_str(), err);
        summary.fetch_errors += 1;
        // Nothing is known about this kind this pass, so keep its entries fresh.
        self.registry.lock().await.touch_kind(kind, pass);
    }
}

#[async_trait::async_trait]
impl LifecycleComponent for JobManager {
    async fn on_start(&mut self) -> Result<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            manager.reconcile_once().await;
        });
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        self.executor.close().await?;
        Ok(())
    }
}

/// Registers `manager` with the lifecycle: one pass when the lifecycle
/// starts, then one every `interval`.
pub async fn attach_reconciler(
    lifecycle: &mut LifecycleManager,
    manager: JobManager,
    interval: Duration,
) -> Result<()> {
    lifecycle.attach(Arc::new(Mutex::new(manager.clone())));

    let job = tokio_cron_scheduler::Job::new_repeated_async(interval, move |_uuid, mut _l| {
        let manager = manager.clone();
        Box::pin(async move {
            manager.reconcile_once().await;
        })
    })?;
    lifecycle.scheduler.add(job).await?;
    info!("Reconciliation scheduled every {}s", interval.as_secs());
    Ok(())
}
