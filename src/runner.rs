// src/runner.rs
//
// Migration orchestrator: lists the source once, filters checkpointed keys,
// fans copy tasks out under a counting semaphore, and publishes live
// progress. One job at a time; a reentrant start is a no-op.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::{FailurePolicy, TransferSettings};
use crate::constants::PROGRESS_SAMPLE_INTERVAL_MS;
use crate::endpoint::{
    normalize_prefix, relative_target_key, EndpointContext, EndpointResolver, Profile,
    StorageBackend,
};
use crate::error::TransferError;
use crate::job::{MigrationJob, ObjectDescriptor, TransferStats};
use crate::object_client::ObjectClient;
use crate::progress::JobProgress;
use crate::streamer::{CopyEngine, ObjectStreamer};

/// Terminal status for a successful run.
pub const STATUS_COMPLETE: &str = "Migration complete";
/// Terminal status when any object copy failed.
pub const STATUS_FAILED: &str = "Migration failed";
/// Fast-fail status when profile resolution fails.
pub const STATUS_MISSING_PROFILES: &str = "Missing source/target profiles";

/// Builds the listing backend for one endpoint. Listing and its response
/// parsing live outside this crate; the orchestrator only consumes the
/// trait.
pub trait StorageBackendFactory: Send + Sync {
    fn backend(&self, endpoint: &EndpointContext) -> Result<Arc<dyn StorageBackend>>;
}

/// Builds the copy engine for one (source, target) endpoint pair.
pub trait CopyEngineFactory: Send + Sync {
    fn engine(
        &self,
        source: &EndpointContext,
        target: &EndpointContext,
        chunk_size: usize,
    ) -> Result<Arc<dyn CopyEngine>>;
}

/// Production engine factory: raw-HTTP object clients feeding the streamer.
pub struct StreamerFactory;

impl CopyEngineFactory for StreamerFactory {
    fn engine(
        &self,
        source: &EndpointContext,
        target: &EndpointContext,
        chunk_size: usize,
    ) -> Result<Arc<dyn CopyEngine>> {
        let source = Arc::new(ObjectClient::new(Arc::new(source.clone()))?);
        let target = Arc::new(ObjectClient::new(Arc::new(target.clone()))?);
        Ok(Arc::new(ObjectStreamer::new(source, target, chunk_size)))
    }
}

pub struct MigrationRunner {
    settings: TransferSettings,
    checkpoint_dir: PathBuf,
    resolver: Arc<dyn EndpointResolver>,
    backends: Arc<dyn StorageBackendFactory>,
    engines: Arc<dyn CopyEngineFactory>,
    progress: Arc<JobProgress>,
    running: AtomicBool,
}

/// Clears the running flag when a job driver exits, however it exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl MigrationRunner {
    pub fn new(
        settings: TransferSettings,
        checkpoint_dir: PathBuf,
        resolver: Arc<dyn EndpointResolver>,
        backends: Arc<dyn StorageBackendFactory>,
        engines: Arc<dyn CopyEngineFactory>,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            checkpoint_dir,
            resolver,
            backends,
            engines,
            progress: Arc::new(JobProgress::new()),
            running: AtomicBool::new(false),
        })
    }

    /// Live progress fields for UI polling.
    pub fn progress(&self) -> Arc<JobProgress> {
        self.progress.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Launch the job driver in the background. A no-op while a job is
    /// already active.
    pub fn start(self: &Arc<Self>, job: MigrationJob, profiles: Vec<Profile>) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this.run_job(&job, &profiles).await {
                error!("migration job {} failed: {:#}", job.id, err);
            }
        });
    }

    /// The awaitable job driver. Returns the terminal outcome; all state is
    /// also published through `progress`.
    pub async fn run_job(&self, job: &MigrationJob, profiles: &[Profile]) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("start ignored: a job is already running");
            return Ok(());
        }
        let _guard = RunningGuard(&self.running);

        self.progress.reset(0);
        self.progress.set_status("Resolving profiles");

        let (source_ep, target_ep) = match self.resolve_endpoints(job, profiles) {
            Ok(pair) => pair,
            Err(err) => {
                self.progress.set_status(STATUS_MISSING_PROFILES);
                self.progress.record_error(format!("{:#}", err));
                return Err(err);
            }
        };

        let source_prefix = normalize_prefix(&job.source_prefix);
        let target_prefix = normalize_prefix(&job.target_prefix);

        self.progress.set_status("Listing source objects");
        let backend = self.backends.backend(&source_ep)?;
        let listed = backend
            .list(&source_prefix)
            .await
            .context("listing source objects")?;
        let objects: Vec<_> = listed
            .into_iter()
            .filter(|obj| !obj.is_folder_placeholder())
            .collect();

        self.progress.reset(objects.len() as u64);
        info!(
            "job {}: {} source object(s) under '{}' (concurrency {})",
            job.id,
            objects.len(),
            source_prefix,
            self.settings.effective_concurrency()
        );

        let checkpoints = Arc::new(CheckpointStore::open(
            &self.checkpoint_dir,
            &job.id,
            &job.source_profile,
        )?);

        let engine = self.engines.engine(
            &source_ep,
            &target_ep,
            self.settings.effective_chunk_size(),
        )?;

        // Snapshot ring for later charting; stopped when the job ends.
        let sampler = {
            let progress = self.progress.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(std::time::Duration::from_millis(
                    PROGRESS_SAMPLE_INTERVAL_MS,
                ));
                tick.tick().await; // immediate first tick is not a sample
                loop {
                    tick.tick().await;
                    progress.record_sample();
                }
            })
        };

        self.progress.set_status("Copying objects");
        let outcome = self
            .drive_copies(&objects, &source_prefix, &target_prefix, checkpoints, engine)
            .await;
        sampler.abort();

        match outcome {
            Ok(()) => {
                self.progress.set_status(STATUS_COMPLETE);
                info!("job {}: migration complete", job.id);
                Ok(())
            }
            Err(err) => {
                self.progress.set_status(STATUS_FAILED);
                error!("job {}: migration failed: {:#}", job.id, err);
                Err(err)
            }
        }
    }

    fn resolve_endpoints(
        &self,
        job: &MigrationJob,
        profiles: &[Profile],
    ) -> Result<(EndpointContext, EndpointContext)> {
        let find = |name: &str| -> Result<&Profile> {
            profiles
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| TransferError::Resolution(format!("no profile named '{}'", name)).into())
        };
        let source = self
            .resolver
            .resolve(find(&job.source_profile)?, &job.source_bucket)?;
        let target = self
            .resolver
            .resolve(find(&job.target_profile)?, &job.target_bucket)?;
        Ok((source, target))
    }

    async fn drive_copies(
        &self,
        objects: &[ObjectDescriptor],
        source_prefix: &str,
        target_prefix: &str,
        checkpoints: Arc<CheckpointStore>,
        engine: Arc<dyn CopyEngine>,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.settings.effective_concurrency()));
        let mut tasks: JoinSet<Result<(String, TransferStats)>> = JoinSet::new();

        for obj in objects {
            if checkpoints.is_completed(&obj.key).await {
                debug!("skipping checkpointed key {}", obj.key);
                continue;
            }

            let semaphore = semaphore.clone();
            let engine = engine.clone();
            let progress = self.progress.clone();
            let source_key = obj.key.clone();
            let target_key = relative_target_key(&obj.key, source_prefix, target_prefix);
            let content_type = obj.content_type.clone();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| anyhow!("semaphore closed"))?;
                debug!("copying {} -> {}", source_key, target_key);
                let on_chunk = move |delta: u64| progress.add_bytes(delta);
                let stats = engine
                    .copy_object(&source_key, &target_key, content_type.as_deref(), &on_chunk)
                    .await
                    .with_context(|| format!("copying object '{}'", source_key))?;
                Ok((source_key, stats))
            });
        }

        let mut first_error: Option<anyhow::Error> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((key, stats))) => {
                    self.progress.object_completed();
                    self.progress.add_requests(stats.request_count);
                    if let Err(err) = checkpoints.mark_completed(&key).await {
                        warn!("checkpoint append for '{}' failed: {:#}", key, err);
                        self.progress.record_error(format!("{:#}", err));
                        first_error.get_or_insert(err);
                    }
                }
                Ok(Err(err)) => {
                    self.progress.record_error(format!("{:#}", err));
                    if self.settings.failure_policy == FailurePolicy::StopOnFirstError {
                        // Structured fail-fast: cancel every sibling copy.
                        tasks.abort_all();
                    }
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        continue;
                    }
                    let err = anyhow!(join_err).context("copy task panicked");
                    self.progress.record_error(format!("{:#}", err));
                    if self.settings.failure_policy == FailurePolicy::StopOnFirstError {
                        tasks.abort_all();
                    }
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
