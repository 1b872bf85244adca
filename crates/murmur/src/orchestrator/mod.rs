//! Transcription job orchestrator.
//!
//! Owns the job lifecycle: accepts submissions, runs them on a bounded
//! worker pool, records progress in the [`JobStore`] and answers status,
//! listing, download, cancel and delete requests from the latest persisted
//! snapshot.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::{validate_config, ServiceConfig};
use crate::db::Database;
use crate::error::{MurmurError, Result};
use crate::events::{JobEvent, JobEventBroadcaster, DEFAULT_EVENT_CAPACITY};
use crate::formatter::OutputFormat;
use crate::inference::InferenceAdapter;
use crate::job::{FailureDetail, FailureKind, Job, JobStatus, TranscriptionParams};
use crate::storage::{Artifact, ArtifactStore, FileSourceStorage, SourceRef, SourceStorage};
use crate::store::{
    JobPage, JobPageRequest, JobStore, MemoryJobStore, SqliteJobStore, StoreError,
    DEFAULT_PAGE_SIZE,
};

mod control;
mod listing;
mod pool;
mod runner;

pub use listing::JobListing;

use control::JobControls;
use pool::WorkerPool;
use runner::Shared;

/// Attempts at drawing an unused job id before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

/// Runtime settings of an [`Orchestrator`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Where output artifacts are written.
    pub transcript_directory: PathBuf,
    /// Number of jobs that may run at once.
    pub max_concurrent_jobs: usize,
    /// Budget after which a running job fails with a timeout.
    pub max_job_duration: Option<Duration>,
    /// Keep the uploaded audio once a job completes.
    pub retain_source_after_completion: bool,
    pub event_capacity: usize,
}

impl OrchestratorOptions {
    pub fn new<P: Into<PathBuf>>(transcript_directory: P) -> Self {
        Self {
            transcript_directory: transcript_directory.into(),
            max_concurrent_jobs: 1,
            max_job_duration: None,
            retain_source_after_completion: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&ServiceConfig> for OrchestratorOptions {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            transcript_directory: config.transcript_path(),
            max_concurrent_jobs: config.workers.max_concurrent_jobs,
            max_job_duration: config.workers.max_job_duration(),
            retain_source_after_completion: config.retain_source_after_completion,
            event_capacity: config.events.capacity,
        }
    }
}

pub struct Orchestrator {
    shared: Arc<Shared>,
    pool: Mutex<Option<WorkerPool>>,
}

impl Orchestrator {
    /// Starts the worker pool and recovers unfinished jobs left by a previous
    /// run: queued jobs are queued again in creation order, jobs that were
    /// processing are failed as interrupted.
    pub fn start(
        store: Arc<dyn JobStore>,
        sources: Arc<dyn SourceStorage>,
        inference: Arc<dyn InferenceAdapter>,
        options: OrchestratorOptions,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            store,
            sources,
            artifacts: ArtifactStore::new(&options.transcript_directory),
            inference,
            events: JobEventBroadcaster::new(options.event_capacity),
            controls: JobControls::new(),
            max_job_duration: options.max_job_duration,
            retain_source: options.retain_source_after_completion,
        });

        let pool = WorkerPool::new(Arc::clone(&shared), options.max_concurrent_jobs);
        let orchestrator = Self {
            shared,
            pool: Mutex::new(Some(pool)),
        };
        orchestrator.recover()?;

        log::info!(
            "Orchestrator started with {} workers, transcripts in {}",
            options.max_concurrent_jobs,
            options.transcript_directory.display()
        );
        Ok(orchestrator)
    }

    /// Builds the store and storage described by `config` and starts.
    pub fn from_config(config: &ServiceConfig, inference: Arc<dyn InferenceAdapter>) -> Result<Self> {
        validate_config(config)?;

        let store: Arc<dyn JobStore> = match config.database_path() {
            Some(path) => {
                let db = Database::open(&path)
                    .map_err(|e| MurmurError::StorageFailure(e.to_string()))?;
                Arc::new(SqliteJobStore::new(db))
            }
            None => {
                log::warn!("Using in-memory job store; jobs will not survive a restart");
                Arc::new(MemoryJobStore::new())
            }
        };
        let sources = Arc::new(FileSourceStorage::new(config.upload_path()));

        Self::start(store, sources, inference, OrchestratorOptions::from(config))
    }

    fn recover(&self) -> Result<()> {
        let unfinished = self.shared.store.list_unfinished()?;
        if unfinished.is_empty() {
            return Ok(());
        }

        let mut requeued = 0;
        for mut job in unfinished {
            match job.status {
                JobStatus::Queued => {
                    self.enqueue(job.id)?;
                    requeued += 1;
                }
                JobStatus::Processing => {
                    log::warn!("Job {} was interrupted by a restart", job.id);
                    job.fail(FailureDetail::new(
                        FailureKind::Interrupted,
                        "processing was interrupted by a service restart",
                    ))?;
                    self.shared.store.update(&job)?;
                    self.shared.artifacts.remove_all(&job.id)?;
                    self.shared.events.job_updated(&job, "Job interrupted");
                }
                _ => {}
            }
        }
        log::info!("Recovered {} queued jobs", requeued);
        Ok(())
    }

    fn pool(&self) -> MutexGuard<'_, Option<WorkerPool>> {
        match self.pool.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Worker pool lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn enqueue(&self, job_id: String) -> Result<()> {
        match self.pool().as_ref() {
            Some(pool) => pool.submit(job_id),
            None => Err(MurmurError::ShuttingDown),
        }
    }

    /// Validates `parameters`, records a queued job for an already stored
    /// source and schedules it. Returns without waiting for inference.
    pub fn submit(
        &self,
        source: SourceRef,
        filename: &str,
        filesize: u64,
        parameters: TranscriptionParams,
    ) -> Result<String> {
        let parameters = parameters.validate()?;

        // Held until the job is queued so shutdown cannot slip in between.
        let pool = self.pool();
        let pool = pool.as_ref().ok_or(MurmurError::ShuttingDown)?;

        let mut job = Job::new(String::new(), source, filename, filesize, parameters);
        let mut attempts = 0;
        job.seq = loop {
            attempts += 1;
            job.id = Uuid::new_v4().to_string();
            match self.shared.store.insert(&job) {
                Ok(seq) => break seq,
                Err(StoreError::DuplicateId(id)) if attempts < MAX_ID_ATTEMPTS => {
                    log::warn!("Job id {} already issued, drawing another", id);
                }
                Err(e) => return Err(e.into()),
            }
        };

        // Announced before a worker can pick it up.
        self.shared.events.job_updated(&job, "Job queued");
        pool.submit(job.id.clone())?;
        log::info!(
            "Queued job {} ({}, model {}, formats {:?})",
            job.id,
            job.filename,
            job.parameters.model,
            job.parameters.output_formats
        );
        Ok(job.id)
    }

    /// Stores uploaded bytes and submits them. Invalid parameters are
    /// rejected before anything is stored.
    pub fn submit_upload(
        &self,
        content: &[u8],
        filename: &str,
        parameters: TranscriptionParams,
    ) -> Result<String> {
        let parameters = parameters.validate()?;
        let source = self.shared.sources.store(content, filename)?;

        match self.submit(source.clone(), filename, content.len() as u64, parameters) {
            Ok(id) => Ok(id),
            Err(e) => {
                if let Err(cleanup) = self.shared.sources.delete(&source) {
                    log::warn!("Failed to remove rejected upload {}: {}", source, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Returns a snapshot of the job.
    pub fn status(&self, job_id: &str) -> Result<Job> {
        self.shared
            .store
            .get(job_id)?
            .ok_or_else(|| MurmurError::NotFound(job_id.to_string()))
    }

    /// All jobs, newest first, fetched lazily page by page.
    pub fn list(&self) -> JobListing {
        JobListing::new(Arc::clone(&self.shared.store), DEFAULT_PAGE_SIZE)
    }

    pub fn list_page(&self, request: &JobPageRequest) -> Result<JobPage> {
        Ok(self.shared.store.list_page(request)?)
    }

    /// Returns the artifact of a completed job in one of its requested
    /// formats.
    pub fn download(&self, job_id: &str, format: OutputFormat) -> Result<Artifact> {
        let job = self.status(job_id)?;

        if job.status != JobStatus::Completed {
            return Err(MurmurError::NotReady {
                job_id: job.id,
                status: job.status.to_string(),
            });
        }
        if !job.parameters.requests(format) {
            return Err(MurmurError::UnsupportedFormat {
                job_id: job.id,
                format,
            });
        }

        let path = job.output_paths.get(&format).ok_or_else(|| {
            MurmurError::StorageFailure(format!("job {} has no {} artifact", job.id, format))
        })?;
        if !path.is_file() {
            return Err(MurmurError::StorageFailure(format!(
                "artifact {} is missing",
                path.display()
            )));
        }
        Ok(Artifact::new(&job.id, format, path.clone(), &job.filename))
    }

    /// Cancels a queued or processing job. A running job stops at its next
    /// segment boundary; its partial artifacts are removed.
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let control = self.shared.controls.acquire(job_id);
        let _guard = control.lock();

        let mut job = self.status(job_id)?;
        job.transition(JobStatus::Cancelled)?;
        control.cancel();
        self.shared.store.update(&job)?;
        self.shared.artifacts.remove_all(job_id)?;

        log::info!("Cancelled job {}", job_id);
        self.shared.events.job_updated(&job, "Job cancelled");
        Ok(())
    }

    /// Removes a job in any state together with its artifacts and source.
    /// A running job is cancelled first.
    pub fn delete(&self, job_id: &str) -> Result<()> {
        let control = self.shared.controls.acquire(job_id);
        let _guard = control.lock();

        let mut job = self.status(job_id)?;
        if !job.is_terminal() {
            control.cancel();
            job.transition(JobStatus::Cancelled)?;
        }

        self.shared.artifacts.remove_all(job_id)?;
        if !self.shared.store.delete(job_id)? {
            return Err(MurmurError::NotFound(job_id.to_string()));
        }
        if let Err(e) = self.shared.sources.delete(&job.source) {
            log::warn!("Failed to delete source of job {}: {}", job_id, e);
        }

        log::info!("Deleted job {}", job_id);
        self.shared.events.job_updated(&job, "Job deleted");
        Ok(())
    }

    /// Receives an event after every persisted job update.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    /// Number of submitted jobs waiting for a worker.
    pub fn queued_jobs(&self) -> usize {
        self.pool().as_ref().map(WorkerPool::queued).unwrap_or(0)
    }

    /// Stops accepting submissions and waits for running jobs to finish.
    /// Jobs still queued stay queued and resume on the next start.
    pub fn shutdown(&self) {
        let pool = self.pool().take();
        if let Some(pool) = pool {
            pool.shutdown();
            pool.wait();
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Signal only; joining here could block on a long transcription.
        if let Some(pool) = self.pool().as_ref() {
            pool.shutdown();
        }
    }
}
