//! Isolated orchestrator for integration tests.
//!
//! Each harness owns a temporary data directory with `uploads/` and
//! `transcripts/`, a fake inference adapter and a running orchestrator.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use murmur::{
    FileSourceStorage, Job, JobStore, MemoryJobStore, Orchestrator, OrchestratorOptions,
    OutputFormat, Result, SourceRef, SourceStorage, TranscriptionParams,
};

use super::fake::FakeAdapter;

const WAIT_TIMEOUT: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(10);

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub transcript_dir: PathBuf,
    pub adapter: Arc<FakeAdapter>,
    pub store: Arc<dyn JobStore>,
    pub sources: Arc<FileSourceStorage>,
    pub orchestrator: Orchestrator,
}

impl TestHarness {
    /// One worker, in-memory store.
    pub fn new() -> Self {
        Self::with_options(|_| {})
    }

    pub fn with_options(configure: impl FnOnce(&mut OrchestratorOptions)) -> Self {
        Self::with_store(Arc::new(MemoryJobStore::new()), configure)
    }

    pub fn with_store(
        store: Arc<dyn JobStore>,
        configure: impl FnOnce(&mut OrchestratorOptions),
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self::in_dir(temp_dir, store, Arc::new(FakeAdapter::new()), configure)
    }

    /// Starts an orchestrator over an existing directory and store, as after
    /// a restart.
    pub fn in_dir(
        temp_dir: TempDir,
        store: Arc<dyn JobStore>,
        adapter: Arc<FakeAdapter>,
        configure: impl FnOnce(&mut OrchestratorOptions),
    ) -> Self {
        let upload_dir = temp_dir.path().join("uploads");
        let transcript_dir = temp_dir.path().join("transcripts");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");

        let mut options = OrchestratorOptions::new(&transcript_dir);
        configure(&mut options);

        let sources = Arc::new(FileSourceStorage::new(&upload_dir));
        let orchestrator = Orchestrator::start(
            Arc::clone(&store),
            sources.clone(),
            adapter.clone(),
            options,
        )
        .expect("Failed to start orchestrator");

        Self {
            temp_dir,
            upload_dir,
            transcript_dir,
            adapter,
            store,
            sources,
            orchestrator,
        }
    }

    /// Stops the orchestrator and hands back the directory and store.
    pub fn into_parts(self) -> (TempDir, Arc<dyn JobStore>) {
        self.orchestrator.shutdown();
        (self.temp_dir, self.store)
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Stores `content` as an upload and returns its reference.
    pub fn upload(&self, filename: &str, content: &[u8]) -> SourceRef {
        self.sources
            .store(content, filename)
            .expect("Failed to store upload")
    }

    /// Uploads placeholder audio under `filename` and submits it.
    pub fn submit(&self, filename: &str, params: TranscriptionParams) -> Result<String> {
        self.orchestrator
            .submit_upload(b"RIFF....WAVE", filename, params)
    }

    /// Polls until `done` holds for the job, panicking after a timeout.
    pub fn wait_for(&self, job_id: &str, done: impl Fn(&Job) -> bool) -> Job {
        let started = Instant::now();
        loop {
            let job = self
                .orchestrator
                .status(job_id)
                .expect("job vanished while waiting");
            if done(&job) {
                return job;
            }
            assert!(
                started.elapsed() < WAIT_TIMEOUT,
                "timed out waiting for job {} (status {}, {} segments)",
                job_id,
                job.status,
                job.segments.len()
            );
            std::thread::sleep(POLL);
        }
    }

    pub fn wait_terminal(&self, job_id: &str) -> Job {
        self.wait_for(job_id, Job::is_terminal)
    }

    pub fn wait_segments(&self, job_id: &str, count: usize) -> Job {
        self.wait_for(job_id, |job| job.segments.len() >= count)
    }

    /// Files currently in the transcript directory, including partial ones.
    pub fn transcript_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.transcript_dir) {
            Ok(entries) => {
                let mut files: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
                files.sort();
                files
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn upload_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.upload_dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}

/// Default parameters requesting the given formats.
pub fn params(formats: &[OutputFormat]) -> TranscriptionParams {
    TranscriptionParams {
        output_formats: formats.to_vec(),
        ..TranscriptionParams::default()
    }
}
