//! Background execution of a single job.
//!
//! A worker drives the inference stream outside the job lock and takes the
//! lock at checkpoints: before each segment is recorded, and for the final
//! stretch that writes artifacts and completes the job. Cancellation and the
//! duration budget are observed there.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::MurmurError;
use crate::events::JobEventBroadcaster;
use crate::formatter::{self, OutputFormat, Transcript};
use crate::inference::InferenceAdapter;
use crate::job::{FailureDetail, FailureKind, Job, JobStatus};
use crate::progress::ProgressTracker;
use crate::storage::{ArtifactStore, SourceStorage};
use crate::store::JobStore;

use super::control::{JobControl, JobControls};

/// Everything a worker needs, shared between the orchestrator and its pool.
pub(crate) struct Shared {
    pub store: Arc<dyn JobStore>,
    pub sources: Arc<dyn SourceStorage>,
    pub artifacts: ArtifactStore,
    pub inference: Arc<dyn InferenceAdapter>,
    pub events: JobEventBroadcaster,
    pub controls: JobControls,
    pub max_job_duration: Option<Duration>,
    pub retain_source: bool,
}

/// Why a run stopped before producing output.
enum Halt {
    Cancelled,
    Failed(FailureDetail),
}

impl From<MurmurError> for Halt {
    fn from(err: MurmurError) -> Self {
        let kind = match &err {
            MurmurError::InferenceFailure(_) => FailureKind::InferenceFailure,
            MurmurError::Timeout(_) => FailureKind::Timeout,
            MurmurError::Format(_) => FailureKind::FormatError,
            _ => FailureKind::StorageFailure,
        };
        Halt::Failed(FailureDetail::new(kind, err.to_string()))
    }
}

/// Runs one queued job to a terminal state. Jobs that are no longer queued
/// (cancelled or deleted while waiting) are skipped.
pub(crate) fn process_job(shared: &Shared, job_id: &str) {
    let control = shared.controls.acquire(job_id);

    let Some(mut job) = begin(shared, &control, job_id) else {
        return;
    };

    let span = tracing::info_span!(
        "job.run",
        job_id = %job.id,
        model = %job.parameters.model,
        task = %job.parameters.task,
    );
    let _entered = span.enter();

    let started = Instant::now();
    let deadline = shared.max_job_duration.map(|budget| started + budget);

    let halt = transcribe(shared, &control, &mut job, started, deadline)
        .and_then(|()| finish(shared, &control, &mut job, deadline))
        .err();

    match halt {
        None => {
            log::info!(
                "Job {} completed in {:.1}s ({} segments)",
                job.id,
                started.elapsed().as_secs_f64(),
                job.segments.len()
            );
            if !shared.retain_source {
                if let Err(e) = shared.sources.delete(&job.source) {
                    log::warn!("Failed to delete source of job {}: {}", job.id, e);
                }
            }
        }
        Some(Halt::Cancelled) => {
            log::info!("Job {} stopped after cancellation", job.id);
            discard_artifacts(shared, &job.id);
        }
        Some(Halt::Failed(detail)) => fail(shared, &control, &mut job, detail),
    }
}

/// Moves the job from `queued` to `processing`. Store errors are retried
/// once; a job that still cannot be started is failed rather than left
/// queued with nobody to run it.
fn begin(shared: &Shared, control: &JobControl, job_id: &str) -> Option<Job> {
    let _guard = control.lock();

    let loaded = shared.store.get(job_id).or_else(|e| {
        log::warn!("Failed to load job {}, retrying: {}", job_id, e);
        shared.store.get(job_id)
    });
    let mut job = match loaded {
        Ok(Some(job)) => job,
        Ok(None) => {
            log::debug!("Job {} was deleted before it started", job_id);
            return None;
        }
        Err(e) => {
            log::error!("Failed to load job {}, it stays queued until restart: {}", job_id, e);
            return None;
        }
    };

    if job.status != JobStatus::Queued || control.is_cancelled() {
        log::debug!("Skipping job {} in state {}", job_id, job.status);
        return None;
    }

    if let Err(e) = job.transition(JobStatus::Processing) {
        log::error!("{}", e);
        return None;
    }
    let started = shared.store.update(&job).or_else(|e| {
        log::warn!("Failed to mark job {} as processing, retrying: {}", job_id, e);
        shared.store.update(&job)
    });
    if let Err(e) = started {
        let detail = FailureDetail::new(
            FailureKind::StorageFailure,
            format!("failed to start job: {}", e),
        );
        record_failure(shared, &mut job, detail);
        return None;
    }
    shared.events.job_updated(&job, "Transcription started");
    Some(job)
}

/// Checked under the job lock at every checkpoint.
fn checkpoint(control: &JobControl, job: &Job, deadline: Option<Instant>) -> Result<(), Halt> {
    if control.is_cancelled() {
        return Err(Halt::Cancelled);
    }
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Err(MurmurError::Timeout(job.id.clone()).into());
    }
    Ok(())
}

/// Consumes the adapter's segment stream, persisting each segment.
fn transcribe(
    shared: &Shared,
    control: &JobControl,
    job: &mut Job,
    started: Instant,
    deadline: Option<Instant>,
) -> Result<(), Halt> {
    let local_path = shared.sources.local_path(&job.source);
    let transcription = shared
        .inference
        .transcribe(&job.source, local_path.as_deref(), &job.parameters)
        .map_err(MurmurError::from)?;

    log::debug!(
        "Job {}: media duration {:?}, language {:?}",
        job.id,
        transcription.duration,
        transcription.language
    );
    job.duration = transcription.duration;
    if transcription.language.is_some() {
        job.language = transcription.language;
    }

    let mut tracker = ProgressTracker::new(job.duration);
    for item in transcription.segments {
        let segment = item.map_err(MurmurError::from)?;

        let _guard = control.lock();
        checkpoint(control, job, deadline)?;

        let progress = tracker.observe(segment.end);
        job.push_segment(segment, progress, tracker.info(started.elapsed()));
        shared.store.update(job).map_err(MurmurError::from)?;
        shared.events.job_updated(
            job,
            format!("Transcribed {} segments", job.segments.len()),
        );
    }
    Ok(())
}

/// Writes the artifacts and completes the job in one critical section, so a
/// cancel or delete either happens before any artifact exists or finds the
/// job already completed.
fn finish(
    shared: &Shared,
    control: &JobControl,
    job: &mut Job,
    deadline: Option<Instant>,
) -> Result<(), Halt> {
    let _guard = control.lock();
    checkpoint(control, job, deadline)?;
    let paths = materialize(shared, job)?;
    complete(shared, job, paths)
}

/// Renders and writes every requested format. Nothing is left on disk if any
/// format fails.
fn materialize(shared: &Shared, job: &Job) -> Result<BTreeMap<OutputFormat, PathBuf>, Halt> {
    let span = tracing::info_span!("job.materialize", job_id = %job.id);
    let _entered = span.enter();

    let transcript = Transcript::new(&job.segments)
        .with_language(job.language.as_deref())
        .with_duration(job.duration);

    let mut paths = BTreeMap::new();
    for &format in &job.parameters.output_formats {
        let written = formatter::format(&transcript, format)
            .map_err(MurmurError::from)
            .and_then(|content| {
                shared
                    .artifacts
                    .write(&job.id, format, content.as_bytes())
                    .map_err(MurmurError::from)
            });
        match written {
            Ok(path) => {
                log::debug!("Job {}: wrote {}", job.id, path.display());
                paths.insert(format, path);
            }
            Err(e) => {
                discard_artifacts(shared, &job.id);
                return Err(e.into());
            }
        }
    }
    Ok(paths)
}

/// Records the artifacts and moves the job to `completed`.
fn complete(
    shared: &Shared,
    job: &mut Job,
    paths: BTreeMap<OutputFormat, PathBuf>,
) -> Result<(), Halt> {
    let mut done = job.clone();
    done.output_paths = paths;
    done.transition(JobStatus::Completed)
        .map_err(|e| Halt::Failed(FailureDetail::new(FailureKind::StorageFailure, e.to_string())))?;
    if let Err(e) = shared.store.update(&done) {
        discard_artifacts(shared, &job.id);
        return Err(MurmurError::from(e).into());
    }

    *job = done;
    shared.events.job_updated(job, "Transcription completed");
    Ok(())
}

fn fail(shared: &Shared, control: &JobControl, job: &mut Job, detail: FailureDetail) {
    let _guard = control.lock();
    discard_artifacts(shared, &job.id);
    if control.is_cancelled() {
        return;
    }
    record_failure(shared, job, detail);
}

/// Persists the failure. The caller holds the job lock.
fn record_failure(shared: &Shared, job: &mut Job, detail: FailureDetail) {
    log::error!("Job {} failed: {}", job.id, detail);
    if let Err(e) = job.fail(detail) {
        log::error!("{}", e);
        return;
    }
    match shared.store.update(job) {
        Ok(()) => shared.events.job_updated(job, "Transcription failed"),
        Err(e) => log::error!("Failed to record failure of job {}: {}", job.id, e),
    }
}

fn discard_artifacts(shared: &Shared, job_id: &str) {
    if let Err(e) = shared.artifacts.remove_all(job_id) {
        log::warn!("Failed to remove artifacts of job {}: {}", job_id, e);
    }
}
