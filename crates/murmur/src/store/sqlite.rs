//! SQLite-backed job store.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::{JobPage, JobPageRequest, JobStore, StoreError};
use crate::db::job_repo::{self, JobRow, SegmentRow};
use crate::db::Database;
use crate::formatter::OutputFormat;
use crate::job::{FailureDetail, FailureKind, Job, JobStatus, Segment};
use crate::storage::SourceRef;

// ─── Row conversion ─────────────────────────────────────────────────────────

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_timestamp(s: &str, job_id: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("job {}: bad timestamp '{}': {}", job_id, s, e)))
}

fn to_json<T: serde::Serialize>(value: &T, job_id: &str) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|e| StoreError::Serialization(format!("job {}: {}", job_id, e)))
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str, job_id: &str) -> Result<T, StoreError> {
    serde_json::from_str(s).map_err(|e| StoreError::Serialization(format!("job {}: {}", job_id, e)))
}

fn job_to_row(job: &Job) -> Result<JobRow, StoreError> {
    let output_paths = if job.output_paths.is_empty() {
        None
    } else {
        Some(to_json(&job.output_paths, &job.id)?)
    };

    Ok(JobRow {
        seq: i64::try_from(job.seq).unwrap_or_default(),
        id: job.id.clone(),
        status: job.status.as_str().to_string(),
        source_ref: job.source.as_str().to_string(),
        filename: job.filename.clone(),
        filesize: i64::try_from(job.filesize).unwrap_or(i64::MAX),
        parameters: to_json(&job.parameters, &job.id)?,
        progress: job.progress,
        progress_info: Some(to_json(&job.progress_info, &job.id)?),
        duration: job.duration,
        language: job.language.clone(),
        output_paths,
        error_kind: job.error.as_ref().map(|e| e.kind.as_str().to_string()),
        error_message: job.error.as_ref().map(|e| e.message.clone()),
        created_at: format_timestamp(job.created_at),
        updated_at: format_timestamp(job.updated_at),
        started_at: job.started_at.map(format_timestamp),
        completed_at: job.completed_at.map(format_timestamp),
    })
}

fn segment_to_row(idx: usize, segment: &Segment, job_id: &str) -> Result<SegmentRow, StoreError> {
    let words = if segment.words.is_empty() {
        None
    } else {
        Some(to_json(&segment.words, job_id)?)
    };
    Ok(SegmentRow {
        idx: i64::try_from(idx).unwrap_or(i64::MAX),
        start_time: segment.start,
        end_time: segment.end,
        text: segment.text.clone(),
        words,
    })
}

fn row_to_job(row: JobRow, segments: Vec<SegmentRow>) -> Result<Job, StoreError> {
    let id = row.id;
    let status: JobStatus = row
        .status
        .parse()
        .map_err(|e| StoreError::Serialization(format!("job {}: {}", id, e)))?;

    let error = match row.error_kind {
        Some(kind) => {
            let kind: FailureKind = kind
                .parse()
                .map_err(|e| StoreError::Serialization(format!("job {}: {}", id, e)))?;
            Some(FailureDetail::new(kind, row.error_message.unwrap_or_default()))
        }
        None => None,
    };

    let output_paths: BTreeMap<OutputFormat, PathBuf> = match row.output_paths {
        Some(json) => from_json(&json, &id)?,
        None => BTreeMap::new(),
    };

    let segments = segments
        .into_iter()
        .map(|s| -> Result<Segment, StoreError> {
            let words = match s.words {
                Some(json) => from_json(&json, &id)?,
                None => Vec::new(),
            };
            Ok(Segment::new(s.start_time, s.end_time, s.text).with_words(words))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(Job {
        seq: u64::try_from(row.seq).unwrap_or_default(),
        status,
        created_at: parse_timestamp(&row.created_at, &id)?,
        updated_at: parse_timestamp(&row.updated_at, &id)?,
        started_at: row
            .started_at
            .as_deref()
            .map(|s| parse_timestamp(s, &id))
            .transpose()?,
        completed_at: row
            .completed_at
            .as_deref()
            .map(|s| parse_timestamp(s, &id))
            .transpose()?,
        source: SourceRef::new(row.source_ref),
        filename: row.filename,
        filesize: u64::try_from(row.filesize).unwrap_or_default(),
        parameters: from_json(&row.parameters, &id)?,
        progress: row.progress,
        progress_info: match row.progress_info {
            Some(json) => from_json(&json, &id)?,
            None => Default::default(),
        },
        duration: row.duration,
        language: row.language,
        segments,
        output_paths,
        error,
        id,
    })
}

// ─── SqliteJobStore ─────────────────────────────────────────────────────────

/// Job store persisted in SQLite through the shared [`Database`] handle.
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn load(&self, row: JobRow) -> Result<Job, StoreError> {
        let segments = job_repo::find_segments(&self.db, &row.id)?;
        row_to_job(row, segments)
    }
}

impl JobStore for SqliteJobStore {
    fn insert(&self, job: &Job) -> Result<u64, StoreError> {
        let row = job_to_row(job)?;
        let seq = job_repo::insert(&self.db, &row)?
            .ok_or_else(|| StoreError::DuplicateId(job.id.clone()))?;
        if !job.segments.is_empty() {
            let segments = job
                .segments
                .iter()
                .enumerate()
                .map(|(i, s)| segment_to_row(i, s, &job.id))
                .collect::<Result<Vec<_>, _>>()?;
            job_repo::update(&self.db, &row, &segments)?;
        }
        log::debug!("Persisted job {} with seq {}", job.id, seq);
        Ok(u64::try_from(seq).unwrap_or_default())
    }

    fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        match job_repo::find_by_id(&self.db, id)? {
            Some(row) => self.load(row).map(Some),
            None => Ok(None),
        }
    }

    fn update(&self, job: &Job) -> Result<(), StoreError> {
        let row = job_to_row(job)?;
        let stored = job_repo::count_segments(&self.db, &job.id)?;
        let fresh = job
            .segments
            .iter()
            .enumerate()
            .skip(stored)
            .map(|(i, s)| segment_to_row(i, s, &job.id))
            .collect::<Result<Vec<_>, _>>()?;

        if job_repo::update(&self.db, &row, &fresh)? {
            Ok(())
        } else {
            Err(StoreError::NotFound(job.id.clone()))
        }
    }

    fn list_page(&self, request: &JobPageRequest) -> Result<JobPage, StoreError> {
        let limit = request.effective_limit();
        let before = request.after.map(|seq| i64::try_from(seq).unwrap_or(i64::MAX));
        let probe_size = u32::try_from(limit + 1).unwrap_or(u32::MAX);

        let probe = job_repo::find_page(&self.db, before, probe_size)?
            .into_iter()
            .map(|row| -> Result<_, StoreError> {
                // Listings carry summaries only, so segments are not loaded.
                let job = row_to_job(row, Vec::new())?;
                Ok((job.seq, job.summary()))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(JobPage::from_probe(probe, limit))
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let deleted = job_repo::delete(&self.db, id, &format_timestamp(Utc::now()))?;
        if deleted {
            log::debug!("Deleted job {} from database", id);
        }
        Ok(deleted)
    }

    fn list_unfinished(&self) -> Result<Vec<Job>, StoreError> {
        job_repo::find_by_statuses(
            &self.db,
            &[JobStatus::Queued.as_str(), JobStatus::Processing.as_str()],
        )?
        .into_iter()
        .map(|row| self.load(row))
        .collect()
    }
}
