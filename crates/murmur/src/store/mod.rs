//! Durable job records.
//!
//! The orchestrator talks to a [`JobStore`]; [`MemoryJobStore`] backs tests
//! and ephemeral deployments, [`SqliteJobStore`] survives restarts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::{Job, JobSummary};

pub mod memory;
pub mod sqlite;

#[cfg(test)]
mod contract;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;

/// Default number of jobs per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a single request may ask for.
pub const MAX_PAGE_SIZE: usize = 500;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// The identifier belongs to a live job or to a deleted one.
    #[error("Job id already issued: {0}")]
    DuplicateId(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Corrupt job record: {0}")]
    Serialization(String),
}

/// Request for one page of the job listing, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPageRequest {
    /// Cursor returned as `next` by the previous page; `None` starts at the
    /// newest job.
    #[serde(default)]
    pub after: Option<u64>,
    #[serde(default = "default_page_size")]
    pub limit: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl JobPageRequest {
    pub fn first(limit: usize) -> Self {
        Self { after: None, limit }
    }

    pub fn after(cursor: u64, limit: usize) -> Self {
        Self {
            after: Some(cursor),
            limit,
        }
    }

    /// The limit clamped to `1..=MAX_PAGE_SIZE`.
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for JobPageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// One page of job summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPage {
    pub jobs: Vec<JobSummary>,
    /// Cursor for the following page, absent on the last one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
}

impl JobPage {
    /// Builds a page from up to `limit + 1` jobs ordered newest first. The
    /// extra job, if present, only signals that another page exists.
    pub(crate) fn from_probe(mut jobs: Vec<(u64, JobSummary)>, limit: usize) -> Self {
        let more = jobs.len() > limit;
        jobs.truncate(limit);
        let next = if more {
            jobs.last().map(|(seq, _)| *seq)
        } else {
            None
        };
        Self {
            jobs: jobs.into_iter().map(|(_, summary)| summary).collect(),
            next,
        }
    }
}

/// Keyed, durable storage for job records.
///
/// Implementations must be safe to share across worker threads. Writers are
/// serialized per job by the orchestrator; the store only has to keep each
/// call atomic.
pub trait JobStore: Send + Sync {
    /// Persists a new job and returns its sequence number. Fails with
    /// [`StoreError::DuplicateId`] if the id was ever issued before.
    fn insert(&self, job: &Job) -> Result<u64, StoreError>;

    /// Returns a copy of the job, or `None` if unknown or deleted.
    fn get(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// Overwrites the job's mutable state. Segments are append-only: only
    /// segments beyond those already stored are written.
    fn update(&self, job: &Job) -> Result<(), StoreError>;

    /// Returns one page of summaries ordered by sequence number, newest first.
    fn list_page(&self, request: &JobPageRequest) -> Result<JobPage, StoreError>;

    /// Removes the job and remembers its id. Returns false if it did not exist.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Jobs in `queued` or `processing`, oldest first.
    fn list_unfinished(&self) -> Result<Vec<Job>, StoreError>;
}
