//! Job store that fails a scripted number of updates.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use murmur::db::DatabaseError;
use murmur::store::StoreError;
use murmur::{Job, JobPage, JobPageRequest, JobStore, MemoryJobStore};

/// Wraps a [`MemoryJobStore`]; the next `n` calls to `update` fail with a
/// busy-database error before reaching it.
pub struct FlakyStore {
    inner: MemoryJobStore,
    failing_updates: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_updates(n: usize) -> Self {
        Self {
            inner: MemoryJobStore::new(),
            failing_updates: AtomicUsize::new(n),
        }
    }

    /// Failures not yet handed out.
    pub fn remaining_failures(&self) -> usize {
        self.failing_updates.load(Ordering::SeqCst)
    }
}

fn busy() -> StoreError {
    StoreError::Database(DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        Some("database is locked".to_string()),
    )))
}

impl JobStore for FlakyStore {
    fn insert(&self, job: &Job) -> Result<u64, StoreError> {
        self.inner.insert(job)
    }

    fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        self.inner.get(id)
    }

    fn update(&self, job: &Job) -> Result<(), StoreError> {
        let fail = self
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(busy());
        }
        self.inner.update(job)
    }

    fn list_page(&self, request: &JobPageRequest) -> Result<JobPage, StoreError> {
        self.inner.list_page(request)
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }

    fn list_unfinished(&self) -> Result<Vec<Job>, StoreError> {
        self.inner.list_unfinished()
    }
}
