//! In-memory job store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{JobPage, JobPageRequest, JobStore, StoreError};
use crate::job::Job;

#[derive(Default)]
struct State {
    /// Jobs keyed by sequence number.
    jobs: BTreeMap<u64, Job>,
    /// Job id to sequence number.
    ids: HashMap<String, u64>,
    /// Ids of deleted jobs.
    tombstones: HashSet<String>,
    last_seq: u64,
}

/// Job store held entirely in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryJobStore {
    state: RwLock<State>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Memory job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Memory job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: &Job) -> Result<u64, StoreError> {
        let mut state = self.write();
        if state.ids.contains_key(&job.id) || state.tombstones.contains(&job.id) {
            return Err(StoreError::DuplicateId(job.id.clone()));
        }

        state.last_seq += 1;
        let seq = state.last_seq;
        let mut stored = job.clone();
        stored.seq = seq;
        state.ids.insert(stored.id.clone(), seq);
        state.jobs.insert(seq, stored);
        Ok(seq)
    }

    fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let state = self.read();
        Ok(state
            .ids
            .get(id)
            .and_then(|seq| state.jobs.get(seq))
            .cloned())
    }

    fn update(&self, job: &Job) -> Result<(), StoreError> {
        let mut state = self.write();
        let seq = *state
            .ids
            .get(&job.id)
            .ok_or_else(|| StoreError::NotFound(job.id.clone()))?;
        let stored = state
            .jobs
            .get_mut(&seq)
            .ok_or_else(|| StoreError::NotFound(job.id.clone()))?;

        let known_segments = stored.segments.len();
        let segments = std::mem::take(&mut stored.segments);
        *stored = Job {
            seq,
            segments,
            ..job.clone()
        };
        stored
            .segments
            .extend(job.segments.iter().skip(known_segments).cloned());
        Ok(())
    }

    fn list_page(&self, request: &JobPageRequest) -> Result<JobPage, StoreError> {
        let limit = request.effective_limit();
        let upper = request.after.unwrap_or(u64::MAX);
        let state = self.read();
        let probe = state
            .jobs
            .range(..upper)
            .rev()
            .take(limit + 1)
            .map(|(seq, job)| (*seq, job.summary()))
            .collect();
        Ok(JobPage::from_probe(probe, limit))
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut state = self.write();
        let Some(seq) = state.ids.remove(id) else {
            return Ok(false);
        };
        state.jobs.remove(&seq);
        state.tombstones.insert(id.to_string());
        Ok(true)
    }

    fn list_unfinished(&self) -> Result<Vec<Job>, StoreError> {
        let state = self.read();
        Ok(state
            .jobs
            .values()
            .filter(|job| !job.is_terminal())
            .cloned()
            .collect())
    }
}
