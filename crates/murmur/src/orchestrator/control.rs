//! Per-job cancellation flags and write locks.
//!
//! Every read-modify-write of a job record happens while holding that job's
//! lock, so a worker and a caller cancelling the job never interleave. An
//! entry lives in the registry only while some handle to it exists.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub(crate) struct JobControl {
    cancelled: AtomicBool,
    lock: Mutex<()>,
}

impl JobControl {
    /// Serializes writers of one job.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub(crate) struct JobControls {
    controls: Mutex<HashMap<String, Arc<JobControl>>>,
}

impl JobControls {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<JobControl>>> {
        match self.controls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job control registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Returns the control for `job_id`, creating it if nobody holds one.
    pub fn acquire(&self, job_id: &str) -> ControlHandle<'_> {
        let control = Arc::clone(self.map().entry(job_id.to_string()).or_default());
        ControlHandle {
            registry: self,
            job_id: job_id.to_string(),
            control: Some(control),
        }
    }

    fn release(&self, job_id: &str) {
        let mut map = self.map();
        if map
            .get(job_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            map.remove(job_id);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.map().len()
    }
}

/// Shared access to one job's control. Dropping the last handle removes the
/// registry entry.
pub(crate) struct ControlHandle<'a> {
    registry: &'a JobControls,
    job_id: String,
    control: Option<Arc<JobControl>>,
}

impl std::ops::Deref for ControlHandle<'_> {
    type Target = JobControl;

    fn deref(&self) -> &JobControl {
        // Only `None` while dropping.
        self.control.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for ControlHandle<'_> {
    fn drop(&mut self) {
        drop(self.control.take());
        self.registry.release(&self.job_id);
    }
}
