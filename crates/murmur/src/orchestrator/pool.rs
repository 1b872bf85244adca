use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};

use super::runner::{self, Shared};
use crate::error::MurmurError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed set of worker threads pulling job ids from a shared queue. The
/// number of workers bounds how many jobs run at once; the rest wait in the
/// queue.
pub(crate) struct WorkerPool {
    job_sender: Sender<String>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(shared: Arc<Shared>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = unbounded::<String>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let workers = (0..worker_count)
            .map(|worker_id| {
                let job_rx = job_receiver.clone();
                let shutdown_flag = Arc::clone(&shutdown);
                let worker_shared = Arc::clone(&shared);

                thread::Builder::new()
                    .name(format!("murmur-worker-{}", worker_id))
                    .spawn(move || run_worker(worker_id, job_rx, shutdown_flag, worker_shared))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!("Failed to spawn worker thread: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();

        info!("Started {} workers", workers.len());

        Self {
            job_sender,
            workers,
            shutdown,
        }
    }

    /// Queues a job id. Never blocks.
    pub fn submit(&self, job_id: String) -> Result<(), MurmurError> {
        if self.is_shutdown() || self.workers.is_empty() {
            return Err(MurmurError::ShuttingDown);
        }

        self.job_sender
            .send(job_id)
            .map_err(|_| MurmurError::ShuttingDown)
    }

    /// Number of ids waiting for a free worker.
    pub fn queued(&self) -> usize {
        self.job_sender.len()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Joins every worker. Each finishes the job it is running first.
    pub fn wait(self) {
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<String>,
    shutdown: Arc<AtomicBool>,
    shared: Arc<Shared>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(POLL_INTERVAL) {
            Ok(job_id) => {
                debug!("Worker {} picked up job {}", worker_id, job_id);
                runner::process_job(&shared, &job_id);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
