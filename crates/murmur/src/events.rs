//! Job event broadcaster for real-time status streaming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{FailureDetail, Job, JobStatus};

/// Default channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A snapshot of one job, sent after each persisted update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    /// Unique job identifier.
    pub job_id: String,
    /// Status after the update.
    pub status: JobStatus,
    /// Progress after the update.
    pub progress: f64,
    /// Human-readable message describing the update.
    pub message: String,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
    /// Failure detail (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
}

impl JobEvent {
    /// Creates an event describing the current state of `job`.
    pub fn from_job(job: &Job, message: impl Into<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            message: message.into(),
            timestamp: Utc::now(),
            error: job.error.clone(),
        }
    }
}

/// Broadcasts job events to any number of subscribers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: broadcast::Sender<JobEvent>,
}

impl JobEventBroadcaster {
    /// Creates a broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: JobEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Shorthand for `send(JobEvent::from_job(job, message))`.
    pub fn job_updated(&self, job: &Job, message: impl Into<String>) {
        self.send(JobEvent::from_job(job, message));
    }

    /// Creates a new subscriber. Slow subscribers lose the oldest events
    /// rather than holding up the sender.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FailureKind, TranscriptionParams};
    use crate::storage::SourceRef;

    fn job() -> Job {
        Job::new(
            "job-1".to_string(),
            SourceRef::new("job-1_talk.wav"),
            "talk.wav",
            100,
            TranscriptionParams::default(),
        )
    }

    #[test]
    fn test_send_without_subscribers_is_ok() {
        let broadcaster = JobEventBroadcaster::new(4);
        broadcaster.job_updated(&job(), "Job queued");

        // A later subscriber only sees later events.
        let mut rx = broadcaster.subscribe();
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn test_clones_share_one_channel() {
        let broadcaster = JobEventBroadcaster::new(4);
        let mut rx = broadcaster.subscribe();

        broadcaster.clone().job_updated(&job(), "from clone");
        assert_eq!(rx.try_recv().unwrap().message, "from clone");
    }

    #[test]
    fn test_send_receive() {
        let broadcaster = JobEventBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        broadcaster.job_updated(&job(), "Job queued");

        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id, "job-1");
        assert_eq!(received.status, JobStatus::Queued);
        assert_eq!(received.message, "Job queued");
        assert!(received.error.is_none());
    }

    #[test]
    fn test_failure_event_carries_error() {
        let broadcaster = JobEventBroadcaster::default();
        let mut rx = broadcaster.subscribe();

        let mut j = job();
        j.fail(FailureDetail::new(FailureKind::Timeout, "too slow"))
            .unwrap();
        broadcaster.job_updated(&j, "Job failed");

        let received = rx.try_recv().unwrap();
        assert_eq!(received.status, JobStatus::Failed);
        assert_eq!(received.error.unwrap().kind, FailureKind::Timeout);
    }

    #[test]
    fn test_lagging_subscriber_does_not_block() {
        let broadcaster = JobEventBroadcaster::new(2);
        let mut rx = broadcaster.subscribe();
        for i in 0..5 {
            broadcaster.job_updated(&job(), format!("update {}", i));
        }

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
        assert_eq!(rx.try_recv().unwrap().message, "update 3");
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = JobEvent::from_job(&job(), "Job queued");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["jobId"], "job-1");
        assert_eq!(value["status"], "queued");
        assert!(value.get("error").is_none());
    }
}
