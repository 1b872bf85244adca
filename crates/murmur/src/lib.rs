pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod formatter;
pub mod inference;
pub mod job;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod storage;
pub mod store;

pub use config::{load_config, ServiceConfig};
pub use error::{ConfigError, FormatError, InferenceError, MurmurError, Result, StorageError};
pub use events::{JobEvent, JobEventBroadcaster};
pub use formatter::{OutputFormat, Transcript};
pub use inference::{InferenceAdapter, SegmentStream, Transcription};
pub use job::{
    FailureDetail, FailureKind, Job, JobStatus, JobSummary, ModelSize, Segment, Task,
    TranscriptionParams, WordTiming,
};
pub use logging::init_logging;
pub use orchestrator::{JobListing, Orchestrator, OrchestratorOptions};
pub use storage::{Artifact, FileSourceStorage, SourceRef, SourceStorage};
pub use store::{JobPage, JobPageRequest, JobStore, MemoryJobStore, SqliteJobStore};
