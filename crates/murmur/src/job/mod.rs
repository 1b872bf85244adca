pub mod params;
pub mod record;

pub use params::{ModelSize, Task, TranscriptionParams};
pub use record::{
    FailureDetail, FailureKind, Job, JobStatus, JobSummary, ProgressInfo, Segment, WordTiming,
};
