//! Behaviour every `JobStore` backend must share. Each backend's test module
//! runs these against its own instance.

use super::{JobPageRequest, JobStore, StoreError};
use crate::formatter::OutputFormat;
use crate::job::{FailureDetail, FailureKind, Job, JobStatus, ProgressInfo, Segment, TranscriptionParams, WordTiming};
use crate::storage::SourceRef;

fn job(id: &str) -> Job {
    Job::new(
        id.to_string(),
        SourceRef::new(format!("{}_talk.mp3", id)),
        "talk.mp3",
        4096,
        TranscriptionParams::default(),
    )
}

fn ids(store: &dyn JobStore, request: &JobPageRequest) -> (Vec<String>, Option<u64>) {
    let page = store.list_page(request).unwrap();
    (page.jobs.into_iter().map(|s| s.id).collect(), page.next)
}

pub fn insert_assigns_increasing_seq(store: &dyn JobStore) {
    let a = store.insert(&job("a")).unwrap();
    let b = store.insert(&job("b")).unwrap();
    assert!(b > a);
    assert_eq!(store.get("a").unwrap().unwrap().seq, a);
    assert_eq!(store.get("b").unwrap().unwrap().seq, b);
}

pub fn duplicate_and_deleted_ids_rejected(store: &dyn JobStore) {
    store.insert(&job("x")).unwrap();
    assert!(matches!(
        store.insert(&job("x")),
        Err(StoreError::DuplicateId(id)) if id == "x"
    ));

    assert!(store.delete("x").unwrap());
    assert!(matches!(
        store.insert(&job("x")),
        Err(StoreError::DuplicateId(_))
    ));
}

pub fn update_round_trips(store: &dyn JobStore) {
    let mut j = job("rt");
    j.parameters.output_formats = vec![OutputFormat::Srt, OutputFormat::Txt];
    j.parameters.language = Some("en".to_string());
    store.insert(&j).unwrap();
    let mut j = store.get("rt").unwrap().unwrap();

    j.transition(JobStatus::Processing).unwrap();
    j.duration = Some(12.5);
    j.push_segment(
        Segment::new(0.0, 2.0, "hello").with_words(vec![WordTiming {
            start: 0.0,
            end: 0.8,
            word: "hello".to_string(),
            probability: Some(0.9),
        }]),
        0.16,
        ProgressInfo {
            segments_processed: 1,
            covered_duration: 2.0,
            processing_speed: Some(4.0),
            estimated_time_remaining: Some(2.6),
        },
    );
    j.fail(FailureDetail::new(FailureKind::InferenceFailure, "decoder crashed"))
        .unwrap();
    store.update(&j).unwrap();

    let back = store.get("rt").unwrap().unwrap();
    assert_eq!(back, j);
}

pub fn update_unknown_is_not_found(store: &dyn JobStore) {
    assert!(matches!(
        store.update(&job("nobody")),
        Err(StoreError::NotFound(id)) if id == "nobody"
    ));
}

pub fn segments_are_append_only(store: &dyn JobStore) {
    store.insert(&job("s")).unwrap();
    let mut j = store.get("s").unwrap().unwrap();
    j.transition(JobStatus::Processing).unwrap();
    for i in 0..3 {
        let start = f64::from(i);
        j.push_segment(
            Segment::new(start, start + 1.0, format!("part {}", i)),
            0.1 * start,
            ProgressInfo::default(),
        );
        store.update(&j).unwrap();
    }

    let back = store.get("s").unwrap().unwrap();
    let texts: Vec<_> = back.segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, ["part 0", "part 1", "part 2"]);
}

pub fn pages_stable_under_inserts(store: &dyn JobStore) {
    for i in 0..5 {
        store.insert(&job(&format!("j{}", i))).unwrap();
    }

    let (first, next) = ids(store, &JobPageRequest::first(2));
    assert_eq!(first, ["j4", "j3"]);
    let cursor = next.unwrap();

    store.insert(&job("newer")).unwrap();

    let (second, next) = ids(store, &JobPageRequest::after(cursor, 2));
    assert_eq!(second, ["j2", "j1"]);
    let (third, next) = ids(store, &JobPageRequest::after(next.unwrap(), 2));
    assert_eq!(third, ["j0"]);
    assert_eq!(next, None);

    let (fresh, _) = ids(store, &JobPageRequest::first(1));
    assert_eq!(fresh, ["newer"]);
}

pub fn list_unfinished_oldest_first(store: &dyn JobStore) {
    for id in ["q1", "p1", "done", "q2"] {
        store.insert(&job(id)).unwrap();
    }
    let mut p1 = store.get("p1").unwrap().unwrap();
    p1.transition(JobStatus::Processing).unwrap();
    store.update(&p1).unwrap();
    let mut done = store.get("done").unwrap().unwrap();
    done.transition(JobStatus::Cancelled).unwrap();
    store.update(&done).unwrap();

    let unfinished: Vec<_> = store
        .list_unfinished()
        .unwrap()
        .into_iter()
        .map(|j| (j.id, j.status))
        .collect();
    assert_eq!(
        unfinished,
        [
            ("q1".to_string(), JobStatus::Queued),
            ("p1".to_string(), JobStatus::Processing),
            ("q2".to_string(), JobStatus::Queued),
        ]
    );
}

pub fn delete_removes_job(store: &dyn JobStore) {
    store.insert(&job("d")).unwrap();
    assert!(store.delete("d").unwrap());
    assert!(store.get("d").unwrap().is_none());
    assert!(!store.delete("d").unwrap());
    assert!(store.list_page(&JobPageRequest::default()).unwrap().jobs.is_empty());
}
