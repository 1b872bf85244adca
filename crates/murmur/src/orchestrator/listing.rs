use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::MurmurError;
use crate::job::JobSummary;
use crate::store::{JobPageRequest, JobStore};

/// Lazy listing of job summaries, newest first.
///
/// Pages are fetched from the store as the iterator advances, keyed by
/// sequence number, so jobs created mid-iteration never shift or repeat
/// entries. [`JobListing::restart`] begins again from the newest job.
pub struct JobListing {
    store: Arc<dyn JobStore>,
    page_size: usize,
    buffer: VecDeque<JobSummary>,
    cursor: Option<u64>,
    exhausted: bool,
}

impl JobListing {
    pub(crate) fn new(store: Arc<dyn JobStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }
    }

    pub fn restart(&mut self) {
        self.buffer.clear();
        self.cursor = None;
        self.exhausted = false;
    }

    fn fetch(&mut self) -> Result<(), MurmurError> {
        let request = match self.cursor {
            Some(cursor) => JobPageRequest::after(cursor, self.page_size),
            None => JobPageRequest::first(self.page_size),
        };
        let page = self.store.list_page(&request)?;
        self.buffer.extend(page.jobs);
        self.cursor = page.next;
        self.exhausted = page.next.is_none();
        Ok(())
    }
}

impl Iterator for JobListing {
    type Item = Result<JobSummary, MurmurError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch() {
                // A failed fetch ends the listing; restart to retry.
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
