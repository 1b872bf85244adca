//! Job repository: CRUD operations for the `jobs`, `job_segments` and
//! `job_tombstones` tables.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database. JSON-valued columns are kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub seq: i64,
    pub id: String,
    pub status: String,
    pub source_ref: String,
    pub filename: String,
    pub filesize: i64,
    pub parameters: String,
    pub progress: f64,
    pub progress_info: Option<String>,
    pub duration: Option<f64>,
    pub language: Option<String>,
    pub output_paths: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            seq: row.get("seq")?,
            id: row.get("id")?,
            status: row.get("status")?,
            source_ref: row.get("source_ref")?,
            filename: row.get("filename")?,
            filesize: row.get("filesize")?,
            parameters: row.get("parameters")?,
            progress: row.get("progress")?,
            progress_info: row.get("progress_info")?,
            duration: row.get("duration")?,
            language: row.get("language")?,
            output_paths: row.get("output_paths")?,
            error_kind: row.get("error_kind")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// A raw segment row.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRow {
    pub idx: i64,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub words: Option<String>,
}

impl SegmentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            idx: row.get("idx")?,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            text: row.get("text")?,
            words: row.get("words")?,
        })
    }
}

fn id_known(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let known: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM jobs WHERE id = ?1)
             OR EXISTS(SELECT 1 FROM job_tombstones WHERE id = ?1)",
        params![id],
        |r| r.get(0),
    )?;
    Ok(known)
}

/// Inserts a new job row and returns its sequence number, or `None` if the
/// identifier is already in use or was used by a deleted job.
pub fn insert(db: &Database, job: &JobRow) -> Result<Option<i64>, DatabaseError> {
    db.with_conn(|conn| {
        if id_known(conn, &job.id)? {
            return Ok(None);
        }
        conn.execute(
            "INSERT INTO jobs (id, status, source_ref, filename, filesize, parameters, progress,
             progress_info, duration, language, output_paths, error_kind, error_message,
             created_at, updated_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                job.id,
                job.status,
                job.source_ref,
                job.filename,
                job.filesize,
                job.parameters,
                job.progress,
                job.progress_info,
                job.duration,
                job.language,
                job.output_paths,
                job.error_kind,
                job.error_message,
                job.created_at,
                job.updated_at,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(Some(conn.last_insert_rowid()))
    })
}

/// Overwrites the mutable columns of a job and appends any segments whose
/// index is not stored yet, in one transaction. Returns false if the job
/// does not exist.
pub fn update(db: &Database, job: &JobRow, segments: &[SegmentRow]) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE jobs SET status=?2, progress=?3, progress_info=?4, duration=?5, language=?6,
             output_paths=?7, error_kind=?8, error_message=?9, updated_at=?10, started_at=?11,
             completed_at=?12
             WHERE id=?1",
            params![
                job.id,
                job.status,
                job.progress,
                job.progress_info,
                job.duration,
                job.language,
                job.output_paths,
                job.error_kind,
                job.error_message,
                job.updated_at,
                job.started_at,
                job.completed_at,
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        let stored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM job_segments WHERE job_id = ?1",
            params![job.id],
            |r| r.get(0),
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO job_segments (job_id, idx, start_time, end_time, text, words)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for segment in segments.iter().filter(|s| s.idx >= stored) {
                stmt.execute(params![
                    job.id,
                    segment.idx,
                    segment.start_time,
                    segment.end_time,
                    segment.text,
                    segment.words,
                ])?;
            }
        }
        tx.commit()?;
        Ok(true)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Loads the segments of a job in order.
pub fn find_segments(db: &Database, id: &str) -> Result<Vec<SegmentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT idx, start_time, end_time, text, words FROM job_segments
             WHERE job_id = ?1 ORDER BY idx ASC",
        )?;
        let rows = stmt
            .query_map(params![id], SegmentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Number of segments stored for a job.
pub fn count_segments(db: &Database, id: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM job_segments WHERE job_id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    })
}

/// Returns up to `limit` jobs with a sequence number below `before`
/// (all jobs when `None`), newest first.
pub fn find_page(
    db: &Database,
    before: Option<i64>,
    limit: u32,
) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE seq < ?1 ORDER BY seq DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(
                params![before.unwrap_or(i64::MAX), i64::from(limit)],
                JobRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns every job in one of the given states, oldest first.
pub fn find_by_statuses(db: &Database, statuses: &[&str]) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE status = ?1 ORDER BY seq ASC")?;
        let mut out = Vec::new();
        for status in statuses {
            let rows = stmt
                .query_map(params![status], JobRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            out.extend(rows);
        }
        out.sort_by_key(|row| row.seq);
        Ok(out)
    })
}

/// Deletes a job and its segments and records a tombstone for its ID.
/// Returns false if no such job existed.
pub fn delete(db: &Database, id: &str, deleted_at: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM job_segments WHERE job_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        if removed > 0 {
            tx.execute(
                "INSERT OR REPLACE INTO job_tombstones (id, deleted_at) VALUES (?1, ?2)",
                params![id, deleted_at],
            )?;
        }
        tx.commit()?;
        Ok(removed > 0)
    })
}
