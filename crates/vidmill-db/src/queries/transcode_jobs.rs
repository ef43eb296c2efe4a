//! Transcode job query operations.
//!
//! The job table is the single source of truth for job state. Status moves
//! queued → processing → {completed, failed} and never backward; the update
//! functions here enforce that with guarded `WHERE status = ...` clauses, so
//! a stale writer can never resurrect a terminal job.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection};
use vidmill_common::{Error, JobId, Result, TargetSpec, UserId, VideoId};

use crate::models::{JobStatus, TranscodeJob};
use crate::queries::{parse_ts, parse_uuid};

const JOB_COLUMNS: &str = "id, owner_id, video_id, format, resolution, bitrate, status, \
     progress, result_filename, error_message, created_at, started_at, completed_at, \
     processing_seconds";

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TranscodeJob> {
    let format: String = row.get(3)?;
    let resolution: String = row.get(4)?;
    let status: String = row.get(6)?;

    let convert =
        |idx, e: Error| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e));

    Ok(TranscodeJob {
        id: JobId::from(parse_uuid(0, &row.get::<_, String>(0)?)?),
        owner_id: UserId::from(parse_uuid(1, &row.get::<_, String>(1)?)?),
        video_id: VideoId::from(parse_uuid(2, &row.get::<_, String>(2)?)?),
        target: TargetSpec {
            format: format.parse().map_err(|e| convert(3, e))?,
            resolution: resolution.parse().map_err(|e| convert(4, e))?,
            bitrate: row.get(5)?,
        },
        status: status.parse().map_err(|e| convert(6, e))?,
        progress: row.get(7)?,
        result_filename: row.get(8)?,
        error_message: row.get(9)?,
        created_at: parse_ts(10, &row.get::<_, String>(10)?)?,
        started_at: opt_ts(row, 11)?,
        completed_at: opt_ts(row, 12)?,
        processing_seconds: row.get(13)?,
    })
}

fn opt_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => Ok(Some(parse_ts(idx, &s)?)),
        None => Ok(None),
    }
}

/// Sortable columns for job listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobSortKey {
    #[default]
    CreatedAt,
    CompletedAt,
    Status,
}

impl JobSortKey {
    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::CompletedAt => "completed_at",
            Self::Status => "status",
        }
    }
}

/// Per-status counts plus processing-time aggregates, for the stats endpoint.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobStats {
    pub total: i64,
    pub queued: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub total_processing_seconds: f64,
    pub average_processing_seconds: f64,
}

/// Create a new job in the `queued` state with progress 0. The result
/// filename stays NULL until the job actually completes.
pub fn create_job(
    conn: &Connection,
    owner_id: UserId,
    video_id: VideoId,
    target: &TargetSpec,
) -> Result<TranscodeJob> {
    let job = TranscodeJob {
        id: JobId::new(),
        owner_id,
        video_id,
        target: target.clone(),
        status: JobStatus::Queued,
        progress: 0,
        result_filename: None,
        error_message: None,
        created_at: Utc::now(),
        started_at: None,
        completed_at: None,
        processing_seconds: None,
    };

    conn.execute(
        "INSERT INTO transcode_jobs (id, owner_id, video_id, format, resolution, bitrate,
                                     status, progress, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 'queued', 0, ?)",
        params![
            job.id.to_string(),
            job.owner_id.to_string(),
            job.video_id.to_string(),
            job.target.format.to_string(),
            job.target.resolution.to_string(),
            job.target.bitrate,
            job.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(job)
}

/// Get a job by ID, regardless of owner.
pub fn get_job(conn: &Connection, id: JobId) -> Result<TranscodeJob> {
    conn.query_row(
        &format!("SELECT {} FROM transcode_jobs WHERE id = ?", JOB_COLUMNS),
        [id.to_string()],
        job_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found("transcode job"),
        _ => Error::database(e.to_string()),
    })
}

/// Get a job visible to the given owner. `None` is the admin scope. A job
/// owned by someone else reads as not found.
pub fn get_job_scoped(conn: &Connection, id: JobId, owner: Option<UserId>) -> Result<TranscodeJob> {
    let job = get_job(conn, id)?;
    match owner {
        Some(owner_id) if job.owner_id != owner_id => Err(Error::not_found("transcode job")),
        _ => Ok(job),
    }
}

/// List jobs with optional owner and status filters, paginated. Returns
/// the page of items plus the total count matching the filters.
pub fn list_jobs(
    conn: &Connection,
    owner: Option<UserId>,
    status: Option<JobStatus>,
    page: i64,
    per_page: i64,
    sort: JobSortKey,
    descending: bool,
) -> Result<(Vec<TranscodeJob>, i64)> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut filter_params: Vec<String> = Vec::new();

    if let Some(owner_id) = owner {
        clauses.push("owner_id = ?");
        filter_params.push(owner_id.to_string());
    }
    if let Some(status) = status {
        clauses.push("status = ?");
        filter_params.push(status.to_string());
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM transcode_jobs{}", where_clause),
            params_from_iter(filter_params.iter()),
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let direction = if descending { "DESC" } else { "ASC" };
    let offset = (page.max(1) - 1) * per_page;

    let sql = format!(
        "SELECT {} FROM transcode_jobs{} ORDER BY {} {} LIMIT ? OFFSET ?",
        JOB_COLUMNS,
        where_clause,
        sort.column(),
        direction,
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;

    filter_params.push(per_page.to_string());
    filter_params.push(offset.to_string());

    let jobs = stmt
        .query_map(params_from_iter(filter_params.iter()), job_from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok((jobs, total))
}

/// Transition a job from queued to processing, recording the start time.
/// Rejects the transition if the job is in any other state.
pub fn start_job(conn: &Connection, id: JobId) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE transcode_jobs SET status = 'processing', started_at = ?
             WHERE id = ? AND status = 'queued'",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    guard_transition(conn, id, affected, "queued")
}

/// Transition a job from processing to completed, setting progress to 100
/// and recording the result artifact. Rejects the transition from any
/// other state.
pub fn complete_job(
    conn: &Connection,
    id: JobId,
    result_filename: &str,
    processing_seconds: f64,
) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE transcode_jobs
             SET status = 'completed', progress = 100, result_filename = ?,
                 completed_at = ?, processing_seconds = ?
             WHERE id = ? AND status = 'processing'",
            params![
                result_filename,
                Utc::now().to_rfc3339(),
                processing_seconds,
                id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    guard_transition(conn, id, affected, "processing")
}

/// Mark a job failed with an error message. Allowed from queued (when the
/// run never started, e.g. the input vanished) or processing, never from a
/// terminal state.
pub fn fail_job(
    conn: &Connection,
    id: JobId,
    error_message: &str,
    processing_seconds: Option<f64>,
) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE transcode_jobs
             SET status = 'failed', error_message = ?, completed_at = ?, processing_seconds = ?
             WHERE id = ? AND status IN ('queued', 'processing')",
            params![
                error_message,
                Utc::now().to_rfc3339(),
                processing_seconds,
                id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    guard_transition(conn, id, affected, "queued or processing")
}

fn guard_transition(conn: &Connection, id: JobId, affected: usize, expected: &str) -> Result<()> {
    if affected > 0 {
        return Ok(());
    }
    // Distinguish a missing job from an illegal transition.
    match get_job(conn, id) {
        Ok(job) => Err(Error::conflict(format!(
            "Job is {}, expected {}",
            job.status, expected
        ))),
        Err(e) => Err(e),
    }
}

/// Aggregate job counts and processing times in scope.
pub fn job_stats(conn: &Connection, owner: Option<UserId>) -> Result<JobStats> {
    let (where_clause, params): (&str, Vec<String>) = match owner {
        Some(owner_id) => (" WHERE owner_id = ?", vec![owner_id.to_string()]),
        None => ("", vec![]),
    };

    let sql = format!(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'queued'), 0),
                COALESCE(SUM(status = 'processing'), 0),
                COALESCE(SUM(status = 'completed'), 0),
                COALESCE(SUM(status = 'failed'), 0),
                COALESCE(SUM(processing_seconds), 0.0),
                COALESCE(AVG(processing_seconds), 0.0)
         FROM transcode_jobs{}",
        where_clause
    );

    conn.query_row(&sql, params_from_iter(params.iter()), |row| {
        Ok(JobStats {
            total: row.get(0)?,
            queued: row.get(1)?,
            processing: row.get(2)?,
            completed: row.get(3)?,
            failed: row.get(4)?,
            total_processing_seconds: row.get(5)?,
            average_processing_seconds: row.get(6)?,
        })
    })
    .map_err(|e| Error::database(e.to_string()))
}

/// Delete all jobs for a video, returning the result filenames of any
/// completed jobs so the caller can remove the artifacts from disk.
pub fn delete_jobs_for_video(conn: &Connection, video_id: VideoId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT result_filename FROM transcode_jobs
             WHERE video_id = ? AND result_filename IS NOT NULL",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let filenames = stmt
        .query_map([video_id.to_string()], |row| row.get::<_, String>(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    conn.execute(
        "DELETE FROM transcode_jobs WHERE video_id = ?",
        [video_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(filenames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::users::create_user;
    use crate::queries::videos::{create_video, VideoMetadata};

    fn seed(conn: &Connection) -> (UserId, VideoId) {
        let user = create_user(conn, "alice", "alice@example.com", "hash", false).unwrap();
        let video = create_video(
            conn,
            VideoId::new(),
            user.id,
            "stored.mp4",
            "movie.mp4",
            1024,
            &VideoMetadata::default(),
        )
        .unwrap();
        (user.id, video.id)
    }

    fn target() -> TargetSpec {
        TargetSpec::parse("h264", "720p", None).unwrap()
    }

    #[test]
    fn test_create_job_starts_queued() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);

        let job = create_job(&conn, owner, video, &target()).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.result_filename.is_none());
        assert!(job.started_at.is_none());

        let fetched = get_job(&conn, job.id).unwrap();
        assert_eq!(fetched.status, JobStatus::Queued);
        assert_eq!(fetched.target, job.target);
    }

    #[test]
    fn test_full_success_lifecycle() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);
        let job = create_job(&conn, owner, video, &target()).unwrap();

        start_job(&conn, job.id).unwrap();
        let running = get_job(&conn, job.id).unwrap();
        assert_eq!(running.status, JobStatus::Processing);
        assert_eq!(running.progress, 0);
        assert!(running.started_at.is_some());

        complete_job(&conn, job.id, "out.mp4", 1.5).unwrap();
        let done = get_job(&conn, job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.result_filename.as_deref(), Some("out.mp4"));
        assert_eq!(done.processing_seconds, Some(1.5));
        assert!(done.completed_at.is_some());
        assert!(done.error_message.is_none());
    }

    #[test]
    fn test_failure_lifecycle() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);
        let job = create_job(&conn, owner, video, &target()).unwrap();

        start_job(&conn, job.id).unwrap();
        fail_job(&conn, job.id, "encoder exited with status 1", Some(0.2)).unwrap();

        let failed = get_job(&conn, job.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.progress, 0);
        assert!(failed.result_filename.is_none());
        assert_eq!(
            failed.error_message.as_deref(),
            Some("encoder exited with status 1")
        );
    }

    #[test]
    fn test_fail_from_queued_allowed() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);
        let job = create_job(&conn, owner, video, &target()).unwrap();

        fail_job(&conn, job.id, "input file missing", None).unwrap();
        let failed = get_job(&conn, job.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.started_at.is_none());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);

        let job = create_job(&conn, owner, video, &target()).unwrap();
        start_job(&conn, job.id).unwrap();
        complete_job(&conn, job.id, "out.mp4", 1.0).unwrap();

        assert!(matches!(start_job(&conn, job.id), Err(Error::Conflict(_))));
        assert!(matches!(
            fail_job(&conn, job.id, "late failure", None),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            complete_job(&conn, job.id, "other.mp4", 2.0),
            Err(Error::Conflict(_))
        ));

        // The winning completion is untouched.
        let done = get_job(&conn, job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.result_filename.as_deref(), Some("out.mp4"));
    }

    #[test]
    fn test_complete_requires_processing() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);
        let job = create_job(&conn, owner, video, &target()).unwrap();

        // Straight from queued is rejected.
        assert!(matches!(
            complete_job(&conn, job.id, "out.mp4", 1.0),
            Err(Error::Conflict(_))
        ));
        assert_eq!(get_job(&conn, job.id).unwrap().status, JobStatus::Queued);
    }

    #[test]
    fn test_transition_on_missing_job_is_not_found() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        seed(&conn);

        assert!(matches!(
            start_job(&conn, JobId::new()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_status_column_is_an_error() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);
        let job = create_job(&conn, owner, video, &target()).unwrap();

        // A status outside the closed set must surface, never silently
        // read back as queued.
        conn.execute(
            "UPDATE transcode_jobs SET status = 'cancelled' WHERE id = ?",
            [job.id.to_string()],
        )
        .unwrap();
        assert!(get_job(&conn, job.id).is_err());
    }

    #[test]
    fn test_get_job_scoped() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);
        let other = create_user(&conn, "bob", "bob@example.com", "hash", false)
            .unwrap()
            .id;
        let job = create_job(&conn, owner, video, &target()).unwrap();

        assert!(get_job_scoped(&conn, job.id, Some(owner)).is_ok());
        assert!(get_job_scoped(&conn, job.id, None).is_ok());
        assert!(matches!(
            get_job_scoped(&conn, job.id, Some(other)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_jobs_filters_and_pagination() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(create_job(&conn, owner, video, &target()).unwrap().id);
        }
        start_job(&conn, ids[0]).unwrap();
        complete_job(&conn, ids[0], "out.mp4", 1.0).unwrap();
        start_job(&conn, ids[1]).unwrap();

        let (completed, total) = list_jobs(
            &conn,
            Some(owner),
            Some(JobStatus::Completed),
            1,
            10,
            JobSortKey::CreatedAt,
            true,
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(completed[0].id, ids[0]);

        let (queued, total) = list_jobs(
            &conn,
            Some(owner),
            Some(JobStatus::Queued),
            1,
            2,
            JobSortKey::CreatedAt,
            false,
        )
        .unwrap();
        assert_eq!(total, 3);
        assert_eq!(queued.len(), 2);

        let (_, all) = list_jobs(&conn, None, None, 1, 10, JobSortKey::CreatedAt, true).unwrap();
        assert_eq!(all, 5);
    }

    #[test]
    fn test_job_stats() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);

        let a = create_job(&conn, owner, video, &target()).unwrap();
        let b = create_job(&conn, owner, video, &target()).unwrap();
        create_job(&conn, owner, video, &target()).unwrap();

        start_job(&conn, a.id).unwrap();
        complete_job(&conn, a.id, "a.mp4", 2.0).unwrap();
        start_job(&conn, b.id).unwrap();
        fail_job(&conn, b.id, "boom", Some(1.0)).unwrap();

        let stats = job_stats(&conn, Some(owner)).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_processing_seconds, 3.0);
        assert_eq!(stats.average_processing_seconds, 1.5);
    }

    #[test]
    fn test_delete_jobs_for_video_returns_artifacts() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let (owner, video) = seed(&conn);

        let done = create_job(&conn, owner, video, &target()).unwrap();
        create_job(&conn, owner, video, &target()).unwrap();
        start_job(&conn, done.id).unwrap();
        complete_job(&conn, done.id, "artifact.mp4", 1.0).unwrap();

        let artifacts = delete_jobs_for_video(&conn, video).unwrap();
        assert_eq!(artifacts, vec!["artifact.mp4".to_string()]);

        let (_, total) = list_jobs(&conn, None, None, 1, 10, JobSortKey::CreatedAt, true).unwrap();
        assert_eq!(total, 0);
    }
}
