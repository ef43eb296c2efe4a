//! Job intake, queries, and batch fan-out.
//!
//! The orchestrator is the only entry point for creating jobs. Submission
//! validates ownership, creates the record in `queued`, and enqueues the
//! encode task; it returns as soon as the record exists, never waiting for
//! a pool slot. Queries read the record store directly and never touch the
//! pool.

use std::sync::Arc;

use tracing::warn;
use vidmill_common::{JobId, Result, TargetSpec, UserId, VideoId};
use vidmill_db::models::{JobStatus, TranscodeJob};
use vidmill_db::queries::transcode_jobs::{self, JobSortKey};
use vidmill_db::queries::videos;
use vidmill_db::{get_conn, DbPool};

use crate::transcode::{EncodeInvoker, WorkerPool};

/// The authenticated principal on whose behalf an operation runs.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Principal {
    /// Ownership scope for record-store lookups. Admins see everything.
    pub fn visibility(&self) -> Option<UserId> {
        if self.is_admin {
            None
        } else {
            Some(self.user_id)
        }
    }
}

pub struct JobOrchestrator {
    db: DbPool,
    pool: WorkerPool,
    invoker: Arc<EncodeInvoker>,
}

impl JobOrchestrator {
    pub fn new(db: DbPool, pool: WorkerPool, invoker: Arc<EncodeInvoker>) -> Self {
        Self { db, pool, invoker }
    }

    /// Create a job for a video and enqueue it. Returns the queued record
    /// immediately; encoding happens in the background.
    pub fn submit(
        &self,
        principal: Principal,
        video_id: VideoId,
        target: &TargetSpec,
    ) -> Result<TranscodeJob> {
        let conn = get_conn(&self.db)?;

        // An inaccessible video reads as not found, never forbidden.
        videos::get_video_scoped(&conn, video_id, principal.visibility())?;

        let job = transcode_jobs::create_job(&conn, principal.user_id, video_id, target)?;
        drop(conn);

        let invoker = Arc::clone(&self.invoker);
        let job_id = job.id;
        self.pool.submit(move || invoker.run(job_id))?;

        Ok(job)
    }

    /// Fetch one job visible to the principal.
    pub fn query(&self, principal: Principal, job_id: JobId) -> Result<TranscodeJob> {
        let conn = get_conn(&self.db)?;
        transcode_jobs::get_job_scoped(&conn, job_id, principal.visibility())
    }

    /// List jobs visible to the principal, optionally filtered by status,
    /// newest first.
    pub fn list(
        &self,
        principal: Principal,
        status: Option<JobStatus>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<TranscodeJob>, i64)> {
        let conn = get_conn(&self.db)?;
        transcode_jobs::list_jobs(
            &conn,
            principal.visibility(),
            status,
            page,
            per_page,
            JobSortKey::CreatedAt,
            true,
        )
    }

    /// Fan one target out over several videos. A video that fails its
    /// ownership check is skipped, not a batch failure; the returned list
    /// holds only the jobs actually created.
    pub fn submit_batch(
        &self,
        principal: Principal,
        video_ids: &[VideoId],
        target: &TargetSpec,
    ) -> Result<Vec<TranscodeJob>> {
        let mut jobs = Vec::with_capacity(video_ids.len());

        for &video_id in video_ids {
            match self.submit(principal, video_id, target) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    warn!("Skipping video {} in batch: {}", video_id, e);
                }
            }
        }

        Ok(jobs)
    }
}
