//! Synchronous ffmpeg invocation for a single job.
//!
//! Runs on a worker pool thread. The invoker owns the full lifecycle of one
//! dispatched job: mark it processing, run ffmpeg to completion, then record
//! the terminal state. Any unexpected fault forces the job to `failed` so
//! nothing is ever left stuck in `processing`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use tracing::{debug, error, info};
use vidmill_common::{JobId, Result};
use vidmill_db::{get_conn, queries::transcode_jobs, queries::videos, DbPool};

use crate::transcode::profile;

pub struct EncodeInvoker {
    db: DbPool,
    ffmpeg: PathBuf,
    upload_dir: PathBuf,
    transcoded_dir: PathBuf,
}

impl EncodeInvoker {
    pub fn new(db: DbPool, ffmpeg: PathBuf, upload_dir: PathBuf, transcoded_dir: PathBuf) -> Self {
        Self {
            db,
            ffmpeg,
            upload_dir,
            transcoded_dir,
        }
    }

    /// Run one job to a terminal state. Never propagates an error: a fault
    /// in the orchestration path itself fails the job instead.
    pub fn run(&self, job_id: JobId) {
        if let Err(e) = self.try_run(job_id) {
            error!("Job {} hit an internal fault: {}", job_id, e);
            if let Ok(conn) = self.db.get() {
                let _ = transcode_jobs::fail_job(&conn, job_id, &e.to_string(), None);
            }
        }
    }

    fn try_run(&self, job_id: JobId) -> Result<()> {
        let conn = get_conn(&self.db)?;
        let job = transcode_jobs::get_job(&conn, job_id)?;
        let video = videos::get_video(&conn, job.video_id)?;

        let input = self.upload_dir.join(&video.stored_filename);
        if !input.exists() {
            transcode_jobs::fail_job(&conn, job_id, "Source file not found on disk", None)?;
            return Ok(());
        }

        transcode_jobs::start_job(&conn, job_id)?;
        drop(conn);

        let output_name = profile::output_filename(job_id, &job.target);
        let output = self.transcoded_dir.join(&output_name);

        info!(
            "Encoding job {}: {} -> {} ({})",
            job_id, video.original_filename, output_name, job.target.format
        );

        let started = Instant::now();
        let exit = self.invoke_ffmpeg(&input, &output, &job.target);
        let elapsed = started.elapsed().as_secs_f64();

        let conn = get_conn(&self.db)?;
        match exit {
            Ok(()) => {
                transcode_jobs::complete_job(&conn, job_id, &output_name, elapsed)?;
                info!("Job {} completed in {:.1}s", job_id, elapsed);
            }
            Err(message) => {
                transcode_jobs::fail_job(&conn, job_id, &message, Some(elapsed))?;
                error!("Job {} failed after {:.1}s: {}", job_id, elapsed, message);
            }
        }

        Ok(())
    }

    /// Invoke ffmpeg synchronously. Returns `Err(diagnostic)` on a non-zero
    /// exit, with the tail of stderr as the job's error detail.
    fn invoke_ffmpeg(
        &self,
        input: &Path,
        output: &Path,
        target: &vidmill_common::TargetSpec,
    ) -> std::result::Result<(), String> {
        let args = profile::ffmpeg_args(input, output, target);
        debug!("ffmpeg args: {:?}", args);

        let out = Command::new(&self.ffmpeg)
            .args(&args)
            .output()
            .map_err(|e| format!("Failed to execute ffmpeg: {}", e))?;

        if out.status.success() {
            return Ok(());
        }

        error!("ffmpeg exited with {}", out.status);

        // The recorded error detail is ffmpeg's own diagnostic; the exit
        // status only stands in when stderr was empty.
        let stderr = String::from_utf8_lossy(&out.stderr);
        let tail = stderr_tail(&stderr);
        if tail.is_empty() {
            Err(format!("ffmpeg exited with status: {}", out.status))
        } else {
            Err(tail)
        }
    }
}

/// Last few non-empty stderr lines; ffmpeg puts the actual error at the end
/// of a long banner.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(3);
    lines[start..].join(" | ")
}
