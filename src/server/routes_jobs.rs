//! Transcode job submission and query routes.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use vidmill_common::{Error, JobId, TargetSpec, VideoId};
use vidmill_db::models::{JobStatus, TranscodeJob};

use crate::server::routes_videos::PageQuery;
use crate::server::{ApiError, AppContext};
use crate::transcode::orchestrator::Principal;

pub fn job_routes() -> Router<AppContext> {
    Router::new()
        .route("/videos/:id/transcode", post(submit_job))
        .route("/transcoding/jobs", get(list_jobs))
        .route("/transcoding/jobs/:id", get(get_job))
        .route("/transcoding/jobs/:id/download", get(download_result))
        .route("/transcoding/batch", post(submit_batch))
}

#[derive(Deserialize, Default)]
struct TranscodeRequest {
    target_format: Option<String>,
    target_resolution: Option<String>,
    target_bitrate: Option<String>,
}

impl TranscodeRequest {
    /// Validate request fields against the closed enumerations, applying
    /// the defaults (h264, 720p, no bitrate cap).
    fn target(&self) -> Result<TargetSpec, Error> {
        TargetSpec::parse(
            self.target_format.as_deref().unwrap_or("h264"),
            self.target_resolution.as_deref().unwrap_or("720p"),
            self.target_bitrate.clone(),
        )
    }
}

async fn submit_job(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Path(video_id): Path<VideoId>,
    payload: Option<Json<TranscodeRequest>>,
) -> Result<(StatusCode, Json<TranscodeJob>), ApiError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let target = request.target()?;

    let job = ctx.orchestrator.submit(principal, video_id, &target)?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

#[derive(Deserialize)]
struct ListJobsQuery {
    status: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

async fn list_jobs(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = match query.status.as_deref() {
        Some(s) => Some(s.parse::<JobStatus>()?),
        None => None,
    };

    let (page, per_page) = PageQuery {
        page: query.page,
        per_page: query.per_page,
    }
    .clamp();
    let (jobs, total) = ctx.orchestrator.list(principal, status, page, per_page)?;

    Ok(Json(serde_json::json!({
        "jobs": jobs,
        "pagination": {
            "page": page,
            "per_page": per_page,
            "total": total,
            "pages": ((total + per_page - 1) / per_page).max(1),
        }
    })))
}

async fn get_job(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<JobId>,
) -> Result<Json<TranscodeJob>, ApiError> {
    let job = ctx.orchestrator.query(principal, id)?;
    Ok(Json(job))
}

async fn download_result(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<JobId>,
) -> Result<([(HeaderName, String); 2], Body), ApiError> {
    let job = ctx.orchestrator.query(principal, id)?;

    let result_filename = match (&job.status, &job.result_filename) {
        (JobStatus::Completed, Some(name)) => name.clone(),
        _ => {
            return Err(Error::invalid_input(format!(
                "Job is not completed (status: {})",
                job.status
            ))
            .into())
        }
    };

    let path = ctx.config.storage.transcoded_dir.join(&result_filename);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| Error::not_found("result file"))?;

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", result_filename),
            ),
        ],
        body,
    ))
}

#[derive(Deserialize)]
struct BatchRequest {
    video_ids: Vec<VideoId>,
    #[serde(flatten)]
    target: TranscodeRequest,
}

async fn submit_batch(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<BatchRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if payload.video_ids.is_empty() {
        return Err(Error::invalid_input("No video IDs provided").into());
    }

    let target = payload.target.target()?;
    let jobs = ctx
        .orchestrator
        .submit_batch(principal, &payload.video_ids, &target)?;

    let job_ids: Vec<JobId> = jobs.iter().map(|j| j.id).collect();
    let skipped = payload.video_ids.len() - jobs.len();

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "job_ids": job_ids,
            "submitted": job_ids.len(),
            "skipped": skipped,
        })),
    ))
}
