//! Video upload, listing, download, and deletion routes.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderName, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use vidmill_common::{Error, VideoId};
use vidmill_db::models::Video;
use vidmill_db::queries::videos::{self, VideoMetadata, VideoSortKey};
use vidmill_db::queries::transcode_jobs;

use crate::probe;
use crate::server::{ApiError, AppContext};
use crate::transcode::orchestrator::Principal;

const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v"];

pub fn video_routes() -> Router<AppContext> {
    Router::new()
        .route("/videos", post(upload_video).get(list_videos))
        .route("/videos/:id", get(get_video).delete(delete_video))
        .route("/videos/:id/download", get(download_video))
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn clamp(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(10).clamp(1, 100);
        (page, per_page)
    }
}

fn sanitize_filename(name: &str) -> String {
    let base = std::path::Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn extension_allowed(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn upload_video(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Video>), ApiError> {
    let mut upload: Option<(String, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid_input(format!("Malformed upload: {}", e)))?
    {
        if field.name() == Some("video") {
            let filename = field
                .file_name()
                .map(String::from)
                .ok_or_else(|| Error::invalid_input("No filename provided"))?;
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::invalid_input(format!("Upload failed: {}", e)))?;
            upload = Some((filename, bytes));
            break;
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| Error::invalid_input("Missing 'video' form field"))?;

    if !extension_allowed(&filename) {
        return Err(Error::invalid_input(format!(
            "File type not allowed, expected one of: {}",
            ALLOWED_EXTENSIONS.join(", ")
        ))
        .into());
    }
    if bytes.is_empty() {
        return Err(Error::invalid_input("Uploaded file is empty").into());
    }

    let video_id = VideoId::new();
    let stored_filename = format!("{}_{}", video_id, sanitize_filename(&filename));
    let path = ctx.config.storage.upload_dir.join(&stored_filename);
    let file_size = bytes.len() as i64;

    tokio::fs::write(&path, &bytes).await.map_err(Error::from)?;

    // Best-effort metadata probe; an unreadable file still uploads.
    let metadata = match ctx.ffprobe.clone() {
        Some(ffprobe) => {
            let probe_path = path.clone();
            tokio::task::spawn_blocking(move || probe::probe_file(&ffprobe, &probe_path))
                .await
                .map_err(|e| Error::internal(format!("Probe task failed: {}", e)))?
                .map(|r| VideoMetadata {
                    duration_secs: r.duration_secs,
                    resolution: r.resolution(),
                    codec: r.codec,
                })
                .unwrap_or_default()
        }
        None => VideoMetadata::default(),
    };

    let conn = ctx.conn()?;
    let video = videos::create_video(
        &conn,
        video_id,
        principal.user_id,
        &stored_filename,
        &filename,
        file_size,
        &metadata,
    )?;

    Ok((StatusCode::CREATED, Json(video)))
}

async fn list_videos(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (page, per_page) = query.clamp();
    let conn = ctx.conn()?;
    let (items, total) = videos::list_videos(
        &conn,
        principal.visibility(),
        page,
        per_page,
        VideoSortKey::UploadedAt,
        true,
    )?;

    Ok(Json(serde_json::json!({
        "videos": items,
        "pagination": {
            "page": page,
            "per_page": per_page,
            "total": total,
            "pages": ((total + per_page - 1) / per_page).max(1),
        }
    })))
}

async fn get_video(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<VideoId>,
) -> Result<Json<Video>, ApiError> {
    let conn = ctx.conn()?;
    let video = videos::get_video_scoped(&conn, id, principal.visibility())?;
    Ok(Json(video))
}

async fn download_video(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<VideoId>,
) -> Result<([(HeaderName, String); 2], Body), ApiError> {
    let conn = ctx.conn()?;
    let video = videos::get_video_scoped(&conn, id, principal.visibility())?;
    drop(conn);

    let path = ctx.config.storage.upload_dir.join(&video.stored_filename);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| Error::not_found("video file"))?;

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", video.original_filename),
            ),
        ],
        body,
    ))
}

async fn delete_video(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<VideoId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = ctx.conn()?;
    let video = videos::get_video_scoped(&conn, id, principal.visibility())?;

    // Remove job records first, collecting artifacts to delete from disk.
    let artifacts = transcode_jobs::delete_jobs_for_video(&conn, id)?;
    videos::delete_video(&conn, id)?;
    drop(conn);

    for artifact in artifacts {
        let path = ctx.config.storage.transcoded_dir.join(artifact);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Failed to remove artifact {:?}: {}", path, e);
        }
    }
    let source = ctx.config.storage.upload_dir.join(&video.stored_filename);
    if let Err(e) = tokio::fs::remove_file(&source).await {
        tracing::warn!("Failed to remove source {:?}: {}", source, e);
    }

    Ok(Json(serde_json::json!({ "message": "Video deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_paths() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my movie (1).mp4"), "my_movie__1_.mp4");
        assert_eq!(sanitize_filename("clean-name_01.mkv"), "clean-name_01.mkv");
    }

    #[test]
    fn test_extension_allowed() {
        assert!(extension_allowed("a.mp4"));
        assert!(extension_allowed("b.MKV"));
        assert!(!extension_allowed("c.exe"));
        assert!(!extension_allowed("noext"));
    }

    #[test]
    fn test_page_query_clamping() {
        let q = PageQuery {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(q.clamp(), (1, 100));

        let q = PageQuery {
            page: None,
            per_page: None,
        };
        assert_eq!(q.clamp(), (1, 10));
    }
}
