//! Service-level routes: health and usage statistics.

use axum::{extract::State, routing::get, Extension, Json, Router};

use vidmill_db::queries::{transcode_jobs, videos};

use crate::server::{ApiError, AppContext};
use crate::transcode::orchestrator::Principal;

pub fn api_routes() -> Router<AppContext> {
    Router::new().route("/stats", get(stats))
}

/// Unauthenticated liveness check.
pub async fn health(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    let database = match ctx.conn() {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };
    let ffmpeg = if crate::probe::tool_available(&ctx.ffmpeg) {
        "available"
    } else {
        "not_available"
    };

    let healthy = database == "ok" && ffmpeg == "available";
    Json(serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "ffmpeg": ffmpeg,
    }))
}

/// Per-user usage statistics; admins see service-wide totals.
async fn stats(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = ctx.conn()?;
    let (video_count, total_bytes) = videos::video_stats(&conn, principal.visibility())?;
    let jobs = transcode_jobs::job_stats(&conn, principal.visibility())?;

    Ok(Json(serde_json::json!({
        "videos": {
            "count": video_count,
            "total_size_bytes": total_bytes,
        },
        "jobs": jobs,
    })))
}
