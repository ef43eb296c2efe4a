//! Video asset query operations.

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection};
use vidmill_common::{Error, Result, UserId, VideoId};

use crate::models::Video;
use crate::queries::{parse_ts, parse_uuid};

const VIDEO_COLUMNS: &str = "id, owner_id, stored_filename, original_filename, file_size, \
     duration_secs, resolution, codec, uploaded_at";

fn video_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Video> {
    Ok(Video {
        id: VideoId::from(parse_uuid(0, &row.get::<_, String>(0)?)?),
        owner_id: UserId::from(parse_uuid(1, &row.get::<_, String>(1)?)?),
        stored_filename: row.get(2)?,
        original_filename: row.get(3)?,
        file_size: row.get(4)?,
        duration_secs: row.get(5)?,
        resolution: row.get(6)?,
        codec: row.get(7)?,
        uploaded_at: parse_ts(8, &row.get::<_, String>(8)?)?,
    })
}

/// Metadata extracted from a probe of the uploaded file, if probing succeeded.
#[derive(Debug, Clone, Default)]
pub struct VideoMetadata {
    pub duration_secs: Option<f64>,
    pub resolution: Option<String>,
    pub codec: Option<String>,
}

/// Sortable columns for video listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoSortKey {
    #[default]
    UploadedAt,
    OriginalFilename,
    FileSize,
    Duration,
}

impl VideoSortKey {
    fn column(self) -> &'static str {
        match self {
            Self::UploadedAt => "uploaded_at",
            Self::OriginalFilename => "original_filename",
            Self::FileSize => "file_size",
            Self::Duration => "duration_secs",
        }
    }
}

/// Record a newly uploaded video.
pub fn create_video(
    conn: &Connection,
    id: VideoId,
    owner_id: UserId,
    stored_filename: &str,
    original_filename: &str,
    file_size: i64,
    metadata: &VideoMetadata,
) -> Result<Video> {
    let video = Video {
        id,
        owner_id,
        stored_filename: stored_filename.to_string(),
        original_filename: original_filename.to_string(),
        file_size,
        duration_secs: metadata.duration_secs,
        resolution: metadata.resolution.clone(),
        codec: metadata.codec.clone(),
        uploaded_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO videos (id, owner_id, stored_filename, original_filename, file_size,
                             duration_secs, resolution, codec, uploaded_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            video.id.to_string(),
            video.owner_id.to_string(),
            video.stored_filename,
            video.original_filename,
            video.file_size,
            video.duration_secs,
            video.resolution,
            video.codec,
            video.uploaded_at.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(video)
}

/// Get a video by ID, regardless of owner.
pub fn get_video(conn: &Connection, id: VideoId) -> Result<Video> {
    conn.query_row(
        &format!("SELECT {} FROM videos WHERE id = ?", VIDEO_COLUMNS),
        [id.to_string()],
        video_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found("video"),
        _ => Error::database(e.to_string()),
    })
}

/// Get a video visible to the given owner. `None` is the admin scope and
/// sees every video. A video owned by someone else reads as not found,
/// never as forbidden.
pub fn get_video_scoped(conn: &Connection, id: VideoId, owner: Option<UserId>) -> Result<Video> {
    let video = get_video(conn, id)?;
    match owner {
        Some(owner_id) if video.owner_id != owner_id => Err(Error::not_found("video")),
        _ => Ok(video),
    }
}

/// List videos with pagination, newest first by default. Returns the page
/// of items plus the total count matching the scope.
pub fn list_videos(
    conn: &Connection,
    owner: Option<UserId>,
    page: i64,
    per_page: i64,
    sort: VideoSortKey,
    descending: bool,
) -> Result<(Vec<Video>, i64)> {
    let mut where_clause = String::new();
    let mut filter_params: Vec<String> = Vec::new();

    if let Some(owner_id) = owner {
        where_clause = " WHERE owner_id = ?".to_string();
        filter_params.push(owner_id.to_string());
    }

    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM videos{}", where_clause),
            params_from_iter(filter_params.iter()),
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let direction = if descending { "DESC" } else { "ASC" };
    let offset = (page.max(1) - 1) * per_page;

    let sql = format!(
        "SELECT {} FROM videos{} ORDER BY {} {} LIMIT ? OFFSET ?",
        VIDEO_COLUMNS,
        where_clause,
        sort.column(),
        direction,
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;

    filter_params.push(per_page.to_string());
    filter_params.push(offset.to_string());

    let videos = stmt
        .query_map(params_from_iter(filter_params.iter()), video_from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok((videos, total))
}

/// Delete a video row. Associated jobs must be deleted first.
pub fn delete_video(conn: &Connection, id: VideoId) -> Result<()> {
    let affected = conn
        .execute("DELETE FROM videos WHERE id = ?", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::not_found("video"));
    }
    Ok(())
}

/// Count and total byte size of videos in scope, for the stats endpoint.
pub fn video_stats(conn: &Connection, owner: Option<UserId>) -> Result<(i64, i64)> {
    let (sql, params): (&str, Vec<String>) = match owner {
        Some(owner_id) => (
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0) FROM videos WHERE owner_id = ?",
            vec![owner_id.to_string()],
        ),
        None => (
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0) FROM videos",
            vec![],
        ),
    };

    conn.query_row(sql, params_from_iter(params.iter()), |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
    .map_err(|e| Error::database(e.to_string()))
}
