//! Internal Rust models matching the database schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vidmill_common::{JobId, TargetSpec, UserId, VideoId};

/// User account model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-user transcode defaults and notification flags. Missing fields on
/// update fall back to these defaults rather than the stored values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserPreferences {
    pub default_format: String,
    pub default_resolution: String,
    pub default_quality: String,
    pub notifications_enabled: bool,
    pub auto_delete_originals: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            default_format: "h264".to_string(),
            default_resolution: "720p".to_string(),
            default_quality: "medium".to_string(),
            notifications_enabled: true,
            auto_delete_originals: false,
        }
    }
}

/// Uploaded video asset model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: VideoId,
    pub owner_id: UserId,
    /// Unique on-disk filename inside the upload directory.
    pub stored_filename: String,
    /// The filename the caller uploaded, for display and download naming.
    pub original_filename: String,
    pub file_size: i64,
    pub duration_secs: Option<f64>,
    pub resolution: Option<String>,
    pub codec: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Transcode job status.
///
/// Transitions are monotonic: queued → processing → {completed, failed}.
/// The guarded update paths in [`crate::queries::transcode_jobs`] are the
/// only way a status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// True for completed/failed; no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = vidmill_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(vidmill_common::Error::invalid_input(format!(
                "Invalid job status: {}",
                s
            ))),
        }
    }
}

/// Transcode job model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscodeJob {
    pub id: JobId,
    pub owner_id: UserId,
    pub video_id: VideoId,
    #[serde(flatten)]
    pub target: TargetSpec,
    pub status: JobStatus,
    /// Observed as 0 until the job completes, then 100. There is no
    /// mid-run sampling from the encoder.
    pub progress: i64,
    /// Set exactly once, when the job completes.
    pub result_filename: Option<String>,
    /// Set exactly once, when the job fails.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_seconds: Option<f64>,
}
