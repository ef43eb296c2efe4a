//! Database query operations, grouped per table.

pub mod preferences;
pub mod transcode_jobs;
pub mod users;
pub mod videos;

use rusqlite::types::Type;
use uuid::Uuid;

/// Parse a UUID stored as TEXT, surfacing a conversion error rusqlite
/// understands instead of panicking on corrupt rows.
pub(crate) fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse an RFC3339 timestamp column.
pub(crate) fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
