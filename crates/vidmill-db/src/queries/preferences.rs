//! User preference query operations.
//!
//! Every account gets a preferences row at creation, so a missing row only
//! means the user id itself is unknown.

use rusqlite::{params, Connection};
use vidmill_common::{Error, Result, UserId};

use crate::models::UserPreferences;

/// Fetch a user's preferences.
pub fn get_preferences(conn: &Connection, user_id: UserId) -> Result<UserPreferences> {
    conn.query_row(
        "SELECT default_format, default_resolution, default_quality,
                notifications_enabled, auto_delete_originals
         FROM user_preferences WHERE user_id = ?",
        [user_id.to_string()],
        |row| {
            Ok(UserPreferences {
                default_format: row.get(0)?,
                default_resolution: row.get(1)?,
                default_quality: row.get(2)?,
                notifications_enabled: row.get(3)?,
                auto_delete_originals: row.get(4)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found("preferences"),
        _ => Error::database(e.to_string()),
    })
}

/// Replace a user's preferences wholesale.
pub fn update_preferences(
    conn: &Connection,
    user_id: UserId,
    prefs: &UserPreferences,
) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE user_preferences
             SET default_format = ?, default_resolution = ?, default_quality = ?,
                 notifications_enabled = ?, auto_delete_originals = ?
             WHERE user_id = ?",
            params![
                prefs.default_format,
                prefs.default_resolution,
                prefs.default_quality,
                prefs.notifications_enabled,
                prefs.auto_delete_originals,
                user_id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::not_found("preferences"));
    }
    Ok(())
}
