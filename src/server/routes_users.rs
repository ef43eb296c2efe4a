//! Per-user preference routes.

use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};

use vidmill_common::{Error, TargetResolution, UserId, VideoFormat};
use vidmill_db::models::UserPreferences;
use vidmill_db::queries::preferences;

use crate::server::{ApiError, AppContext};
use crate::transcode::orchestrator::Principal;

pub fn user_routes() -> Router<AppContext> {
    Router::new().route(
        "/users/:id/preferences",
        get(get_preferences).put(put_preferences),
    )
}

/// Preferences are visible to their owner and to admins only.
fn check_access(principal: Principal, user_id: UserId) -> Result<(), Error> {
    if principal.is_admin || principal.user_id == user_id {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

async fn get_preferences(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<UserId>,
) -> Result<Json<UserPreferences>, ApiError> {
    check_access(principal, id)?;
    let conn = ctx.conn()?;
    Ok(Json(preferences::get_preferences(&conn, id)?))
}

async fn put_preferences(
    State(ctx): State<AppContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<UserId>,
    Json(prefs): Json<UserPreferences>,
) -> Result<Json<UserPreferences>, ApiError> {
    check_access(principal, id)?;

    // Defaults must name a real format and resolution.
    prefs.default_format.parse::<VideoFormat>()?;
    prefs.default_resolution.parse::<TargetResolution>()?;

    let conn = ctx.conn()?;
    preferences::update_preferences(&conn, id, &prefs)?;
    Ok(Json(prefs))
}
