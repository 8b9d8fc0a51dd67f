/**
 * Site Settings Routes
 */
use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::db::{self, activity, settings};
use crate::events::{self, ChangeAction, Collection};
use crate::permissions::Permission;
use crate::routes::{api_error, auth::authorize, require_pool, store_error, ApiError};

/// GET /api/settings - defaults when nothing is stored or no database is configured
pub async fn get_settings() -> Result<Json<Value>, ApiError> {
    let Some(pool) = db::get_pool() else {
        return Ok(Json(settings::default_settings()));
    };
    let doc = settings::get(&pool)
        .await
        .map_err(|e| store_error(e, "Settings"))?;
    Ok(Json(doc))
}

/// PATCH /api/admin/settings - top-level keys of the body replace stored ones
pub async fn update_settings(
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let principal = authorize(&headers, Permission::SettingsWrite)?;
    if !patch.is_object() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Settings must be a JSON object",
        ));
    }
    let pool = require_pool()?;

    let current = settings::get(&pool)
        .await
        .map_err(|e| store_error(e, "Settings"))?;
    let keys: Vec<String> = patch
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    let merged = settings::merge_settings(current, patch);
    let saved = settings::save(&pool, &merged)
        .await
        .map_err(|e| store_error(e, "Settings"))?;

    tracing::info!(keys = ?keys, "Site settings updated");
    activity::record(
        &pool,
        "settings_updated",
        json!({ "keys": keys }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Settings, ChangeAction::Updated, "site");

    Ok(Json(saved))
}
