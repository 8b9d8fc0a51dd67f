use serde_json::Value;
use sqlx::{types::Json, PgPool};

use super::models::ActivityEntry;
use super::StoreError;

/// Appends an audit entry. Failures are logged and swallowed; the audit trail
/// never blocks the action it describes.
pub async fn record(pool: &PgPool, action: &str, details: Value, user_id: Option<&str>) {
    let result = sqlx::query("INSERT INTO activity_log (action, details, user_id) VALUES ($1, $2, $3)")
        .bind(action)
        .bind(Json(&details))
        .bind(user_id)
        .execute(pool)
        .await;
    if let Err(e) = result {
        tracing::warn!(action, error = %e, "Failed to record activity");
    }
}

pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<ActivityEntry>, StoreError> {
    let rows = sqlx::query_as::<_, ActivityEntry>(
        "SELECT id, action, details, user_id, created_at FROM activity_log \
         ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
