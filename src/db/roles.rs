use sqlx::PgPool;
use uuid::Uuid;

use super::models::CustomRole;
use super::StoreError;

const COLUMNS: &str = "id, name, description, permissions, created_at, updated_at";

pub async fn list(pool: &PgPool) -> Result<Vec<CustomRole>, StoreError> {
    let rows = sqlx::query_as::<_, CustomRole>(&format!(
        "SELECT {COLUMNS} FROM roles ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn insert(
    pool: &PgPool,
    name: &str,
    description: &str,
    permissions: &[String],
) -> Result<CustomRole, StoreError> {
    sqlx::query_as::<_, CustomRole>(&format!(
        "INSERT INTO roles (name, description, permissions) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
    ))
    .bind(name)
    .bind(description)
    .bind(permissions)
    .fetch_one(pool)
    .await
    .map_err(|e| StoreError::from_write(e, "role name"))
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    description: &str,
    permissions: &[String],
) -> Result<CustomRole, StoreError> {
    sqlx::query_as::<_, CustomRole>(&format!(
        r#"
        UPDATE roles SET name = $2, description = $3, permissions = $4, updated_at = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(permissions)
    .fetch_optional(pool)
    .await
    .map_err(|e| StoreError::from_write(e, "role name"))?
    .ok_or(StoreError::NotFound)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}
