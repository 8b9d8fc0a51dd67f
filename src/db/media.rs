use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Media, MediaPatch, NewMedia};
use super::StoreError;

const COLUMNS: &str = "id, name, filename, kind, storage_path, storage_url, public_path, size, \
                       content_type, category, section_id, thumbnail, alt, description, tags, \
                       published, created_at, updated_at";

pub async fn insert(pool: &PgPool, new: &NewMedia) -> Result<Media, StoreError> {
    let row = sqlx::query_as::<_, Media>(&format!(
        r#"
        INSERT INTO media (name, filename, kind, storage_path, storage_url, public_path, size,
                           content_type, category, thumbnail)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(&new.name)
    .bind(&new.filename)
    .bind(&new.kind)
    .bind(&new.storage_path)
    .bind(&new.storage_url)
    .bind(&new.public_path)
    .bind(new.size)
    .bind(&new.content_type)
    .bind(&new.category)
    .bind(&new.thumbnail)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn list(pool: &PgPool) -> Result<Vec<Media>, StoreError> {
    let rows = sqlx::query_as::<_, Media>(&format!(
        "SELECT {COLUMNS} FROM media ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Media, StoreError> {
    find(pool, id).await?.ok_or(StoreError::NotFound)
}

pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Media>, StoreError> {
    let row = sqlx::query_as::<_, Media>(&format!("SELECT {COLUMNS} FROM media WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_many(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Media>, StoreError> {
    let rows = sqlx::query_as::<_, Media>(&format!(
        "SELECT {COLUMNS} FROM media WHERE id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn update(pool: &PgPool, id: Uuid, patch: &MediaPatch) -> Result<Media, StoreError> {
    sqlx::query_as::<_, Media>(&format!(
        r#"
        UPDATE media
        SET name = COALESCE($2, name),
            alt = COALESCE($3, alt),
            description = COALESCE($4, description),
            tags = COALESCE($5, tags),
            category = COALESCE($6, category),
            published = COALESCE($7, published),
            updated_at = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&patch.name)
    .bind(&patch.alt)
    .bind(&patch.description)
    .bind(&patch.tags)
    .bind(&patch.category)
    .bind(patch.published)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

pub async fn set_section(
    pool: &PgPool,
    id: Uuid,
    section_id: &str,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE media SET section_id = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(section_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Clears `section_id` only while it still names `section_id`, so an item
/// that has since moved to another section keeps its tag.
pub async fn clear_section(pool: &PgPool, id: Uuid, section_id: &str) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE media SET section_id = NULL, updated_at = now() WHERE id = $1 AND section_id = $2",
    )
    .bind(id)
    .bind(section_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Removes the metadata row only; stored objects are handled by the caller.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM media WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn count(pool: &PgPool) -> Result<i64, StoreError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn sample(name: &str) -> NewMedia {
        NewMedia {
            name: format!("{}.png", name),
            filename: format!("{}-1700000000000-abc123.png", name),
            kind: "image".to_string(),
            storage_path: format!("media/images/{}.png", name),
            storage_url: format!("/uploads/media/images/{}.png", name),
            public_path: None,
            size: 3,
            content_type: "image/png".to_string(),
            category: "general".to_string(),
            thumbnail: None,
        }
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
    async fn test_delete_removes_row() {
        let Some(pool) = test_pool().await else {
            eprintln!("skipping test_delete_removes_row: DATABASE_URL not set");
            return;
        };
        let item = insert(&pool, &sample("to-delete")).await.unwrap();
        assert!(find(&pool, item.id).await.unwrap().is_some());

        delete(&pool, item.id).await.unwrap();
        assert!(find(&pool, item.id).await.unwrap().is_none());
        assert!(matches!(delete(&pool, item.id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
    async fn test_clear_section_keeps_newer_tag() {
        let Some(pool) = test_pool().await else {
            eprintln!("skipping test_clear_section_keeps_newer_tag: DATABASE_URL not set");
            return;
        };
        let item = insert(&pool, &sample("moved")).await.unwrap();
        set_section(&pool, item.id, "hero-bg").await.unwrap();
        set_section(&pool, item.id, "about-hero").await.unwrap();

        // Displaced from hero-bg after moving on: the about-hero tag stays.
        assert!(!clear_section(&pool, item.id, "hero-bg").await.unwrap());
        let current = get(&pool, item.id).await.unwrap();
        assert_eq!(current.section_id.as_deref(), Some("about-hero"));

        assert!(clear_section(&pool, item.id, "about-hero").await.unwrap());
        assert!(get(&pool, item.id).await.unwrap().section_id.is_none());

        delete(&pool, item.id).await.unwrap();
    }
}
