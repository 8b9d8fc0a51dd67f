use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::models::{Page, PageSections};
use super::StoreError;

pub async fn get_sections(pool: &PgPool, page: &str) -> Result<PageSections, StoreError> {
    let row = sqlx::query_as::<_, Page>(
        "SELECT page, sections, created_at, updated_at FROM pages WHERE page = $1",
    )
    .bind(page)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|p| p.sections.0).unwrap_or_default())
}

/// Writes `sections[section_id] = media_id`, creating the page row on first use.
/// jsonb `||` replaces an existing key, so the latest assignment wins.
pub async fn assign_section(
    pool: &PgPool,
    page: &str,
    section_id: &str,
    media_id: Uuid,
) -> Result<PageSections, StoreError> {
    let mut entry = PageSections::default();
    entry.assign(section_id, media_id);

    let row = sqlx::query_as::<_, Page>(
        r#"
        INSERT INTO pages (page, sections, created_at, updated_at)
        VALUES ($1, $2, now(), now())
        ON CONFLICT (page) DO UPDATE SET
            sections = pages.sections || EXCLUDED.sections,
            updated_at = now()
        RETURNING page, sections, created_at, updated_at
        "#,
    )
    .bind(page)
    .bind(Json(&entry))
    .fetch_one(pool)
    .await?;
    Ok(row.sections.0)
}

pub async fn unassign_section(
    pool: &PgPool,
    page: &str,
    section_id: &str,
) -> Result<PageSections, StoreError> {
    let row = sqlx::query_as::<_, Page>(
        r#"
        UPDATE pages
        SET sections = sections - $2, updated_at = now()
        WHERE page = $1
        RETURNING page, sections, created_at, updated_at
        "#,
    )
    .bind(page)
    .bind(section_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)?;
    Ok(row.sections.0)
}
