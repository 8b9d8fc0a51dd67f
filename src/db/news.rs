use sqlx::PgPool;
use uuid::Uuid;

use super::models::{NewsArticle, NewsDraft};
use super::StoreError;

const COLUMNS: &str = "id, title, content, excerpt, category, status, featured_media, \
                       featured_thumbnail, tags, author, published_at, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsStatus {
    Draft,
    Published,
    Archived,
}

impl NewsStatus {
    pub const ALL: [NewsStatus; 3] = [NewsStatus::Draft, NewsStatus::Published, NewsStatus::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            NewsStatus::Draft => "draft",
            NewsStatus::Published => "published",
            NewsStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

pub const NEWS_CATEGORIES: &[&str] = &["company", "technology", "industry", "announcements"];

pub fn is_valid_category(category: &str) -> bool {
    NEWS_CATEGORIES.contains(&category)
}

pub async fn list(pool: &PgPool, only_published: bool) -> Result<Vec<NewsArticle>, StoreError> {
    let rows = if only_published {
        sqlx::query_as::<_, NewsArticle>(&format!(
            "SELECT {COLUMNS} FROM news_articles WHERE status = 'published' \
             ORDER BY COALESCE(published_at, created_at) DESC"
        ))
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, NewsArticle>(&format!(
            "SELECT {COLUMNS} FROM news_articles ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await?
    };
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<NewsArticle, StoreError> {
    sqlx::query_as::<_, NewsArticle>(&format!(
        "SELECT {COLUMNS} FROM news_articles WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

pub async fn insert(pool: &PgPool, draft: &NewsDraft) -> Result<NewsArticle, StoreError> {
    let row = sqlx::query_as::<_, NewsArticle>(&format!(
        r#"
        INSERT INTO news_articles (title, content, excerpt, category, status, featured_media,
                                   featured_thumbnail, tags, author, published_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(&draft.title)
    .bind(&draft.content)
    .bind(&draft.excerpt)
    .bind(&draft.category)
    .bind(&draft.status)
    .bind(&draft.featured_media)
    .bind(&draft.featured_thumbnail)
    .bind(&draft.tags)
    .bind(&draft.author)
    .bind(draft.published_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn update(pool: &PgPool, id: Uuid, draft: &NewsDraft) -> Result<NewsArticle, StoreError> {
    sqlx::query_as::<_, NewsArticle>(&format!(
        r#"
        UPDATE news_articles
        SET title = $2, content = $3, excerpt = $4, category = $5, status = $6,
            featured_media = $7, featured_thumbnail = $8, tags = $9, author = $10,
            published_at = $11, updated_at = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&draft.title)
    .bind(&draft.content)
    .bind(&draft.excerpt)
    .bind(&draft.category)
    .bind(&draft.status)
    .bind(&draft.featured_media)
    .bind(&draft.featured_thumbnail)
    .bind(&draft.tags)
    .bind(&draft.author)
    .bind(draft.published_at)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM news_articles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn count(pool: &PgPool) -> Result<i64, StoreError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news_articles")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
