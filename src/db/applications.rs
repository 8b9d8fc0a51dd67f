use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Application, NewApplication};
use super::StoreError;

const COLUMNS: &str = "id, name, email, phone, company, project_type, budget, timeline, brief, \
                       status, notes, reviewed_at, reviewed_by, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    New,
    InReview,
    Approved,
    Declined,
    Archived,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::New,
        ApplicationStatus::InReview,
        ApplicationStatus::Approved,
        ApplicationStatus::Declined,
        ApplicationStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::New => "new",
            ApplicationStatus::InReview => "in-review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Declined => "declined",
            ApplicationStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Anything past `new` counts as reviewed.
    pub fn is_review(&self) -> bool {
        !matches!(self, ApplicationStatus::New)
    }
}

pub async fn insert(pool: &PgPool, new: &NewApplication) -> Result<Application, StoreError> {
    let row = sqlx::query_as::<_, Application>(&format!(
        r#"
        INSERT INTO applications (name, email, phone, company, project_type, budget, timeline, brief, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'new')
        RETURNING {COLUMNS}
        "#
    ))
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.phone)
    .bind(&new.company)
    .bind(&new.project_type)
    .bind(&new.budget)
    .bind(&new.timeline)
    .bind(&new.brief)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Newest first, optionally restricted to one status.
pub async fn list(
    pool: &PgPool,
    status: Option<ApplicationStatus>,
) -> Result<Vec<Application>, StoreError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, Application>(&format!(
                "SELECT {COLUMNS} FROM applications WHERE status = $1 ORDER BY created_at DESC"
            ))
            .bind(status.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Application>(&format!(
                "SELECT {COLUMNS} FROM applications ORDER BY created_at DESC"
            ))
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Application, StoreError> {
    sqlx::query_as::<_, Application>(&format!(
        "SELECT {COLUMNS} FROM applications WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: ApplicationStatus,
    notes: Option<&str>,
    reviewer: &str,
) -> Result<Application, StoreError> {
    sqlx::query_as::<_, Application>(&format!(
        r#"
        UPDATE applications
        SET status = $2,
            notes = COALESCE($3, notes),
            reviewed_at = CASE WHEN $4 THEN now() ELSE reviewed_at END,
            reviewed_by = CASE WHEN $4 THEN $5 ELSE reviewed_by END,
            updated_at = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status.as_str())
    .bind(notes)
    .bind(status.is_review())
    .bind(reviewer)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM applications WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// (total, status = 'new')
pub async fn counts(pool: &PgPool) -> Result<(i64, i64), StoreError> {
    let row: (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'new') FROM applications",
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Application>, StoreError> {
    let rows = sqlx::query_as::<_, Application>(&format!(
        "SELECT {COLUMNS} FROM applications ORDER BY created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
