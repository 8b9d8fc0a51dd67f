use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Contact, NewContact};
use super::StoreError;

const COLUMNS: &str =
    "id, name, email, phone, company, subject, message, status, read, notes, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStatus {
    New,
    Read,
    Replied,
    Archived,
}

impl ContactStatus {
    pub const ALL: [ContactStatus; 4] = [
        ContactStatus::New,
        ContactStatus::Read,
        ContactStatus::Replied,
        ContactStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Read => "read",
            ContactStatus::Replied => "replied",
            ContactStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

pub async fn insert(pool: &PgPool, new: &NewContact) -> Result<Contact, StoreError> {
    let row = sqlx::query_as::<_, Contact>(&format!(
        r#"
        INSERT INTO contacts (name, email, phone, company, subject, message, status, read)
        VALUES ($1, $2, $3, $4, $5, $6, 'new', false)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.phone)
    .bind(&new.company)
    .bind(&new.subject)
    .bind(&new.message)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn list(pool: &PgPool) -> Result<Vec<Contact>, StoreError> {
    let rows = sqlx::query_as::<_, Contact>(&format!(
        "SELECT {COLUMNS} FROM contacts ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Contact, StoreError> {
    sqlx::query_as::<_, Contact>(&format!("SELECT {COLUMNS} FROM contacts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound)
}

/// Leaves fields passed as `None` unchanged.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    status: Option<ContactStatus>,
    read: Option<bool>,
    notes: Option<&str>,
) -> Result<Contact, StoreError> {
    sqlx::query_as::<_, Contact>(&format!(
        r#"
        UPDATE contacts
        SET status = COALESCE($2, status),
            read = COALESCE($3, read),
            notes = COALESCE($4, notes),
            updated_at = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status.map(|s| s.as_str()))
    .bind(read)
    .bind(notes)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

/// (total, unread)
pub async fn counts(pool: &PgPool) -> Result<(i64, i64), StoreError> {
    let row: (i64, i64) =
        sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE NOT read) FROM contacts")
            .fetch_one(pool)
            .await?;
    Ok(row)
}

pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Contact>, StoreError> {
    let rows = sqlx::query_as::<_, Contact>(&format!(
        "SELECT {COLUMNS} FROM contacts ORDER BY created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_status_parse() {
        assert_eq!(ContactStatus::parse("replied"), Some(ContactStatus::Replied));
        assert_eq!(ContactStatus::parse("REPLIED"), None);
    }
}
