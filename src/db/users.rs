use sqlx::PgPool;
use uuid::Uuid;

use super::models::{NewUser, User, UserProfile};
use super::StoreError;

const COLUMNS: &str = "id, name, email, password_hash, role, status, phone, department, notes, \
                       auth_uids, last_login_at, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
    Pending,
}

impl UserStatus {
    pub const ALL: [UserStatus; 4] = [
        UserStatus::Active,
        UserStatus::Inactive,
        UserStatus::Suspended,
        UserStatus::Pending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
            UserStatus::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

pub async fn count(pool: &PgPool) -> Result<i64, StoreError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn insert(pool: &PgPool, new: &NewUser) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (name, email, password_hash, role, status, phone, department, notes, auth_uids)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.password_hash)
    .bind(&new.role)
    .bind(&new.status)
    .bind(&new.phone)
    .bind(&new.department)
    .bind(&new.notes)
    .bind(&new.auth_uids)
    .fetch_one(pool)
    .await
    .map_err(|e| StoreError::from_write(e, "email"))
}

pub async fn list(pool: &PgPool) -> Result<Vec<User>, StoreError> {
    let rows = sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, StoreError> {
    let row = sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    profile: &UserProfile,
) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET name = $2, email = $3, role = $4, status = $5, phone = $6, department = $7,
            notes = $8, auth_uids = $9, updated_at = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&profile.name)
    .bind(&profile.email)
    .bind(&profile.role)
    .bind(&profile.status)
    .bind(&profile.phone)
    .bind(&profile.department)
    .bind(&profile.notes)
    .bind(&profile.auth_uids)
    .fetch_optional(pool)
    .await
    .map_err(|e| StoreError::from_write(e, "email"))?
    .ok_or(StoreError::NotFound)
}

pub async fn set_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
    let result =
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub async fn record_login(pool: &PgPool, id: Uuid, ip: &str) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE users SET last_login_at = now(), last_login_ip = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(ip)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}
