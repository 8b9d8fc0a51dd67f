//! Database Models - rows of each collection (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Project inquiry submitted through the public application form.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub project_type: String,
    pub budget: String,
    pub timeline: String,
    pub brief: String,
    pub status: String,
    pub notes: String,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Short reference handed back to the applicant, e.g. `APP-1A2B3C4D`.
    pub fn ticket_id(&self) -> String {
        ticket_id(&self.id)
    }
}

pub fn ticket_id(id: &Uuid) -> String {
    let simple = id.simple().to_string();
    format!("APP-{}", simple[..8].to_uppercase())
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub project_type: String,
    pub budget: String,
    pub timeline: String,
    pub brief: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub subject: String,
    pub message: String,
    pub status: String,
    pub read: bool,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub subject: String,
    pub message: String,
}

/// Uploaded file metadata. `public_path` is the local mirror copy, if any.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: Uuid,
    pub name: String,
    pub filename: String,
    pub kind: String,
    pub storage_path: String,
    pub storage_url: String,
    pub public_path: Option<String>,
    pub size: i64,
    pub content_type: String,
    pub category: String,
    pub section_id: Option<String>,
    pub thumbnail: Option<String>,
    pub alt: String,
    pub description: String,
    pub tags: Vec<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Media {
    /// Local mirror first, primary storage otherwise.
    pub fn preferred_url(&self) -> &str {
        match &self.public_path {
            Some(p) if p.starts_with("/images/") => p,
            _ => &self.storage_url,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == "video" || self.content_type.starts_with("video/")
    }
}

#[derive(Debug, Clone)]
pub struct NewMedia {
    pub name: String,
    pub filename: String,
    pub kind: String,
    pub storage_path: String,
    pub storage_url: String,
    pub public_path: Option<String>,
    pub size: i64,
    pub content_type: String,
    pub category: String,
    pub thumbnail: Option<String>,
}

/// Editable media metadata; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPatch {
    pub name: Option<String>,
    pub alt: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub published: Option<bool>,
}

/// `sectionId -> mediaId` for a single page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageSections(pub BTreeMap<String, Uuid>);

impl PageSections {
    /// Points `section_id` at `media_id`, returning whatever it replaced.
    pub fn assign(&mut self, section_id: &str, media_id: Uuid) -> Option<Uuid> {
        self.0.insert(section_id.to_string(), media_id)
    }

    pub fn unassign(&mut self, section_id: &str) -> Option<Uuid> {
        self.0.remove(section_id)
    }

    pub fn get(&self, section_id: &str) -> Option<Uuid> {
        self.0.get(section_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Uuid)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Page {
    pub page: String,
    pub sections: sqlx::types::Json<PageSections>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub status: String,
    pub featured_media: Option<String>,
    pub featured_thumbnail: Option<String>,
    pub tags: Vec<String>,
    pub author: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full set of writable article fields, used for both insert and update.
#[derive(Debug, Clone)]
pub struct NewsDraft {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub status: String,
    pub featured_media: Option<String>,
    pub featured_thumbnail: Option<String>,
    pub tags: Vec<String>,
    pub author: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub phone: String,
    pub department: String,
    pub notes: String,
    pub auth_uids: Vec<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub phone: String,
    pub department: String,
    pub notes: String,
    pub auth_uids: Vec<String>,
}

/// Profile fields of a user; the password never travels through here.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub phone: String,
    pub department: String,
    pub notes: String,
    pub auth_uids: Vec<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRole {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: Uuid,
    pub action: String,
    pub details: serde_json::Value,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
