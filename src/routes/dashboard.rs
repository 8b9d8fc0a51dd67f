/**
 * Admin Dashboard Route
 * Collection totals and the latest inbound items, trimmed to what the caller may read
 */
use axum::{http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::{
    activity, applications, contacts, media,
    models::{ActivityEntry, Application, Contact},
    news,
};
use crate::permissions::Permission;
use crate::routes::{auth::authorize, require_pool, store_error, ApiError};

const RECENT_LIMIT: usize = 10;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardTotals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applications: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_applications: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_contacts: Option<i64>,
    pub media: i64,
    pub news: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentItem {
    pub kind: &'static str,
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Application> for RecentItem {
    fn from(a: Application) -> Self {
        Self {
            kind: "application",
            id: a.id,
            name: a.name,
            email: a.email,
            status: a.status,
            created_at: a.created_at,
        }
    }
}

impl From<Contact> for RecentItem {
    fn from(c: Contact) -> Self {
        Self {
            kind: "contact",
            id: c.id,
            name: c.name,
            email: c.email,
            status: c.status,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub totals: DashboardTotals,
    pub recent: Vec<RecentItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<Vec<ActivityEntry>>,
}

/// Newest first across both sources, capped at `limit`.
pub fn merge_recent(
    applications: Vec<Application>,
    contacts: Vec<Contact>,
    limit: usize,
) -> Vec<RecentItem> {
    let mut items: Vec<RecentItem> = applications
        .into_iter()
        .map(RecentItem::from)
        .chain(contacts.into_iter().map(RecentItem::from))
        .collect();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items.truncate(limit);
    items
}

/// GET /api/admin/dashboard
pub async fn dashboard(headers: HeaderMap) -> Result<Json<DashboardResponse>, ApiError> {
    let principal = authorize(&headers, Permission::AnalyticsRead)?;
    let pool = require_pool()?;
    let err = |e| store_error(e, "Dashboard");

    let mut totals = DashboardTotals {
        media: media::count(&pool).await.map_err(err)?,
        news: news::count(&pool).await.map_err(err)?,
        ..Default::default()
    };

    let mut recent_applications = Vec::new();
    if principal.can(Permission::ApplicationsRead) {
        let (total, new) = applications::counts(&pool).await.map_err(err)?;
        totals.applications = Some(total);
        totals.new_applications = Some(new);
        recent_applications = applications::recent(&pool, RECENT_LIMIT as i64)
            .await
            .map_err(err)?;
    }

    let mut recent_contacts = Vec::new();
    if principal.can(Permission::ContactsRead) {
        let (total, unread) = contacts::counts(&pool).await.map_err(err)?;
        totals.contacts = Some(total);
        totals.unread_contacts = Some(unread);
        recent_contacts = contacts::recent(&pool, RECENT_LIMIT as i64)
            .await
            .map_err(err)?;
    }

    let activity = if principal.can(Permission::SettingsRead) {
        Some(
            activity::recent(&pool, RECENT_LIMIT as i64)
                .await
                .map_err(err)?,
        )
    } else {
        None
    };

    Ok(Json(DashboardResponse {
        totals,
        recent: merge_recent(recent_applications, recent_contacts, RECENT_LIMIT),
        activity,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::routes::test_support::{send, token_for};
    use axum::http::{Method, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use chrono::Duration;

    fn application(name: &str, minutes_ago: i64) -> Application {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        Application {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: "a@example.com".to_string(),
            phone: String::new(),
            company: String::new(),
            project_type: "web".to_string(),
            budget: String::new(),
            timeline: String::new(),
            brief: String::new(),
            status: "new".to_string(),
            notes: String::new(),
            reviewed_at: None,
            reviewed_by: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn contact(name: &str, minutes_ago: i64) -> Contact {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        Contact {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: "c@example.com".to_string(),
            phone: String::new(),
            company: String::new(),
            subject: String::new(),
            message: String::new(),
            status: "new".to_string(),
            read: false,
            notes: String::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_merge_recent_interleaves_newest_first() {
        let items = merge_recent(
            vec![application("a1", 5), application("a2", 30)],
            vec![contact("c1", 1), contact("c2", 10)],
            3,
        );
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["c1", "a1", "c2"]);
        assert_eq!(items[1].kind, "application");
    }

    #[test]
    fn test_totals_hide_unreadable_counts() {
        let json = serde_json::to_value(DashboardTotals {
            media: 3,
            news: 2,
            ..Default::default()
        })
        .unwrap();
        assert!(json.get("applications").is_none());
        assert_eq!(json["media"], 3);
    }

    #[tokio::test]
    async fn test_client_cannot_view_dashboard() {
        let app = Router::new().route("/api/admin/dashboard", get(dashboard));
        let token = token_for(Role::Client);
        let (status, _) = send(app, Method::GET, "/api/admin/dashboard", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
