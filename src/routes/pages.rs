/**
 * Page Section Routes
 * Resolves and edits which media item fills each named section of a page
 */
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::db::{activity, media, models::PageSections, pages};
use crate::events::{self, ChangeAction, Collection};
use crate::permissions::Permission;
use crate::routes::media::MediaView;
use crate::routes::{
    api_error, auth::authorize_any, parse_id, require_pool, store_error, ApiError,
};

lazy_static::lazy_static! {
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

const EDIT_PERMISSIONS: &[Permission] = &[Permission::ContentWrite, Permission::MediaUse];

pub fn is_valid_slug(value: &str) -> bool {
    value.len() <= 64 && SLUG_REGEX.is_match(value)
}

fn check_slugs(page: &str, section_id: Option<&str>) -> Result<(), ApiError> {
    if !is_valid_slug(page) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid page"));
    }
    if section_id.is_some_and(|s| !is_valid_slug(s)) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid section id"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignSectionRequest {
    pub media_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSectionsResponse {
    pub page: String,
    pub sections: BTreeMap<String, MediaView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub success: bool,
    pub page: String,
    pub section_id: String,
    pub sections: PageSections,
}

/// GET /api/pages/{page}/sections
pub async fn get_page_sections(
    Path(page): Path<String>,
) -> Result<Json<PageSectionsResponse>, ApiError> {
    check_slugs(&page, None)?;
    let pool = require_pool()?;

    let assignments = pages::get_sections(&pool, &page)
        .await
        .map_err(|e| store_error(e, "Page"))?;
    let ids: Vec<Uuid> = assignments.iter().map(|(_, id)| *id).collect();
    let found = media::find_many(&pool, &ids)
        .await
        .map_err(|e| store_error(e, "Media"))?;

    let by_id: BTreeMap<Uuid, _> = found.into_iter().map(|m| (m.id, m)).collect();
    let mut sections = BTreeMap::new();
    for (section_id, media_id) in assignments.iter() {
        // Dangling ids are skipped
        let Some(item) = by_id.get(media_id).cloned() else {
            tracing::debug!(page = %page, section = %section_id, media_id = %media_id, "Assigned media missing");
            continue;
        };
        sections.insert(section_id.clone(), MediaView::from(item));
    }

    Ok(Json(PageSectionsResponse { page, sections }))
}

/// PUT /api/admin/pages/{page}/sections/{section_id}
///
/// Last write wins; the previous occupant loses its section tag unless it
/// has since been tagged with another section.
pub async fn assign_section(
    headers: HeaderMap,
    Path((page, section_id)): Path<(String, String)>,
    Json(payload): Json<AssignSectionRequest>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let principal = authorize_any(&headers, EDIT_PERMISSIONS)?;
    check_slugs(&page, Some(&section_id))?;
    let media_id = parse_id(&payload.media_id)?;
    let pool = require_pool()?;

    media::get(&pool, media_id)
        .await
        .map_err(|e| store_error(e, "Media"))?;

    let previous = pages::get_sections(&pool, &page)
        .await
        .map_err(|e| store_error(e, "Page"))?
        .get(&section_id);

    let sections = pages::assign_section(&pool, &page, &section_id, media_id)
        .await
        .map_err(|e| store_error(e, "Page"))?;

    if let Some(prev) = previous.filter(|prev| *prev != media_id) {
        if let Err(e) = media::clear_section(&pool, prev, &section_id).await {
            tracing::warn!(media_id = %prev, error = %e, "Failed to clear previous section tag");
        }
    }
    media::set_section(&pool, media_id, &section_id)
        .await
        .map_err(|e| store_error(e, "Media"))?;

    tracing::info!(page = %page, section = %section_id, media_id = %media_id, "Section assigned");
    activity::record(
        &pool,
        "section_assigned",
        json!({ "page": page, "sectionId": section_id, "mediaId": media_id }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Pages, ChangeAction::Updated, page.clone());

    Ok(Json(AssignmentResponse {
        success: true,
        page,
        section_id,
        sections,
    }))
}

/// DELETE /api/admin/pages/{page}/sections/{section_id}
pub async fn unassign_section(
    headers: HeaderMap,
    Path((page, section_id)): Path<(String, String)>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let principal = authorize_any(&headers, EDIT_PERMISSIONS)?;
    check_slugs(&page, Some(&section_id))?;
    let pool = require_pool()?;

    let previous = pages::get_sections(&pool, &page)
        .await
        .map_err(|e| store_error(e, "Page"))?
        .get(&section_id);

    let sections = pages::unassign_section(&pool, &page, &section_id)
        .await
        .map_err(|e| store_error(e, "Page"))?;

    if let Some(prev) = previous {
        if let Err(e) = media::clear_section(&pool, prev, &section_id).await {
            tracing::warn!(media_id = %prev, error = %e, "Failed to clear section tag");
        }
    }

    tracing::info!(page = %page, section = %section_id, "Section unassigned");
    activity::record(
        &pool,
        "section_unassigned",
        json!({ "page": page, "sectionId": section_id }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Pages, ChangeAction::Updated, page.clone());

    Ok(Json(AssignmentResponse {
        success: true,
        page,
        section_id,
        sections,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::routes::test_support::{send, token_for};
    use axum::http::Method;
    use axum::routing::{get, put};
    use axum::Router;

    fn router() -> Router {
        Router::new()
            .route("/api/pages/{page}/sections", get(get_page_sections))
            .route(
                "/api/admin/pages/{page}/sections/{section_id}",
                put(assign_section).delete(unassign_section),
            )
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("homepage"));
        assert!(is_valid_slug("hero-background"));
        assert!(!is_valid_slug("Hero"));
        assert!(!is_valid_slug("a--b"));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_reassigning_a_section_overwrites_previous_media() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut sections = PageSections::default();
        assert_eq!(sections.assign("hero-background", first), None);
        assert_eq!(sections.assign("hero-background", second), Some(first));
        assert_eq!(sections.get("hero-background"), Some(second));
    }

    #[tokio::test]
    async fn test_client_cannot_assign_sections() {
        let token = token_for(Role::Client);
        let (status, _) = send(
            router(),
            Method::PUT,
            "/api/admin/pages/homepage/sections/hero-background",
            Some(&token),
            Some(json!({ "mediaId": Uuid::new_v4() })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_editor_assignment_validates_before_database() {
        let token = token_for(Role::Editor);
        let (status, body) = send(
            router(),
            Method::PUT,
            "/api/admin/pages/homepage/sections/Hero_BG",
            Some(&token),
            Some(json!({ "mediaId": Uuid::new_v4() })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid section id");

        let (status, _) = send(
            router(),
            Method::PUT,
            "/api/admin/pages/homepage/sections/hero-background",
            Some(&token),
            Some(json!({ "mediaId": Uuid::new_v4() })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_public_sections_reject_bad_page() {
        let (status, _) = send(router(), Method::GET, "/api/pages/BAD/sections", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
