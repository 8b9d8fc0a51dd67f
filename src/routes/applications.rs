/**
 * Application Admin Routes
 * Review queue for project applications
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::{activity, applications, applications::ApplicationStatus, models::Application};
use crate::events::{self, ChangeAction, Collection};
use crate::permissions::Permission;
use crate::routes::{
    api_error, auth::authorize, filter_value, matches_search, parse_id, require_pool,
    store_error, ApiError, SuccessResponse,
};

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub ticket_id: String,
}

impl From<Application> for ApplicationView {
    fn from(application: Application) -> Self {
        Self {
            ticket_id: application.ticket_id(),
            application,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApplicationListResponse {
    pub items: Vec<ApplicationView>,
    pub total: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateApplicationRequest {
    pub status: String,
    pub notes: Option<String>,
}

fn parse_status(raw: &str) -> Result<ApplicationStatus, ApiError> {
    ApplicationStatus::parse(raw).ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid status"))
}

/// GET /api/admin/applications
pub async fn list_applications(
    headers: HeaderMap,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<ApplicationListResponse>, ApiError> {
    authorize(&headers, Permission::ApplicationsRead)?;
    let status = filter_value(&query.status).map(parse_status).transpose()?;
    let pool = require_pool()?;

    let search = filter_value(&query.search);
    let items: Vec<ApplicationView> = applications::list(&pool, status)
        .await
        .map_err(|e| store_error(e, "Application"))?
        .into_iter()
        .filter(|a| {
            matches_search(search, &[a.name.as_str(), a.email.as_str(), a.company.as_str()])
        })
        .map(ApplicationView::from)
        .collect();

    let total = items.len();
    Ok(Json(ApplicationListResponse { items, total }))
}

/// GET /api/admin/applications/{id}
pub async fn get_application(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApplicationView>, ApiError> {
    authorize(&headers, Permission::ApplicationsRead)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    let application = applications::get(&pool, id)
        .await
        .map_err(|e| store_error(e, "Application"))?;
    Ok(Json(application.into()))
}

/// PATCH /api/admin/applications/{id}
pub async fn update_application(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<UpdateApplicationRequest>,
) -> Result<Json<ApplicationView>, ApiError> {
    let principal = authorize(&headers, Permission::ApplicationsEdit)?;
    let id = parse_id(&id)?;
    let status = parse_status(&payload.status)?;
    let pool = require_pool()?;

    let application =
        applications::update_status(&pool, id, status, payload.notes.as_deref(), &principal.email)
            .await
            .map_err(|e| store_error(e, "Application"))?;

    tracing::info!(application_id = %id, status = status.as_str(), by = %principal.email, "Application updated");
    activity::record(
        &pool,
        "application_updated",
        json!({ "applicationId": id, "status": status.as_str() }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Applications, ChangeAction::Updated, id.to_string());

    Ok(Json(application.into()))
}

/// DELETE /api/admin/applications/{id}
pub async fn delete_application(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let principal = authorize(&headers, Permission::ApplicationsDelete)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    applications::delete(&pool, id)
        .await
        .map_err(|e| store_error(e, "Application"))?;

    tracing::info!(application_id = %id, by = %principal.email, "Application deleted");
    activity::record(
        &pool,
        "application_deleted",
        json!({ "applicationId": id }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Applications, ChangeAction::Deleted, id.to_string());

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::routes::test_support::{send, token_for};
    use axum::http::Method;
    use axum::routing::get;
    use axum::Router;

    fn router() -> Router {
        Router::new()
            .route("/api/admin/applications", get(list_applications))
            .route(
                "/api/admin/applications/{id}",
                get(get_application)
                    .patch(update_application)
                    .delete(delete_application),
            )
    }

    #[tokio::test]
    async fn test_list_requires_token() {
        let (status, _) = send(router(), Method::GET, "/api/admin/applications", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_editor_cannot_list_applications() {
        let token = token_for(Role::Editor);
        let (status, body) =
            send(router(), Method::GET, "/api/admin/applications", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Insufficient permissions");
    }

    #[tokio::test]
    async fn test_client_can_read_but_not_delete() {
        let token = token_for(Role::Client);
        let (status, _) =
            send(router(), Method::GET, "/api/admin/applications", Some(&token), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let uri = format!("/api/admin/applications/{}", uuid::Uuid::new_v4());
        let (status, _) = send(router(), Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_status_rejected() {
        let token = token_for(Role::Admin);
        let uri = format!("/api/admin/applications/{}", uuid::Uuid::new_v4());
        let (status, body) = send(
            router(),
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "status": "pending" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid status");
    }

    #[tokio::test]
    async fn test_invalid_status_filter_rejected() {
        let token = token_for(Role::Admin);
        let (status, _) = send(
            router(),
            Method::GET,
            "/api/admin/applications?status=bogus",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_id_rejected() {
        let token = token_for(Role::Admin);
        let (status, _) = send(
            router(),
            Method::GET,
            "/api/admin/applications/not-a-uuid",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
