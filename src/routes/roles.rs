/**
 * Role Routes
 * Custom role definitions and the permission vocabulary
 */
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::{activity, models::CustomRole, roles};
use crate::events::{self, ChangeAction, Collection};
use crate::permissions::{unknown_permissions, Permission, Role};
use crate::routes::{
    api_error, auth::authorize, parse_id, require_pool, store_error, ApiError, SuccessResponse,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RoleListResponse {
    pub items: Vec<CustomRole>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionInfo {
    pub id: Permission,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltinRole {
    pub id: Role,
    pub label: &'static str,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCatalog {
    pub permissions: Vec<PermissionInfo>,
    pub roles: Vec<BuiltinRole>,
}

pub fn permission_catalog() -> PermissionCatalog {
    PermissionCatalog {
        permissions: Permission::ALL
            .iter()
            .map(|p| PermissionInfo {
                id: *p,
                name: p.name(),
                description: p.description(),
            })
            .collect(),
        roles: Role::ALL
            .iter()
            .map(|r| BuiltinRole {
                id: *r,
                label: r.label(),
                permissions: r.default_permissions(),
            })
            .collect(),
    }
}

/// Trims the name and rejects empty names or permissions outside the vocabulary.
pub fn validate_role(req: RoleRequest) -> Result<RoleRequest, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Role name is required"));
    }
    if Role::parse(&name).is_some() {
        return Err(api_error(
            StatusCode::CONFLICT,
            "Role name is reserved for a built-in role",
        ));
    }
    let unknown = unknown_permissions(&req.permissions);
    if !unknown.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Unknown permissions: {}", unknown.join(", ")),
        ));
    }
    let mut permissions = req.permissions;
    permissions.sort();
    permissions.dedup();
    Ok(RoleRequest {
        name,
        description: req.description.trim().to_string(),
        permissions,
    })
}

/// GET /api/admin/permissions
pub async fn list_permissions(headers: HeaderMap) -> Result<Json<PermissionCatalog>, ApiError> {
    authorize(&headers, Permission::UsersRead)?;
    Ok(Json(permission_catalog()))
}

/// GET /api/admin/roles
pub async fn list_roles(headers: HeaderMap) -> Result<Json<RoleListResponse>, ApiError> {
    authorize(&headers, Permission::UsersRead)?;
    let pool = require_pool()?;

    let items = roles::list(&pool)
        .await
        .map_err(|e| store_error(e, "Role"))?;
    let total = items.len();
    Ok(Json(RoleListResponse { items, total }))
}

/// POST /api/admin/roles
pub async fn create_role(
    headers: HeaderMap,
    Json(payload): Json<RoleRequest>,
) -> Result<(StatusCode, Json<CustomRole>), ApiError> {
    let principal = authorize(&headers, Permission::RolesAssign)?;
    let req = validate_role(payload)?;
    let pool = require_pool()?;

    let role = roles::insert(&pool, &req.name, &req.description, &req.permissions)
        .await
        .map_err(|e| store_error(e, "Role"))?;

    tracing::info!(role_id = %role.id, name = %role.name, "Role created");
    activity::record(
        &pool,
        "role_created",
        json!({ "roleId": role.id, "name": role.name }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Roles, ChangeAction::Created, role.id.to_string());

    Ok((StatusCode::CREATED, Json(role)))
}

/// PUT /api/admin/roles/{id}
pub async fn update_role(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<RoleRequest>,
) -> Result<Json<CustomRole>, ApiError> {
    let principal = authorize(&headers, Permission::RolesAssign)?;
    let id = parse_id(&id)?;
    let req = validate_role(payload)?;
    let pool = require_pool()?;

    let role = roles::update(&pool, id, &req.name, &req.description, &req.permissions)
        .await
        .map_err(|e| store_error(e, "Role"))?;

    tracing::info!(role_id = %id, "Role updated");
    activity::record(
        &pool,
        "role_updated",
        json!({ "roleId": id, "permissions": role.permissions }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Roles, ChangeAction::Updated, id.to_string());

    Ok(Json(role))
}

/// DELETE /api/admin/roles/{id}
pub async fn delete_role(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let principal = authorize(&headers, Permission::RolesAssign)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    roles::delete(&pool, id)
        .await
        .map_err(|e| store_error(e, "Role"))?;

    tracing::info!(role_id = %id, "Role deleted");
    activity::record(
        &pool,
        "role_deleted",
        json!({ "roleId": id }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Roles, ChangeAction::Deleted, id.to_string());

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{send, token_for};
    use axum::http::Method;
    use axum::routing::{get, put};
    use axum::Router;

    fn router() -> Router {
        Router::new()
            .route("/api/admin/permissions", get(list_permissions))
            .route("/api/admin/roles", get(list_roles).post(create_role))
            .route("/api/admin/roles/{id}", put(update_role).delete(delete_role))
    }

    fn request(name: &str, permissions: &[&str]) -> RoleRequest {
        RoleRequest {
            name: name.to_string(),
            description: String::new(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_validate_role_rejects_unknown_permission() {
        let (status, body) =
            validate_role(request("Reviewer", &["news.read", "news.fly"])).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0.error, "Unknown permissions: news.fly");
    }

    #[test]
    fn test_validate_role_dedups_and_trims() {
        let req = validate_role(request("  Reviewer ", &["news.read", "content.read", "news.read"]))
            .unwrap();
        assert_eq!(req.name, "Reviewer");
        assert_eq!(req.permissions, vec!["content.read", "news.read"]);
    }

    #[test]
    fn test_validate_role_reserves_builtin_names() {
        assert!(validate_role(request("editor", &[])).is_err());
        assert!(validate_role(request("   ", &[])).is_err());
    }

    #[test]
    fn test_permission_catalog_covers_vocabulary() {
        let catalog = permission_catalog();
        assert_eq!(catalog.permissions.len(), Permission::ALL.len());
        assert_eq!(catalog.roles.len(), 4);
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["roles"][0]["id"], "super_admin");
        assert!(json["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["id"] == "applications.read"));
    }

    #[tokio::test]
    async fn test_admin_reads_permission_catalog() {
        let token = token_for(Role::Admin);
        let (status, body) =
            send(router(), Method::GET, "/api/admin/permissions", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["permissions"].is_array());
    }

    #[tokio::test]
    async fn test_admin_cannot_create_roles() {
        let token = token_for(Role::Admin);
        let (status, _) = send(
            router(),
            Method::POST,
            "/api/admin/roles",
            Some(&token),
            Some(json!({ "name": "Reviewer", "permissions": ["news.read"] })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_super_admin_unknown_permission_is_400() {
        let token = token_for(Role::SuperAdmin);
        let (status, _) = send(
            router(),
            Method::POST,
            "/api/admin/roles",
            Some(&token),
            Some(json!({ "name": "Reviewer", "permissions": ["root.everything"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
