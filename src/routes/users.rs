/**
 * User Management Routes
 * Admin and client accounts; passwords are only set on creation
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::{
    activity,
    models::{NewUser, User, UserProfile},
    users::{self, UserStatus},
};
use crate::events::{self, ChangeAction, Collection};
use crate::permissions::{assignment_permission, Permission, Role};
use crate::routes::auth::{authorize, hash_password, Principal, MIN_PASSWORD_LEN};
use crate::routes::forms::is_valid_email;
use crate::routes::{
    api_error, filter_value, matches_search, parse_id, require_pool, store_error, ApiError,
    SuccessResponse,
};

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    /// `admin` for staff roles, `client` for clients
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub items: Vec<User>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
    pub status: Option<String>,
    pub phone: String,
    pub department: String,
    pub notes: String,
    pub auth_uids: Vec<String>,
}

/// Partial profile update. There is deliberately no password field.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
    pub auth_uids: Option<Vec<String>>,
}

pub fn filter_users(items: Vec<User>, query: &UserListQuery) -> Vec<User> {
    let role = filter_value(&query.role);
    let status = filter_value(&query.status);
    let search = filter_value(&query.search);
    let kind = filter_value(&query.kind);

    items
        .into_iter()
        .filter(|u| role.is_none_or(|r| u.role == r))
        .filter(|u| status.is_none_or(|s| u.status == s))
        .filter(|u| match kind {
            Some("admin") => Role::parse(&u.role).is_some_and(|r| r.is_staff()),
            Some("client") => u.role == Role::Client.as_str(),
            _ => true,
        })
        .filter(|u| {
            matches_search(
                search,
                &[u.name.as_str(), u.email.as_str(), u.department.as_str()],
            )
        })
        .collect()
}

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    Role::parse(raw).ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid role"))
}

fn parse_status(raw: &str) -> Result<UserStatus, ApiError> {
    UserStatus::parse(raw).ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid status"))
}

/// Handing out admin roles needs `roles.assign` on top of users.create/edit.
fn check_assignable(principal: &Principal, role: Role) -> Result<(), ApiError> {
    match assignment_permission(role) {
        Some(p) if !principal.can(p) => {
            Err(api_error(StatusCode::FORBIDDEN, "Insufficient permissions to assign role"))
        }
        _ => Ok(()),
    }
}

/// Validates everything except the password hash, which the caller fills in.
pub fn validate_new_user(req: &CreateUserRequest) -> Result<(Role, UserStatus), ApiError> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Name and email are required"));
    }
    if !is_valid_email(req.email.trim()) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid email address"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    let role = parse_role(req.role.as_deref().unwrap_or(Role::Client.as_str()))?;
    let status = parse_status(req.status.as_deref().unwrap_or(UserStatus::Active.as_str()))?;
    Ok((role, status))
}

/// Merges `req` over the stored user. The password hash is never part of it.
pub fn apply_update(existing: &User, req: UpdateUserRequest) -> Result<UserProfile, ApiError> {
    let email = req
        .email
        .map(|e| e.trim().to_string())
        .unwrap_or_else(|| existing.email.clone());
    if !is_valid_email(&email) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid email address"));
    }
    let name = req.name.unwrap_or_else(|| existing.name.clone());
    if name.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Name cannot be empty"));
    }
    let role = match req.role {
        Some(r) => parse_role(&r)?.as_str().to_string(),
        None => existing.role.clone(),
    };
    let status = match req.status {
        Some(s) => parse_status(&s)?.as_str().to_string(),
        None => existing.status.clone(),
    };

    Ok(UserProfile {
        name: name.trim().to_string(),
        email,
        role,
        status,
        phone: req.phone.unwrap_or_else(|| existing.phone.clone()),
        department: req.department.unwrap_or_else(|| existing.department.clone()),
        notes: req.notes.unwrap_or_else(|| existing.notes.clone()),
        auth_uids: req.auth_uids.unwrap_or_else(|| existing.auth_uids.clone()),
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/users
pub async fn list_users(
    headers: HeaderMap,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    authorize(&headers, Permission::UsersRead)?;
    let pool = require_pool()?;

    let items = users::list(&pool)
        .await
        .map_err(|e| store_error(e, "User"))?;
    let items = filter_users(items, &query);
    let total = items.len();
    Ok(Json(UserListResponse { items, total }))
}

/// GET /api/admin/users/{id}
pub async fn get_user(headers: HeaderMap, Path(id): Path<String>) -> Result<Json<User>, ApiError> {
    authorize(&headers, Permission::UsersRead)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    let user = users::get(&pool, id)
        .await
        .map_err(|e| store_error(e, "User"))?;
    Ok(Json(user))
}

/// POST /api/admin/users
pub async fn create_user(
    headers: HeaderMap,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let principal = authorize(&headers, Permission::UsersCreate)?;
    let (role, status) = validate_new_user(&payload)?;
    check_assignable(&principal, role)?;
    let pool = require_pool()?;

    let password_hash = hash_password(payload.password).await?;
    let new_user = NewUser {
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_string(),
        password_hash,
        role: role.as_str().to_string(),
        status: status.as_str().to_string(),
        phone: payload.phone,
        department: payload.department,
        notes: payload.notes,
        auth_uids: payload.auth_uids,
    };

    let user = users::insert(&pool, &new_user)
        .await
        .map_err(|e| store_error(e, "User"))?;

    tracing::info!(user_id = %user.id, role = %user.role, "User created");
    activity::record(
        &pool,
        "user_created",
        json!({ "userId": user.id, "email": user.email, "role": user.role }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Users, ChangeAction::Created, user.id.to_string());

    Ok((StatusCode::CREATED, Json(user)))
}

/// PATCH /api/admin/users/{id}
pub async fn update_user(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let principal = authorize(&headers, Permission::UsersEdit)?;
    let id = parse_id(&id)?;
    if let Some(role) = payload.role.as_deref() {
        check_assignable(&principal, parse_role(role)?)?;
    }
    let pool = require_pool()?;

    let existing = users::get(&pool, id)
        .await
        .map_err(|e| store_error(e, "User"))?;
    // Changing anything about an admin account needs the same right as granting it
    if let Some(current) = Role::parse(&existing.role) {
        check_assignable(&principal, current)?;
    }
    let profile = apply_update(&existing, payload)?;

    let user = users::update_profile(&pool, id, &profile)
        .await
        .map_err(|e| store_error(e, "User"))?;

    tracing::info!(user_id = %id, role = %user.role, status = %user.status, "User updated");
    activity::record(
        &pool,
        "user_updated",
        json!({ "userId": id, "role": user.role, "status": user.status }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Users, ChangeAction::Updated, id.to_string());

    Ok(Json(user))
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let principal = authorize(&headers, Permission::UsersDelete)?;
    let id = parse_id(&id)?;
    if principal.user_uuid() == Some(id) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Cannot delete your own account"));
    }
    let pool = require_pool()?;

    let existing = users::get(&pool, id)
        .await
        .map_err(|e| store_error(e, "User"))?;
    if let Some(current) = Role::parse(&existing.role) {
        check_assignable(&principal, current)?;
    }

    users::delete(&pool, id)
        .await
        .map_err(|e| store_error(e, "User"))?;

    tracing::info!(user_id = %id, "User deleted");
    activity::record(
        &pool,
        "user_deleted",
        json!({ "userId": id, "email": existing.email }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Users, ChangeAction::Deleted, id.to_string());

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::create_access_token;
    use crate::routes::test_support::{send, token_for};
    use axum::http::Method;
    use axum::routing::get;
    use axum::Router;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(name: &str, role: &str, status: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            password_hash: "hash".to_string(),
            role: role.to_string(),
            status: status.to_string(),
            phone: String::new(),
            department: String::new(),
            notes: String::new(),
            auth_uids: Vec::new(),
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn router() -> Router {
        Router::new()
            .route("/api/admin/users", get(list_users).post(create_user))
            .route(
                "/api/admin/users/{id}",
                get(get_user).patch(update_user).delete(delete_user),
            )
    }

    #[test]
    fn test_filter_users_by_kind_and_search() {
        let items = vec![
            user("Ada", "admin", "active"),
            user("Grace", "editor", "inactive"),
            user("Linus", "client", "active"),
        ];
        let staff = filter_users(
            items.clone(),
            &UserListQuery {
                kind: Some("admin".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(staff.len(), 2);

        let found = filter_users(
            items,
            &UserListQuery {
                status: Some("active".to_string()),
                search: Some("LINUS".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Linus");
    }

    #[test]
    fn test_validate_new_user() {
        let mut req = CreateUserRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "short".to_string(),
            ..Default::default()
        };
        assert!(validate_new_user(&req).is_err());

        req.password = "long-enough".to_string();
        let (role, status) = validate_new_user(&req).unwrap();
        assert_eq!(role, Role::Client);
        assert_eq!(status, UserStatus::Active);

        req.role = Some("owner".to_string());
        assert!(validate_new_user(&req).is_err());
    }

    #[test]
    fn test_apply_update_keeps_password_hash_out() {
        let existing = user("Ada", "editor", "active");
        let profile = apply_update(
            &existing,
            UpdateUserRequest {
                status: Some("suspended".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(profile.status, "suspended");
        assert_eq!(profile.role, "editor");
        assert_eq!(profile.email, existing.email);

        let bad = apply_update(
            &existing,
            UpdateUserRequest {
                status: Some("banned".to_string()),
                ..Default::default()
            },
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_update_request_ignores_password() {
        let req: UpdateUserRequest =
            serde_json::from_value(json!({ "name": "Ada", "password": "new-password" })).unwrap();
        assert_eq!(req.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_editor_cannot_list_users() {
        let token = token_for(Role::Editor);
        let (status, _) = send(router(), Method::GET, "/api/admin/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_cannot_create_super_admin() {
        let token = token_for(Role::Admin);
        let (status, _) = send(
            router(),
            Method::POST,
            "/api/admin/users",
            Some(&token),
            Some(json!({
                "name": "Eve",
                "email": "eve@example.com",
                "password": "password123",
                "role": "super_admin"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cannot_delete_self() {
        let id = Uuid::new_v4();
        let token = create_access_token(&id.to_string(), "root@example.com", "super_admin").unwrap();
        let (status, body) = send(
            router(),
            Method::DELETE,
            &format!("/api/admin/users/{}", id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Cannot delete your own account");
    }
}
