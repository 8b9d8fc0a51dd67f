/**
 * Authentication Routes
 * JWT-based authentication with login, verify, refresh, logout, password
 * change and first-admin registration, plus the permission guard used by
 * every admin handler.
 */
use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::CONFIG;
use crate::db::{self, models::NewUser, tokens, users};
use crate::permissions::{Permission, Role};
use crate::routes::{api_error, store_error, ApiError};

// ============================================================================
// Configuration
// ============================================================================

lazy_static::lazy_static! {
    /// Password hash of the env-configured admin used when no database is available
    pub static ref ADMIN_PASSWORD_HASH: String = {
        if let Ok(hash) = std::env::var("ADMIN_HASH_PASSWORD") {
            hash
        } else if let Ok(plain) = std::env::var("ADMIN_PASSWORD") {
            hash_password_sync(&plain).unwrap_or_default()
        } else {
            hash_password_sync("admin123").unwrap_or_default()
        }
    };

    /// Refresh tokens issued without a database (env admin only)
    pub static ref REFRESH_TOKENS: Arc<RwLock<HashMap<String, RefreshTokenData>>> =
        Arc::new(RwLock::new(HashMap::new()));

    /// Rate limit storage ("scope:ip" -> (last request timestamp, window))
    pub static ref RATE_LIMIT: Arc<RwLock<HashMap<String, (i64, i64)>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Access token expiry in minutes
const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 15;

/// Refresh token expiry in days
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// One login attempt per IP per window
const LOGIN_RATE_WINDOW_SECS: i64 = 60;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Subject of the env-configured admin in no-database mode
const ENV_ADMIN_ID: &str = "env-admin";

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,   // User ID
    pub email: String, // User email
    pub role: String,  // User role
    pub exp: i64,      // Expiry timestamp
    pub iat: i64,      // Issued at timestamp
}

/// Stored refresh token data
#[derive(Debug, Clone)]
pub struct RefreshTokenData {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub expires_at: i64,
    pub revoked: bool,
}

/// Authenticated caller of an admin endpoint.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn can(&self, permission: Permission) -> bool {
        self.role.has(permission)
    }

    /// Database id of the caller; `None` for the env admin.
    pub fn user_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.user_id).ok()
    }
}

/// User info returned to frontend
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
    pub role: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserInfo>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResponse {
    fn failure(error: &str) -> Self {
        Self {
            success: false,
            user: None,
            access_token: None,
            refresh_token: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RegisterResponse {
    fn failure(error: &str) -> Self {
        Self {
            success: false,
            user: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub is_valid: bool,
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResponse {
    fn failure(error: &str) -> Self {
        Self {
            success: false,
            access_token: None,
            refresh_token: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn generate_refresh_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 64)
}

/// SHA-256 of the token, peppered with the refresh secret. Only the hash is stored.
fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(CONFIG.refresh_secret.as_bytes());
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn hash_password_sync(plain: &str) -> Result<String, bcrypt::BcryptError> {
    hash(plain, DEFAULT_COST)
}

/// bcrypt off the async executor.
pub async fn hash_password(plain: String) -> Result<String, ApiError> {
    match tokio::task::spawn_blocking(move || hash_password_sync(&plain)).await {
        Ok(Ok(h)) => Ok(h),
        Ok(Err(e)) => {
            tracing::error!("Failed to hash password: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process password",
            ))
        }
        Err(e) => {
            tracing::error!("spawn_blocking panic during hash: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process password",
            ))
        }
    }
}

async fn password_matches(plain: String, password_hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify(&plain, &password_hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

pub fn create_access_token(
    user_id: &str,
    email: &str,
    role: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES);

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(CONFIG.jwt_secret.as_bytes()),
    )
}

pub fn verify_access_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(CONFIG.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

pub fn principal_from_token(token: &str) -> Result<Principal, ApiError> {
    let claims = verify_access_token(token)
        .map_err(|_| api_error(StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;
    let role = Role::parse(&claims.role)
        .ok_or_else(|| api_error(StatusCode::FORBIDDEN, "Unknown role"))?;
    Ok(Principal {
        user_id: claims.sub,
        email: claims.email,
        role,
    })
}

/// 401 without a valid bearer token.
pub fn authenticate(headers: &HeaderMap) -> Result<Principal, ApiError> {
    let token = extract_bearer_token(headers)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Authorization required"))?;
    principal_from_token(&token)
}

/// 401 without a valid token, 403 when the caller's role lacks `permission`.
pub fn authorize(headers: &HeaderMap, permission: Permission) -> Result<Principal, ApiError> {
    let principal = authenticate(headers)?;
    if !principal.can(permission) {
        tracing::warn!(
            user = %principal.email,
            role = %principal.role,
            permission = %permission,
            "Permission denied"
        );
        return Err(api_error(StatusCode::FORBIDDEN, "Insufficient permissions"));
    }
    Ok(principal)
}

/// Like [`authorize`], but any one of `permissions` suffices.
pub fn authorize_any(headers: &HeaderMap, permissions: &[Permission]) -> Result<Principal, ApiError> {
    let principal = authenticate(headers)?;
    if !permissions.iter().any(|p| principal.can(*p)) {
        tracing::warn!(user = %principal.email, role = %principal.role, "Permission denied");
        return Err(api_error(StatusCode::FORBIDDEN, "Insufficient permissions"));
    }
    Ok(principal)
}

/// Allows one request per `scope` and IP within `window_secs`.
///
/// Stale entries are evicted on every write so the map stays proportional to
/// the number of active callers.
pub async fn check_rate_limit(scope: &str, ip: &str, window_secs: i64) -> bool {
    #[cfg(test)]
    {
        let _ = (scope, ip, window_secs);
        return true; // Bypass in tests so validation paths are exercised
    }

    #[cfg(not(test))]
    {
        let now = Utc::now().timestamp();
        let key = format!("{}:{}", scope, ip);
        let mut limits = RATE_LIMIT.write().await;

        limits.retain(|_, (last, window)| now - *last < *window);

        if let Some((last_request, _)) = limits.get(&key) {
            if now - last_request < window_secs {
                return false;
            }
        }

        limits.insert(key, (now, window_secs));
        true
    }
}

async fn issue_refresh_token(user_id: &str, email: &str, role: &str) -> String {
    let refresh_token = generate_refresh_token();
    let refresh_token_hash = hash_refresh_token(&refresh_token);
    let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);

    match (db::get_pool(), Uuid::parse_str(user_id)) {
        (Some(pool), Ok(uid)) => {
            if let Err(e) = tokens::insert(&pool, uid, &refresh_token_hash, expires_at).await {
                tracing::error!("Failed to persist refresh token: {}", e);
            }
        }
        _ => {
            let mut store = REFRESH_TOKENS.write().await;
            store.insert(
                refresh_token_hash,
                RefreshTokenData {
                    user_id: user_id.to_string(),
                    email: email.to_string(),
                    role: role.to_string(),
                    expires_at: expires_at.timestamp(),
                    revoked: false,
                },
            );
        }
    }

    refresh_token
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/register
/// Creates the first super admin; closed once any user exists
pub async fn register(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    let ip = addr.ip().to_string();

    if !check_rate_limit("register", &ip, LOGIN_RATE_WINDOW_SECS).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RegisterResponse::failure(
                "Too many requests. Please try again later.",
            )),
        );
    }

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(RegisterResponse::failure("Email and password are required")),
        );
    }
    if !email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            Json(RegisterResponse::failure("Invalid email format")),
        );
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            Json(RegisterResponse::failure(
                "Password must be at least 8 characters long",
            )),
        );
    }

    let Some(pool) = db::get_pool() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RegisterResponse::failure("Database not available")),
        );
    };

    match users::count(&pool).await {
        Ok(0) => {}
        Ok(_) => {
            return (
                StatusCode::FORBIDDEN,
                Json(RegisterResponse::failure(
                    "Registration is closed. An admin account already exists.",
                )),
            );
        }
        Err(e) => {
            tracing::error!("Failed to check existing users: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RegisterResponse::failure("Database error")),
            );
        }
    }

    let password_hash = match hash_password(payload.password).await {
        Ok(h) => h,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RegisterResponse::failure("Failed to process password")),
            );
        }
    };

    let name = payload
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    let new_user = NewUser {
        name,
        email: email.clone(),
        password_hash,
        role: Role::SuperAdmin.as_str().to_string(),
        status: users::UserStatus::Active.as_str().to_string(),
        phone: String::new(),
        department: String::new(),
        notes: String::new(),
        auth_uids: vec![],
    };

    match users::insert(&pool, &new_user).await {
        Ok(user) => {
            tracing::info!("Super admin registered: {}", user.email);
            (
                StatusCode::CREATED,
                Json(RegisterResponse {
                    success: true,
                    user: Some(UserInfo {
                        user_id: user.id.to_string(),
                        email: user.email,
                        role: user.role,
                    }),
                    error: None,
                }),
            )
        }
        Err(db::StoreError::Conflict(_)) => (
            StatusCode::CONFLICT,
            Json(RegisterResponse::failure("Email already registered")),
        ),
        Err(e) => {
            tracing::error!("Failed to create admin user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RegisterResponse::failure("Failed to create account")),
            )
        }
    }
}

/// POST /api/auth/login
/// Authenticate user and return tokens
pub async fn login(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let ip = addr.ip().to_string();

    if !check_rate_limit("login", &ip, LOGIN_RATE_WINDOW_SECS).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(LoginResponse::failure(
                "Too many requests. Please try again later.",
            )),
        );
    }

    if payload.email.is_empty() || payload.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(LoginResponse::failure("Email and password are required")),
        );
    }
    if !payload.email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            Json(LoginResponse::failure("Invalid email format")),
        );
    }

    // Users table when a database is configured, env credentials otherwise
    let (user_id, email, role): (String, String, String) = match db::get_pool() {
        Some(pool) => {
            let user = match users::find_by_email(&pool, &payload.email).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    tracing::warn!("Login attempt for unknown user: {}", payload.email);
                    return (
                        StatusCode::UNAUTHORIZED,
                        Json(LoginResponse::failure("Invalid credentials")),
                    );
                }
                Err(e) => {
                    tracing::error!("Database error during login: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(LoginResponse::failure(
                            "Authentication service temporarily unavailable.",
                        )),
                    );
                }
            };

            if user.status != users::UserStatus::Active.as_str() {
                tracing::warn!(status = %user.status, "Login attempt on disabled account: {}", user.email);
                return (
                    StatusCode::FORBIDDEN,
                    Json(LoginResponse::failure("Account is disabled.")),
                );
            }

            if !password_matches(payload.password, user.password_hash.clone()).await {
                tracing::warn!("Failed login attempt for: {}", user.email);
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(LoginResponse::failure("Invalid credentials")),
                );
            }

            if let Err(e) = users::record_login(&pool, user.id, &ip).await {
                tracing::warn!("Failed to record login for {}: {}", user.email, e);
            }

            (user.id.to_string(), user.email, user.role)
        }
        None => {
            let email_matches = payload.email.eq_ignore_ascii_case(&CONFIG.admin_email);
            let password_ok =
                password_matches(payload.password, ADMIN_PASSWORD_HASH.clone()).await;
            if !email_matches || !password_ok {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(LoginResponse::failure("Invalid credentials")),
                );
            }
            (
                ENV_ADMIN_ID.to_string(),
                CONFIG.admin_email.clone(),
                Role::SuperAdmin.as_str().to_string(),
            )
        }
    };

    let access_token = match create_access_token(&user_id, &email, &role) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to create access token: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LoginResponse::failure("Failed to create token")),
            );
        }
    };
    let refresh_token = issue_refresh_token(&user_id, &email, &role).await;

    tracing::info!("Successful login for user: {}", email);

    (
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            user: Some(UserInfo {
                user_id,
                email,
                role,
            }),
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            error: None,
        }),
    )
}

/// POST /api/auth/verify
/// Verify access token and return user info
pub async fn verify_token(headers: HeaderMap) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return (
            StatusCode::OK,
            Json(VerifyResponse {
                success: false,
                is_valid: false,
                user: None,
                error: Some("No authorization token provided".to_string()),
            }),
        );
    };

    match verify_access_token(&token) {
        Ok(claims) => (
            StatusCode::OK,
            Json(VerifyResponse {
                success: true,
                is_valid: true,
                user: Some(UserInfo {
                    user_id: claims.sub,
                    email: claims.email,
                    role: claims.role,
                }),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::debug!("Token verification failed: {}", e);
            (
                StatusCode::OK,
                Json(VerifyResponse {
                    success: false,
                    is_valid: false,
                    user: None,
                    error: Some("Invalid or expired token".to_string()),
                }),
            )
        }
    }
}

/// POST /api/auth/refresh
/// Exchanges a refresh token for a new access token; the refresh token rotates
pub async fn refresh(Json(payload): Json<RefreshRequest>) -> impl IntoResponse {
    if payload.refresh_token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(RefreshResponse::failure("Refresh token is required")),
        );
    }

    let token_hash = hash_refresh_token(&payload.refresh_token);
    let now = Utc::now();

    let owner: Option<(String, String, String)> = match db::get_pool() {
        Some(pool) => match tokens::find_active(&pool, &token_hash).await {
            Ok(Some(owner)) if owner.status == users::UserStatus::Active.as_str() => {
                if let Err(e) = tokens::revoke(&pool, &token_hash).await {
                    tracing::warn!("Failed to revoke rotated refresh token: {}", e);
                }
                Some((owner.user_id.to_string(), owner.email, owner.role))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::error!("DB error during token refresh lookup: {}", e);
                None
            }
        },
        None => {
            let mut store = REFRESH_TOKENS.write().await;
            match store.get_mut(&token_hash) {
                Some(data) if !data.revoked && data.expires_at > now.timestamp() => {
                    data.revoked = true;
                    Some((data.user_id.clone(), data.email.clone(), data.role.clone()))
                }
                _ => None,
            }
        }
    };

    let Some((user_id, email, role)) = owner else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(RefreshResponse::failure("Invalid or expired refresh token")),
        );
    };

    let access_token = match create_access_token(&user_id, &email, &role) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to create access token: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RefreshResponse::failure("Failed to create token")),
            );
        }
    };
    let new_refresh_token = issue_refresh_token(&user_id, &email, &role).await;

    (
        StatusCode::OK,
        Json(RefreshResponse {
            success: true,
            access_token: Some(access_token),
            refresh_token: Some(new_refresh_token),
            error: None,
        }),
    )
}

/// POST /api/auth/logout
/// Revokes the given refresh token, or every token of the caller
pub async fn logout(headers: HeaderMap, Json(payload): Json<LogoutRequest>) -> impl IntoResponse {
    let pool = db::get_pool();

    if let Some(refresh_token) = payload.refresh_token {
        let token_hash = hash_refresh_token(&refresh_token);
        if let Some(ref p) = pool {
            if let Err(e) = tokens::revoke(p, &token_hash).await {
                tracing::warn!("Failed to revoke refresh token: {}", e);
            }
        }
        let mut store = REFRESH_TOKENS.write().await;
        if let Some(data) = store.get_mut(&token_hash) {
            data.revoked = true;
        }
    }

    if let Some(access_token) = payload
        .access_token
        .or_else(|| extract_bearer_token(&headers))
    {
        if let Ok(claims) = verify_access_token(&access_token) {
            if let (Some(p), Ok(uid)) = (pool.as_ref(), Uuid::parse_str(&claims.sub)) {
                if let Err(e) = tokens::revoke_all(p, uid).await {
                    tracing::warn!("Failed to revoke refresh tokens: {}", e);
                }
            }
            let mut store = REFRESH_TOKENS.write().await;
            for data in store.values_mut() {
                if data.user_id == claims.sub {
                    data.revoked = true;
                }
            }
        }
    }

    // Idempotent
    (StatusCode::OK, Json(LogoutResponse { success: true }))
}

/// POST /api/auth/password
/// Change the caller's password; existing refresh tokens are revoked
pub async fn change_password(
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<crate::routes::SuccessResponse>, ApiError> {
    let principal = authenticate(&headers)?;

    if payload.current_password.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Current password is required",
        ));
    }
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters long",
        ));
    }

    let Some(user_id) = principal.user_uuid() else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "This account's password is managed through the environment",
        ));
    };
    let pool = crate::routes::require_pool()?;

    let user = users::get(&pool, user_id)
        .await
        .map_err(|e| store_error(e, "User"))?;
    if !password_matches(payload.current_password, user.password_hash.clone()).await {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Current password is incorrect",
        ));
    }

    let new_hash = hash_password(payload.new_password).await?;
    users::set_password(&pool, user_id, &new_hash)
        .await
        .map_err(|e| store_error(e, "User"))?;
    if let Err(e) = tokens::revoke_all(&pool, user_id).await {
        tracing::warn!("Failed to revoke refresh tokens after password change: {}", e);
    }

    tracing::info!("Password changed for user: {}", user.email);
    Ok(Json(crate::routes::SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn auth_router() -> Router {
        use axum::extract::connect_info::MockConnectInfo;
        Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/verify", post(verify_token))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/logout", post(logout))
            .route("/api/auth/password", post(change_password))
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345))))
    }

    async fn post_json(
        app: Router,
        uri: &str,
        json: &impl serde::Serialize,
        token: Option<&str>,
    ) -> (StatusCode, axum::body::Bytes) {
        let body = Body::from(serde_json::to_vec(json).unwrap());
        let mut req = Request::post(uri).header("content-type", "application/json");
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {}", token));
        }
        let res = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes)
    }

    async fn post_empty(app: Router, uri: &str) -> (StatusCode, axum::body::Bytes) {
        let req = Request::post(uri).body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_verify_access_token_invalid_returns_err() {
        assert!(verify_access_token("invalid.jwt.token").is_err());
    }

    #[test]
    fn test_access_token_round_trip() {
        let token = create_access_token("u-1", "ed@example.com", "editor").unwrap();
        let claims = verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.role, "editor");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_authorize_missing_token_is_unauthorized() {
        let (status, _) = authorize(&HeaderMap::new(), Permission::NewsRead).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_authorize_editor_forbidden_for_applications() {
        let token = create_access_token("u-2", "ed@example.com", "editor").unwrap();
        let (status, _) =
            authorize(&bearer(&token), Permission::ApplicationsRead).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        let principal = authorize(&bearer(&token), Permission::NewsWrite).unwrap();
        assert_eq!(principal.role, Role::Editor);
        assert!(principal.user_uuid().is_none());
    }

    #[test]
    fn test_authorize_unknown_role_forbidden() {
        let token = create_access_token("u-3", "x@example.com", "root").unwrap();
        let (status, _) = authorize(&bearer(&token), Permission::NewsRead).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_refresh_token_hash_is_stable_and_hex() {
        let a = hash_refresh_token("abc");
        assert_eq!(a, hash_refresh_token("abc"));
        assert_ne!(a, hash_refresh_token("abd"));
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_login_empty_email_returns_bad_request() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/login",
            &LoginRequest {
                email: "".to_string(),
                password: "admin123".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_invalid_email_format_returns_bad_request() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/login",
            &LoginRequest {
                email: "no-at-sign".to_string(),
                password: "admin123".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_wrong_credentials_returns_unauthorized() {
        let (status, bytes) = post_json(
            auth_router(),
            "/api/auth/login",
            &LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "wrongpassword".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: LoginResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(!body.success);
        assert!(body.access_token.is_none());
    }

    #[tokio::test]
    async fn test_register_short_password_rejected_before_database() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/register",
            &RegisterRequest {
                email: "first@example.com".to_string(),
                password: "short".to_string(),
                name: None,
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_without_database_is_unavailable() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/register",
            &RegisterRequest {
                email: "first@example.com".to_string(),
                password: "long-enough-password".to_string(),
                name: Some("First".to_string()),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_verify_no_token_returns_error_in_body() {
        let (status, bytes) = post_empty(auth_router(), "/api/auth/verify").await;
        assert_eq!(status, StatusCode::OK);
        let body: VerifyResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(!body.success);
        assert!(!body.is_valid);
    }

    #[tokio::test]
    async fn test_refresh_empty_token_returns_bad_request() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/refresh",
            &RefreshRequest {
                refresh_token: "".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_unknown_token_is_unauthorized() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/refresh",
            &RefreshRequest {
                refresh_token: "not-a-real-token".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_in_memory_refresh_token_rotates() {
        let first = issue_refresh_token(ENV_ADMIN_ID, "admin@example.com", "super_admin").await;

        let (status, bytes) = post_json(
            auth_router(),
            "/api/auth/refresh",
            &RefreshRequest {
                refresh_token: first.clone(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: RefreshResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(body.success);
        assert_ne!(body.refresh_token.as_deref(), Some(first.as_str()));

        // The old token was revoked by the rotation
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/refresh",
            &RefreshRequest {
                refresh_token: first,
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_returns_success() {
        let (status, bytes) = post_json(
            auth_router(),
            "/api/auth/logout",
            &LogoutRequest {
                access_token: None,
                refresh_token: None,
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: LogoutResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(body.success);
    }

    #[tokio::test]
    async fn test_change_password_requires_token() {
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/password",
            &ChangePasswordRequest {
                current_password: "old-password".to_string(),
                new_password: "new-password".to_string(),
            },
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_change_password_rejects_short_password() {
        let token = create_access_token(&Uuid::new_v4().to_string(), "a@b.co", "editor").unwrap();
        let (status, _) = post_json(
            auth_router(),
            "/api/auth/password",
            &ChangePasswordRequest {
                current_password: "old-password".to_string(),
                new_password: "short".to_string(),
            },
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
