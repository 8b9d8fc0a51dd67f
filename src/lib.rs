//! Consultancy Backend - content API, public forms and admin backend for the marketing site

pub mod config;
pub mod db;
pub mod events;
pub mod logging;
pub mod permissions;
pub mod routes;
pub mod site;
pub mod storage;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::CONFIG;
use crate::storage::{BlobStore, STORAGE};

/// Body cap for everything except the upload routes
const API_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("JWT_SECRET must be set to a secure, unique value in production")]
    InsecureJwtSecret,
    #[error("invalid HOST/PORT configuration: {0}")]
    BindAddress(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect()
}

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN, then SITE_URL.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .map(|s| parse_origins(&s))
        .filter(|origins| !origins.is_empty())
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .map(|s| parse_origins(&s))
                .filter(|origins| !origins.is_empty())
        })
        .unwrap_or_else(|| {
            parse_origins(&format!(
                "{},http://localhost:3000,http://127.0.0.1:3000",
                CONFIG.site_url
            ))
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Public site surface: forms, news, settings, catalog, page sections.
fn public_routes() -> Router {
    Router::new()
        .route("/api/contact", post(routes::forms::submit_contact))
        .route("/api/application", post(routes::forms::submit_application))
        .route("/api/news", get(routes::news::list_published))
        .route("/api/news/{id}", get(routes::news::get_published))
        .route("/news/rss.xml", get(routes::rss::rss_feed))
        .route("/api/settings", get(routes::settings::get_settings))
        .route("/api/pages/{page}/sections", get(routes::pages::get_page_sections))
        .route("/api/site/pages", get(routes::site::pages))
        .route("/api/site/pricing", get(routes::site::pricing))
        .route("/api/site/navigation", get(routes::site::navigation))
        .route("/api/site/sections", get(routes::site::sections))
        .route("/api/logs", post(routes::logs::receive_client_logs))
}

fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/verify", post(routes::auth::verify_token))
        .route("/api/auth/refresh", post(routes::auth::refresh))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/password", post(routes::auth::change_password))
}

fn admin_routes() -> Router {
    Router::new()
        .route("/api/admin/dashboard", get(routes::dashboard::dashboard))
        .route("/api/admin/events", get(routes::events::change_feed))
        .route(
            "/api/admin/applications",
            get(routes::applications::list_applications),
        )
        .route(
            "/api/admin/applications/{id}",
            get(routes::applications::get_application)
                .patch(routes::applications::update_application)
                .delete(routes::applications::delete_application),
        )
        .route("/api/admin/contacts", get(routes::contacts::list_contacts))
        .route(
            "/api/admin/contacts/{id}",
            get(routes::contacts::get_contact)
                .patch(routes::contacts::update_contact)
                .delete(routes::contacts::delete_contact),
        )
        .route(
            "/api/admin/news",
            get(routes::news::list_articles).post(routes::news::create_article),
        )
        .route(
            "/api/admin/news/{id}",
            get(routes::news::get_article)
                .patch(routes::news::update_article)
                .delete(routes::news::delete_article),
        )
        .route("/api/admin/media", get(routes::media::list_media))
        .route(
            "/api/admin/media/file",
            delete(routes::upload::delete_public_file),
        )
        .route(
            "/api/admin/media/{id}",
            get(routes::media::get_media)
                .patch(routes::media::update_media)
                .delete(routes::media::delete_media),
        )
        .route(
            "/api/admin/pages/{page}/sections/{section_id}",
            put(routes::pages::assign_section).delete(routes::pages::unassign_section),
        )
        .route(
            "/api/admin/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/api/admin/users/{id}",
            get(routes::users::get_user)
                .patch(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route(
            "/api/admin/roles",
            get(routes::roles::list_roles).post(routes::roles::create_role),
        )
        .route(
            "/api/admin/roles/{id}",
            put(routes::roles::update_role).delete(routes::roles::delete_role),
        )
        .route("/api/admin/permissions", get(routes::roles::list_permissions))
        .route("/api/admin/settings", patch(routes::settings::update_settings))
}

fn health_routes() -> Router {
    Router::new()
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/storage", get(routes::health::health_storage))
        .route("/health/ready", get(routes::health::health_ready))
}

/// Multipart uploads get their own, larger body cap.
fn upload_routes() -> Router {
    Router::new()
        .route("/api/admin/media", post(routes::media::upload_media))
        .route("/api/upload", post(routes::upload::upload_file))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(CONFIG.max_upload_bytes))
}

/// Stored files served straight from disk.
fn file_routes() -> Router {
    let mut router = Router::new();
    if let BlobStore::Local(store) = STORAGE.primary() {
        router = router.nest_service("/uploads", ServeDir::new(store.root()));
    }
    if let Some(mirror) = STORAGE.mirror() {
        router = router.nest_service("/images", ServeDir::new(mirror.root()));
    }
    router
}

/// Create and configure the application router.
pub fn create_app() -> Router {
    let cors = configure_cors();
    tracing::info!("CORS configured");

    let api = Router::new()
        .merge(public_routes())
        .merge(auth_routes())
        .merge(admin_routes())
        .merge(health_routes())
        // Global 2 MB request body cap for JSON endpoints
        .layer(RequestBodyLimitLayer::new(API_BODY_LIMIT));

    Router::new()
        .merge(api)
        .merge(upload_routes())
        .merge(file_routes())
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        .layer(cors)
}

fn check_production_config() -> Result<(), StartupError> {
    if !CONFIG.is_production() {
        return Ok(());
    }
    if CONFIG.uses_default_jwt_secret() {
        return Err(StartupError::InsecureJwtSecret);
    }

    let admin_password_set =
        std::env::var("ADMIN_HASH_PASSWORD").is_ok() || std::env::var("ADMIN_PASSWORD").is_ok();
    if CONFIG.admin_email == "admin@example.com" {
        tracing::warn!(
            "SECURITY: ADMIN_EMAIL is using an insecure default. \
             Set ADMIN_EMAIL to a real address."
        );
    }
    if CONFIG.database_url.is_none() && !admin_password_set {
        tracing::warn!(
            "SECURITY: running without a database and without ADMIN_HASH_PASSWORD. \
             Set ADMIN_HASH_PASSWORD to a bcrypt hash of a strong password."
        );
    }
    Ok(())
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    // Held for the whole process; dropping them loses buffered log lines.
    let _log_guards = logging::init();

    routes::health::init_start_time();
    check_production_config()?;

    if CONFIG.database_url.is_some() {
        match db::init_pool(None).await {
            Ok(pool) => {
                if let Err(e) = db::run_migrations(&pool).await {
                    tracing::error!(error = %e, "Failed to run database migrations");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to initialize database pool. Continuing without database.");
            }
        }
    } else {
        tracing::info!("DATABASE_URL not set. Running with the env-configured admin only.");
    }

    tracing::info!(
        backend = STORAGE.primary().backend(),
        mirror = STORAGE.mirror().is_some(),
        "Media storage configured"
    );

    let app = create_app();

    let addr: SocketAddr = format!("{}:{}", CONFIG.host, CONFIG.port)
        .parse()
        .map_err(|_| StartupError::BindAddress(format!("{}:{}", CONFIG.host, CONFIG.port)))?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_create_app_returns_router() {
        let _app = create_app();
    }

    #[test]
    fn test_parse_origins_skips_blanks() {
        let origins = parse_origins("https://a.example, ,https://b.example");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "https://a.example");
    }

    #[test]
    fn test_parse_origins_blank_value_is_empty() {
        assert!(parse_origins("").is_empty());
        assert!(parse_origins(" , ").is_empty());
    }

    #[tokio::test]
    async fn test_admin_routes_are_wired() {
        let req = Request::get("/api/admin/applications")
            .body(Body::empty())
            .unwrap();
        let res = create_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let res = create_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_json_body_limit_applies_outside_uploads() {
        let big = vec![b'a'; API_BODY_LIMIT + 1];
        let req = Request::post("/api/logs")
            .header("content-type", "application/json")
            .header("content-length", big.len())
            .body(Body::from(big))
            .unwrap();
        let res = create_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
