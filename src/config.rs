//! Application configuration, read once from the environment.

use once_cell::sync::Lazy;
use std::path::PathBuf;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

/// Object bucket settings. Present only when `STORAGE_BUCKET` is set.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub api_base: String,
    pub bucket: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_connect_timeout_secs: u64,
    pub db_idle_timeout_secs: u64,
    pub jwt_secret: String,
    pub refresh_secret: String,
    pub admin_email: String,
    pub site_url: String,
    pub site_name: String,
    /// Root of the local primary store, served under `/uploads`.
    pub upload_dir: PathBuf,
    /// Public mirror directory, served under `/images`. `None` disables mirroring.
    pub public_media_dir: Option<PathBuf>,
    pub bucket: Option<BucketConfig>,
    pub max_upload_bytes: usize,
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(fallback)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret = env_or("JWT_SECRET", DEFAULT_JWT_SECRET);
        let refresh_secret = env_or("REFRESH_TOKEN_SECRET", &jwt_secret);

        let bucket = env_opt("STORAGE_BUCKET").map(|bucket| BucketConfig {
            api_base: env_or("STORAGE_API_BASE", "https://firebasestorage.googleapis.com")
                .trim_end_matches('/')
                .to_string(),
            bucket,
            token: env_opt("STORAGE_TOKEN"),
        });

        Self {
            environment: env_or("ENVIRONMENT", "development"),
            host: env_or("HOST", "127.0.0.1"),
            port: env_parse("PORT", 3001),
            database_url: env_opt("DATABASE_URL"),
            db_max_connections: env_parse("DB_POOL_MAX", 10),
            db_min_connections: env_parse("DB_POOL_MIN", 1),
            db_connect_timeout_secs: env_parse("DB_CONNECT_TIMEOUT", 10),
            db_idle_timeout_secs: env_parse("DB_IDLE_TIMEOUT", 300),
            jwt_secret,
            refresh_secret,
            admin_email: env_or("ADMIN_EMAIL", "admin@example.com"),
            site_url: env_or("SITE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            site_name: env_or("SITE_NAME", "Habs Technologies Group"),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            public_media_dir: env_opt("PUBLIC_MEDIA_DIR").map(PathBuf::from),
            bucket,
            max_upload_bytes: env_opt("MAX_UPLOAD_MB")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(200)
                * 1024
                * 1024,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn uses_default_jwt_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);
