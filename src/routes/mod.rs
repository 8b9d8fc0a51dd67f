/**
 * Routes Module
 * API route handlers and the helpers they share
 */

pub mod applications;
pub mod auth;
pub mod contacts;
pub mod dashboard;
pub mod events;
pub mod forms;
pub mod health;
pub mod logs;
pub mod media;
pub mod news;
pub mod pages;
pub mod roles;
pub mod rss;
pub mod settings;
pub mod site;
#[cfg(test)]
mod test_support;
pub mod upload;
pub mod users;

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{self, StoreError};

/// Error body returned by every handler
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            message: None,
        }),
    )
}

/// Success response (for delete)
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub fn require_pool() -> Result<Arc<PgPool>, ApiError> {
    db::get_pool().ok_or_else(|| {
        api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
    })
}

/// Maps a store failure to a response, logging anything unexpected.
pub fn store_error(e: StoreError, what: &str) -> ApiError {
    match e {
        StoreError::NotFound => api_error(StatusCode::NOT_FOUND, format!("{} not found", what)),
        StoreError::Conflict(msg) => api_error(StatusCode::CONFLICT, msg),
        StoreError::Database(e) => {
            tracing::error!(resource = what, error = %e, "Database error");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| api_error(StatusCode::BAD_REQUEST, "Invalid id"))
}

/// Treats a missing, blank or `all` filter value as no filter.
pub fn filter_value(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

/// Case-insensitive substring match over any of `fields`. An empty term matches.
pub fn matches_search(term: Option<&str>, fields: &[&str]) -> bool {
    let Some(term) = term else {
        return true;
    };
    let needle = term.to_lowercase();
    fields.iter().any(|f| f.to_lowercase().contains(&needle))
}
