/**
 * Public Form Routes
 * Contact and project application submissions
 */
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo},
    http::StatusCode,
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::db::{
    activity, applications, contacts,
    models::{ticket_id, NewApplication, NewContact},
    settings,
};
use crate::events::{self, ChangeAction, Collection};
use crate::routes::{api_error, auth::check_rate_limit, require_pool, store_error, ApiError};

/// One submission per form, per IP, per window
const FORM_RATE_WINDOW_SECS: i64 = 10;

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub subject: String,
    pub message: String,
    pub consent: bool,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplicationForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub project_type: String,
    pub budget: String,
    pub timeline: String,
    pub brief: String,
    pub consent: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub success: bool,
    pub message: String,
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
}

fn all_present(fields: &[&str]) -> bool {
    fields.iter().all(|f| !f.trim().is_empty())
}

fn check_email(email: &str) -> Result<(), ApiError> {
    if !is_valid_email(email) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid email address"));
    }
    Ok(())
}

pub fn validate_contact(form: ContactForm) -> Result<NewContact, ApiError> {
    let required = [form.name.as_str(), form.email.as_str(), form.message.as_str()];
    if !all_present(&required) || !form.consent {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing required fields"));
    }
    let email = form.email.trim().to_string();
    check_email(&email)?;

    Ok(NewContact {
        name: form.name.trim().to_string(),
        email,
        phone: form.phone.trim().to_string(),
        company: form.company.trim().to_string(),
        subject: form.subject.trim().to_string(),
        message: form.message.trim().to_string(),
    })
}

pub fn validate_application(form: ApplicationForm) -> Result<NewApplication, ApiError> {
    let required = [
        form.name.as_str(),
        form.email.as_str(),
        form.project_type.as_str(),
        form.budget.as_str(),
        form.timeline.as_str(),
        form.brief.as_str(),
    ];
    if !all_present(&required) || !form.consent {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing required fields"));
    }
    let email = form.email.trim().to_string();
    check_email(&email)?;

    Ok(NewApplication {
        name: form.name.trim().to_string(),
        email,
        phone: form.phone.trim().to_string(),
        company: form.company.trim().to_string(),
        project_type: form.project_type.trim().to_string(),
        budget: form.budget.trim().to_string(),
        timeline: form.timeline.trim().to_string(),
        brief: form.brief.trim().to_string(),
    })
}

/// Body errors come back as the form's own 400s instead of axum's 422.
fn form_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(form)) => Ok(form),
        Err(JsonRejection::JsonDataError(e)) => {
            tracing::debug!(error = %e, "Form body has mistyped fields");
            Err(api_error(StatusCode::BAD_REQUEST, "Missing required fields"))
        }
        Err(e) => {
            tracing::debug!(error = %e, "Unreadable form body");
            Err(api_error(StatusCode::BAD_REQUEST, "Invalid request body"))
        }
    }
}

/// Reads `features.<flag>` from site settings. Missing flags count as enabled.
async fn form_enabled(pool: &PgPool, flag: &str) -> bool {
    match settings::get(pool).await {
        Ok(doc) => doc["features"][flag].as_bool().unwrap_or(true),
        Err(e) => {
            tracing::warn!(flag, error = %e, "Could not read form feature flag");
            true
        }
    }
}

/// POST /api/contact
pub async fn submit_contact(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let new_contact = validate_contact(form_body(payload)?)?;

    if !check_rate_limit("contact", &addr.ip().to_string(), FORM_RATE_WINDOW_SECS).await {
        return Err(api_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        ));
    }

    let pool = require_pool()?;
    if !form_enabled(&pool, "contactFormEnabled").await {
        return Err(api_error(StatusCode::FORBIDDEN, "Contact form is disabled"));
    }

    let contact = contacts::insert(&pool, &new_contact)
        .await
        .map_err(|e| store_error(e, "Contact"))?;

    tracing::info!(contact_id = %contact.id, "Contact form submitted");
    activity::record(
        &pool,
        "contact_submitted",
        json!({ "contactId": contact.id, "email": contact.email }),
        None,
    )
    .await;
    events::publish(Collection::Contacts, ChangeAction::Created, contact.id.to_string());

    Ok(Json(SubmissionResponse {
        success: true,
        message: "Contact form submitted successfully".to_string(),
        id: contact.id,
        ticket_id: None,
    }))
}

/// POST /api/application
pub async fn submit_application(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<ApplicationForm>, JsonRejection>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let new_application = validate_application(form_body(payload)?)?;

    if !check_rate_limit("application", &addr.ip().to_string(), FORM_RATE_WINDOW_SECS).await {
        return Err(api_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        ));
    }

    let pool = require_pool()?;
    if !form_enabled(&pool, "applicationsEnabled").await {
        return Err(api_error(StatusCode::FORBIDDEN, "Applications are closed"));
    }

    let application = applications::insert(&pool, &new_application)
        .await
        .map_err(|e| store_error(e, "Application"))?;

    let ticket = ticket_id(&application.id);
    tracing::info!(application_id = %application.id, ticket = %ticket, "Application submitted");
    activity::record(
        &pool,
        "application_submitted",
        json!({ "applicationId": application.id, "ticketId": ticket }),
        None,
    )
    .await;
    events::publish(
        Collection::Applications,
        ChangeAction::Created,
        application.id.to_string(),
    );

    Ok(Json(SubmissionResponse {
        success: true,
        message: "Application submitted successfully".to_string(),
        id: application.id,
        ticket_id: Some(ticket),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    fn forms_router() -> Router {
        Router::new()
            .route("/api/contact", post(submit_contact))
            .route("/api/application", post(submit_application))
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345))))
    }

    async fn post_json(uri: &str, json: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap();
        let res = forms_router().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    fn application() -> serde_json::Value {
        json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "projectType": "web",
            "budget": "5k-10k",
            "timeline": "1-3 months",
            "brief": "A company site with a news section.",
            "consent": true
        })
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("@c.de"));
    }

    #[tokio::test]
    async fn test_contact_missing_message_rejected_before_database() {
        let (status, body) = post_json(
            "/api/contact",
            json!({ "name": "Ada", "email": "ada@example.com", "consent": true }),
        )
        .await;
        // 400 rather than 503 proves the database was never reached.
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn test_contact_without_consent_rejected() {
        let (status, _) = post_json(
            "/api/contact",
            json!({ "name": "Ada", "email": "ada@example.com", "message": "Hi" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_contact_bad_email_rejected() {
        let (status, body) = post_json(
            "/api/contact",
            json!({ "name": "Ada", "email": "ada-at-example", "message": "Hi", "consent": true }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid email address");
    }

    #[tokio::test]
    async fn test_valid_contact_reaches_database_layer() {
        let (status, _) = post_json(
            "/api/contact",
            json!({ "name": "Ada", "email": "ada@example.com", "message": "Hi", "consent": true }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_contact_mistyped_field_is_a_missing_field() {
        let (status, body) = post_json(
            "/api/contact",
            json!({ "name": "Ada", "email": "ada@example.com", "message": 7, "consent": true }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn test_application_malformed_json_rejected() {
        let req = Request::post("/api/application")
            .header("content-type", "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let res = forms_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let mut body = application();
        body["consent"] = json!("yes");
        let (status, body) = post_json("/api/application", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn test_application_missing_brief_rejected() {
        let mut body = application();
        body["brief"] = json!("   ");
        let (status, _) = post_json("/api/application", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_well_formed_application_maps_to_one_record() {
        let form: ApplicationForm = serde_json::from_value(application()).unwrap();
        let new = validate_application(form).unwrap();
        assert_eq!(new.name, "Ada Lovelace");
        assert_eq!(new.project_type, "web");
        assert_eq!(new.phone, "");
    }

    #[test]
    fn test_contact_fields_are_trimmed() {
        let form = ContactForm {
            name: "  Ada ".to_string(),
            email: " ada@example.com ".to_string(),
            message: " Hello ".to_string(),
            consent: true,
            ..Default::default()
        };
        let new = validate_contact(form).unwrap();
        assert_eq!(new.name, "Ada");
        assert_eq!(new.email, "ada@example.com");
        assert_eq!(new.message, "Hello");
    }
}
