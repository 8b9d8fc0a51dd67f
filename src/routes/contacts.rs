/**
 * Contact Admin Routes
 * Inbox for contact form messages
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::{activity, contacts, contacts::ContactStatus, models::Contact};
use crate::events::{self, ChangeAction, Collection};
use crate::permissions::Permission;
use crate::routes::{
    api_error, auth::authorize, filter_value, matches_search, parse_id, require_pool,
    store_error, ApiError, SuccessResponse,
};

#[derive(Debug, Default, Deserialize)]
pub struct ContactListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub unread: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ContactListResponse {
    pub items: Vec<Contact>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateContactRequest {
    pub status: Option<String>,
    pub read: Option<bool>,
    pub notes: Option<String>,
}

fn parse_status(raw: &str) -> Result<ContactStatus, ApiError> {
    ContactStatus::parse(raw).ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid status"))
}

/// GET /api/admin/contacts
pub async fn list_contacts(
    headers: HeaderMap,
    Query(query): Query<ContactListQuery>,
) -> Result<Json<ContactListResponse>, ApiError> {
    authorize(&headers, Permission::ContactsRead)?;
    let status = filter_value(&query.status).map(parse_status).transpose()?;
    let pool = require_pool()?;

    let search = filter_value(&query.search);
    let items: Vec<Contact> = contacts::list(&pool)
        .await
        .map_err(|e| store_error(e, "Contact"))?
        .into_iter()
        .filter(|c| status.is_none_or(|s| c.status == s.as_str()))
        .filter(|c| query.unread.is_none_or(|unread| c.read != unread))
        .filter(|c| {
            matches_search(
                search,
                &[c.name.as_str(), c.email.as_str(), c.company.as_str(), c.subject.as_str()],
            )
        })
        .collect();

    let total = items.len();
    Ok(Json(ContactListResponse { items, total }))
}

/// GET /api/admin/contacts/{id}
pub async fn get_contact(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Contact>, ApiError> {
    authorize(&headers, Permission::ContactsRead)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    let contact = contacts::get(&pool, id)
        .await
        .map_err(|e| store_error(e, "Contact"))?;
    Ok(Json(contact))
}

/// PATCH /api/admin/contacts/{id}
pub async fn update_contact(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<UpdateContactRequest>,
) -> Result<Json<Contact>, ApiError> {
    let principal = authorize(&headers, Permission::ContactsEdit)?;
    let id = parse_id(&id)?;
    let status = payload.status.as_deref().map(parse_status).transpose()?;
    if status.is_none() && payload.read.is_none() && payload.notes.is_none() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Nothing to update"));
    }
    // Moving a message out of `new` marks it read unless the caller says otherwise.
    let read = payload
        .read
        .or_else(|| status.filter(|s| *s != ContactStatus::New).map(|_| true));
    let pool = require_pool()?;

    let contact = contacts::update(&pool, id, status, read, payload.notes.as_deref())
        .await
        .map_err(|e| store_error(e, "Contact"))?;

    tracing::info!(contact_id = %id, by = %principal.email, "Contact updated");
    activity::record(
        &pool,
        "contact_updated",
        json!({ "contactId": id, "status": contact.status, "read": contact.read }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Contacts, ChangeAction::Updated, id.to_string());

    Ok(Json(contact))
}

/// DELETE /api/admin/contacts/{id}
pub async fn delete_contact(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let principal = authorize(&headers, Permission::ContactsDelete)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    contacts::delete(&pool, id)
        .await
        .map_err(|e| store_error(e, "Contact"))?;

    tracing::info!(contact_id = %id, by = %principal.email, "Contact deleted");
    activity::record(
        &pool,
        "contact_deleted",
        json!({ "contactId": id }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Contacts, ChangeAction::Deleted, id.to_string());

    Ok(Json(SuccessResponse { success: true }))
}
