/**
 * Change Feed Route
 * Server-Sent Events stream of collection changes for admin views
 */
use axum::{
    extract::Query,
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::{convert::Infallible, time::Duration};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::events::{self, ChangeEvent, Collection};
use crate::routes::{
    auth::{authenticate, principal_from_token, Principal},
    ApiError,
};

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// EventSource cannot send headers, so the token may ride in the query.
    pub token: Option<String>,
    /// Comma-separated collection names; all readable collections when absent.
    pub collections: Option<String>,
}

pub fn parse_collections(raw: Option<&str>) -> Option<Vec<Collection>> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    Some(raw.split(',').filter_map(|c| Collection::parse(c.trim())).collect())
}

/// Whether `principal` should receive `event` given an optional collection filter.
pub fn is_visible(principal: &Principal, wanted: Option<&[Collection]>, event: &ChangeEvent) -> bool {
    if wanted.is_some_and(|w| !w.contains(&event.collection)) {
        return false;
    }
    principal.can(event.collection.read_permission())
}

/// GET /api/admin/events
pub async fn change_feed(
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let principal = match query.token.as_deref() {
        Some(token) => principal_from_token(token)?,
        None => authenticate(&headers)?,
    };
    let wanted = parse_collections(query.collections.as_deref());

    tracing::debug!(user = %principal.email, "Change feed subscribed");

    let stream = BroadcastStream::new(events::subscribe()).filter_map(move |item| {
        let out = match item {
            Ok(event) if is_visible(&principal, wanted.as_deref(), &event) => {
                match Event::default().event("change").json_data(&event) {
                    Ok(sse) => Some(Ok(sse)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to encode change event");
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Change feed subscriber lagged");
                Some(Ok(Event::default().event("lagged").data(missed.to_string())))
            }
        };
        futures::future::ready(out)
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeAction;
    use crate::permissions::Role;
    use crate::routes::test_support::{send, token_for};
    use axum::http::{Method, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use chrono::Utc;

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            role,
        }
    }

    fn event(collection: Collection) -> ChangeEvent {
        ChangeEvent {
            collection,
            action: ChangeAction::Created,
            id: "x".to_string(),
            at: Utc::now(),
        }
    }

    #[test]
    fn test_editor_does_not_see_application_events() {
        let editor = principal(Role::Editor);
        assert!(!is_visible(&editor, None, &event(Collection::Applications)));
        assert!(!is_visible(&editor, None, &event(Collection::Contacts)));
        assert!(is_visible(&editor, None, &event(Collection::News)));
    }

    #[test]
    fn test_collection_filter() {
        let admin = principal(Role::SuperAdmin);
        let wanted = parse_collections(Some("media, pages,bogus")).unwrap();
        assert_eq!(wanted, vec![Collection::Media, Collection::Pages]);
        assert!(is_visible(&admin, Some(&wanted), &event(Collection::Media)));
        assert!(!is_visible(&admin, Some(&wanted), &event(Collection::Users)));
        assert!(parse_collections(Some("  ")).is_none());
    }

    #[tokio::test]
    async fn test_feed_requires_token() {
        let app = Router::new().route("/api/admin/events", get(change_feed));
        let (status, _) = send(app, Method::GET, "/api/admin/events", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_feed_accepts_query_token() {
        let app = Router::new().route("/api/admin/events", get(change_feed));
        let token = token_for(Role::Editor);
        let req = axum::http::Request::get(format!("/api/admin/events?token={}", token))
            .body(axum::body::Body::empty())
            .unwrap();
        let res = tower::ServiceExt::oneshot(app, req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
    }
}
