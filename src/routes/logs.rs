/**
 * Logs Route Handler
 * Endpoint for receiving client logs from the site and admin frontends
 */
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::IntoResponse,
};
use tower_http::request_id::RequestId;

use crate::logging::config::{
    ClientLogBatch, ClientLogEntry, LogLevel, LogResponse, MAX_BATCH_SIZE, MAX_MESSAGE_LEN,
};

/// Cuts `message` to [`MAX_MESSAGE_LEN`] characters.
pub fn truncate_message(message: &str) -> &str {
    match message.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}

/// POST /api/logs - Receive client logs
#[tracing::instrument(skip(logs), fields(batch_size = logs.logs.len()))]
pub async fn receive_client_logs(
    request_id: Option<Extension<RequestId>>,
    Json(logs): Json<ClientLogBatch>,
) -> impl IntoResponse {
    let req_id = request_id
        .as_ref()
        .and_then(|ext| ext.0.header_value().to_str().ok())
        .unwrap_or("unknown");

    let received = logs.logs.len();
    if received > MAX_BATCH_SIZE {
        tracing::warn!(request_id = %req_id, received, "client log batch too large");
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(LogResponse {
                success: false,
                received,
                processed: 0,
                error: Some(format!("At most {} entries per batch", MAX_BATCH_SIZE)),
            }),
        );
    }

    tracing::debug!(request_id = %req_id, batch_size = received, "received client logs");

    for log in &logs.logs {
        emit_client_log(log, req_id);
    }

    (
        StatusCode::ACCEPTED,
        Json(LogResponse {
            success: true,
            received,
            processed: received,
            error: None,
        }),
    )
}

fn emit_client_log(log: &ClientLogEntry, request_id: &str) {
    let span = tracing::info_span!(
        "client_log",
        request_id = %request_id,
        timestamp = %log.timestamp,
        page = log.page.as_deref().unwrap_or(""),
        source = "client",
    );
    let _enter = span.enter();

    let message = truncate_message(&log.message);
    match log.level {
        LogLevel::Trace => tracing::trace!(message = %message, context = ?log.context, metadata = ?log.metadata, "client log"),
        LogLevel::Debug => tracing::debug!(message = %message, context = ?log.context, metadata = ?log.metadata, "client log"),
        LogLevel::Info => tracing::info!(message = %message, context = ?log.context, metadata = ?log.metadata, "client log"),
        LogLevel::Warn => tracing::warn!(message = %message, context = ?log.context, metadata = ?log.metadata, "client log"),
        LogLevel::Error => tracing::error!(message = %message, context = ?log.context, metadata = ?log.metadata, "client log"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::send;
    use axum::http::Method;
    use axum::routing::post;
    use axum::Router;
    use serde_json::json;

    fn router() -> Router {
        Router::new().route("/api/logs", post(receive_client_logs))
    }

    fn entry(level: &str) -> serde_json::Value {
        json!({ "timestamp": "2024-01-01T00:00:00Z", "level": level, "message": "hello" })
    }

    #[test]
    fn test_truncate_message_respects_char_boundaries() {
        let long = "é".repeat(MAX_MESSAGE_LEN + 5);
        assert_eq!(truncate_message(&long).chars().count(), MAX_MESSAGE_LEN);
        assert_eq!(truncate_message("short"), "short");
    }

    #[tokio::test]
    async fn test_accepts_batch() {
        let (status, body) = send(
            router(),
            Method::POST,
            "/api/logs",
            None,
            Some(json!({ "logs": [entry("info"), entry("error")] })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["processed"], 2);
    }

    #[tokio::test]
    async fn test_rejects_oversized_batch() {
        let logs: Vec<_> = (0..=MAX_BATCH_SIZE).map(|_| entry("debug")).collect();
        let (status, body) =
            send(router(), Method::POST, "/api/logs", None, Some(json!({ "logs": logs }))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_rejects_unknown_level() {
        let (status, _) = send(
            router(),
            Method::POST,
            "/api/logs",
            None,
            Some(json!({ "logs": [entry("fatal")] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
