/**
 * Media Library Routes
 * Dual-storage uploads and metadata management for images and videos
 */
use axum::{
    extract::{Multipart, Path, Query},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::{
    activity, media,
    models::{Media, MediaPatch, NewMedia},
};
use crate::events::{self, ChangeAction, Collection};
use crate::permissions::Permission;
use crate::routes::upload::{sanitize_folder, unique_filename, validate_image_magic_bytes, MAX_FILE_SIZE};
use crate::routes::{
    api_error, auth::authorize, filter_value, matches_search, parse_id, require_pool,
    store_error, ApiError, SuccessResponse,
};
use crate::storage::STORAGE;

const DEFAULT_CATEGORY: &str = "general";

/// Shown for videos uploaded without a thumbnail.
pub const DEFAULT_VIDEO_THUMBNAIL: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iMzIwIiBoZWlnaHQ9IjE4MCIgdmlld0JveD0iMCAwIDMyMCAxODAiIGZpbGw9Im5vbmUiIHhtbG5zPSJodHRwOi8vd3d3LnczLm9yZy8yMDAwL3N2ZyI+CjxyZWN0IHdpZHRoPSIzMjAiIGhlaWdodD0iMTgwIiBmaWxsPSIjMzM0MTU1Ii8+CjxwYXRoIGQ9Ik0xMjAgODBMMjAwIDEyMEwxMjAgMTYwVjgwWiIgZmlsbD0iIzljYTNiOCIvPgo8L3N2Zz4K";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    fn storage_folder(&self) -> &'static str {
        match self {
            MediaKind::Image => "media/images",
            MediaKind::Video => "media/videos",
        }
    }
}

/// Accepted upload: kind, canonical content type and file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub kind: MediaKind,
    pub content_type: &'static str,
    pub ext: &'static str,
}

fn video_type(declared: &str) -> Option<(&'static str, &'static str)> {
    Some(match declared {
        "video/mp4" => ("video/mp4", "mp4"),
        "video/webm" => ("video/webm", "webm"),
        "video/quicktime" => ("video/quicktime", "mov"),
        "video/ogg" => ("video/ogg", "ogv"),
        _ => return None,
    })
}

/// Images must declare an image type and carry matching magic bytes, and
/// stay under 10MB. Videos are accepted by declared type alone.
pub fn classify_upload(declared: &str, bytes: &[u8]) -> Result<Classified, ApiError> {
    if bytes.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Empty file"));
    }

    if let Some((content_type, ext)) = video_type(declared) {
        return Ok(Classified {
            kind: MediaKind::Video,
            content_type,
            ext,
        });
    }

    if !declared.starts_with("image/") {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF, MP4, WebM, MOV, OGG.",
        ));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Image too large. Maximum size is 10MB.",
        ));
    }
    let content_type = validate_image_magic_bytes(bytes).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "File content does not match an allowed image type.",
        )
    })?;
    let ext = match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        _ => "webp",
    };
    Ok(Classified {
        kind: MediaKind::Image,
        content_type,
        ext,
    })
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct MediaListQuery {
    pub category: Option<String>,
    pub kind: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaView {
    #[serde(flatten)]
    pub media: Media,
    pub preferred_url: String,
}

impl From<Media> for MediaView {
    fn from(media: Media) -> Self {
        let preferred_url = media.preferred_url().to_string();
        Self {
            media,
            preferred_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MediaListResponse {
    pub items: Vec<MediaView>,
    pub total: usize,
}

pub fn filter_media(items: Vec<Media>, query: &MediaListQuery) -> Vec<Media> {
    let category = filter_value(&query.category);
    let kind = filter_value(&query.kind);
    let search = filter_value(&query.search);

    items
        .into_iter()
        .filter(|m| category.is_none_or(|c| m.category == c))
        .filter(|m| kind.is_none_or(|k| m.kind == k))
        .filter(|m| {
            let tags = m.tags.join(" ");
            matches_search(
                search,
                &[
                    m.name.as_str(),
                    m.filename.as_str(),
                    m.alt.as_str(),
                    m.description.as_str(),
                    tags.as_str(),
                ],
            )
        })
        .collect()
}

/// Categories double as mirror folders: blank means `general`, anything else
/// must be a safe single path segment.
pub fn normalize_category(raw: &str) -> Result<String, ApiError> {
    let raw = if raw.trim().is_empty() { DEFAULT_CATEGORY } else { raw };
    sanitize_folder(raw).ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid category"))
}

struct IncomingFile {
    name: String,
    declared: String,
    bytes: Vec<u8>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/admin/media - multipart `file`, `category`, optional `thumbnail`
pub async fn upload_media(
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MediaView>), ApiError> {
    let principal = authorize(&headers, Permission::MediaUpload)?;

    let mut category = DEFAULT_CATEGORY.to_string();
    let mut file: Option<IncomingFile> = None;
    let mut thumbnail: Option<IncomingFile> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Multipart error");
                return Err(api_error(StatusCode::BAD_REQUEST, "Invalid multipart data"));
            }
        };
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(slot @ ("file" | "thumbnail")) => {
                let incoming = IncomingFile {
                    name: field.file_name().unwrap_or("upload").to_string(),
                    declared: field.content_type().unwrap_or("").to_string(),
                    bytes: field
                        .bytes()
                        .await
                        .map_err(|e| {
                            tracing::warn!(error = %e, "Failed to read upload bytes");
                            api_error(StatusCode::BAD_REQUEST, "Failed to read file data")
                        })?
                        .to_vec(),
                };
                if slot == "file" {
                    file = Some(incoming);
                } else {
                    thumbnail = Some(incoming);
                }
            }
            Some("category") => {
                category = normalize_category(&field.text().await.unwrap_or_default())?;
            }
            _ => {}
        }
    }

    let Some(file) = file else {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file provided"));
    };
    let classified = classify_upload(&file.declared, &file.bytes)?;
    let pool = require_pool()?;

    let filename = unique_filename(&file.name, classified.ext);
    let primary_key = format!("{}/{}", classified.kind.storage_folder(), filename);
    let mirror_key = format!("{}/{}", category, filename);

    let upload = STORAGE
        .store_dual(&primary_key, &mirror_key, &file.bytes, classified.content_type)
        .await
        .map_err(|e| {
            tracing::error!(key = %primary_key, error = %e, "Media upload failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store file")
        })?;

    let thumbnail_url = match classified.kind {
        MediaKind::Image => None,
        MediaKind::Video => Some(store_thumbnail(thumbnail).await),
    };

    let new_media = NewMedia {
        name: file.name,
        filename,
        kind: classified.kind.as_str().to_string(),
        storage_path: upload.primary.path,
        storage_url: upload.primary.url,
        public_path: upload.public_path,
        size: file.bytes.len() as i64,
        content_type: classified.content_type.to_string(),
        category,
        thumbnail: thumbnail_url,
    };

    let item = media::insert(&pool, &new_media)
        .await
        .map_err(|e| store_error(e, "Media"))?;

    tracing::info!(
        media_id = %item.id,
        kind = %item.kind,
        size = item.size,
        mirrored = item.public_path.is_some(),
        "Media uploaded"
    );
    activity::record(
        &pool,
        "media_uploaded",
        json!({
            "mediaId": item.id,
            "filename": item.filename,
            "kind": item.kind,
            "category": item.category,
        }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Media, ChangeAction::Created, item.id.to_string());

    Ok((StatusCode::CREATED, Json(item.into())))
}

/// Stores an uploaded video thumbnail in the primary store, falling back to
/// the placeholder when none was sent or it cannot be stored.
async fn store_thumbnail(thumbnail: Option<IncomingFile>) -> String {
    let Some(thumb) = thumbnail else {
        return DEFAULT_VIDEO_THUMBNAIL.to_string();
    };
    let Ok(classified) = classify_upload(&thumb.declared, &thumb.bytes) else {
        tracing::warn!(name = %thumb.name, "Ignoring invalid video thumbnail");
        return DEFAULT_VIDEO_THUMBNAIL.to_string();
    };
    if classified.kind != MediaKind::Image {
        return DEFAULT_VIDEO_THUMBNAIL.to_string();
    }

    let key = format!("media/thumbnails/{}", unique_filename(&thumb.name, classified.ext));
    match STORAGE
        .primary()
        .put(&key, &thumb.bytes, classified.content_type)
        .await
    {
        Ok(stored) => stored.url,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Thumbnail upload failed");
            DEFAULT_VIDEO_THUMBNAIL.to_string()
        }
    }
}

/// GET /api/admin/media
pub async fn list_media(
    headers: HeaderMap,
    Query(query): Query<MediaListQuery>,
) -> Result<Json<MediaListResponse>, ApiError> {
    authorize(&headers, Permission::MediaRead)?;
    let pool = require_pool()?;

    let items = media::list(&pool)
        .await
        .map_err(|e| store_error(e, "Media"))?;
    let items: Vec<MediaView> = filter_media(items, &query)
        .into_iter()
        .map(MediaView::from)
        .collect();
    let total = items.len();
    Ok(Json(MediaListResponse { items, total }))
}

/// GET /api/admin/media/{id}
pub async fn get_media(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MediaView>, ApiError> {
    authorize(&headers, Permission::MediaRead)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    let item = media::get(&pool, id)
        .await
        .map_err(|e| store_error(e, "Media"))?;
    Ok(Json(item.into()))
}

/// PATCH /api/admin/media/{id}
pub async fn update_media(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut patch): Json<MediaPatch>,
) -> Result<Json<MediaView>, ApiError> {
    let principal = authorize(&headers, Permission::MediaEdit)?;
    let id = parse_id(&id)?;
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Name cannot be empty"));
    }
    patch.category = patch.category.as_deref().map(normalize_category).transpose()?;
    let pool = require_pool()?;

    let item = media::update(&pool, id, &patch)
        .await
        .map_err(|e| store_error(e, "Media"))?;

    tracing::info!(media_id = %id, "Media updated");
    activity::record(
        &pool,
        "media_updated",
        json!({ "mediaId": id }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Media, ChangeAction::Updated, id.to_string());

    Ok(Json(item.into()))
}

/// DELETE /api/admin/media/{id}
///
/// The row is always removed once found; stored objects are cleaned up best effort.
pub async fn delete_media(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let principal = authorize(&headers, Permission::MediaDelete)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    let item = media::get(&pool, id)
        .await
        .map_err(|e| store_error(e, "Media"))?;

    STORAGE
        .remove_dual(&item.storage_path, item.public_path.as_deref())
        .await;

    media::delete(&pool, id)
        .await
        .map_err(|e| store_error(e, "Media"))?;

    tracing::info!(media_id = %id, filename = %item.filename, "Media deleted");
    activity::record(
        &pool,
        "media_deleted",
        json!({ "mediaId": id, "filename": item.filename }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::Media, ChangeAction::Deleted, id.to_string());

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::routes::test_support::{send, token_for};
    use axum::http::Method;
    use axum::routing::get;
    use axum::Router;
    use chrono::Utc;
    use uuid::Uuid;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn item(name: &str, kind: &str, category: &str) -> Media {
        Media {
            id: Uuid::new_v4(),
            name: name.to_string(),
            filename: format!("{}.bin", name),
            kind: kind.to_string(),
            storage_path: format!("media/{}", name),
            storage_url: format!("/uploads/media/{}", name),
            public_path: None,
            size: 10,
            content_type: "image/png".to_string(),
            category: category.to_string(),
            section_id: None,
            thumbnail: None,
            alt: String::new(),
            description: String::new(),
            tags: vec!["team".to_string()],
            published: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn router() -> Router {
        Router::new()
            .route("/api/admin/media", get(list_media))
            .route(
                "/api/admin/media/{id}",
                get(get_media).patch(update_media).delete(delete_media),
            )
    }

    #[test]
    fn test_classify_image_checks_magic_bytes() {
        let c = classify_upload("image/png", PNG).unwrap();
        assert_eq!(c.kind, MediaKind::Image);
        assert_eq!(c.ext, "png");

        // declared png, actually text
        assert!(classify_upload("image/png", b"not an image").is_err());
        assert!(classify_upload("application/zip", PNG).is_err());
        assert!(classify_upload("image/png", &[]).is_err());
    }

    #[test]
    fn test_classify_image_size_cap() {
        let mut big = PNG.to_vec();
        big.resize(MAX_FILE_SIZE + 1, 0);
        assert!(classify_upload("image/png", &big).is_err());
    }

    #[test]
    fn test_classify_video_by_declared_type() {
        let mut big = vec![0u8; MAX_FILE_SIZE + 1];
        big[0] = 1;
        let c = classify_upload("video/mp4", &big).unwrap();
        assert_eq!(c.kind, MediaKind::Video);
        assert_eq!(c.ext, "mp4");
        assert_eq!(classify_upload("video/quicktime", b"x").unwrap().ext, "mov");
    }

    #[test]
    fn test_filter_media() {
        let items = vec![
            item("hero", "image", "hero"),
            item("promo", "video", "hero"),
            item("ceo", "image", "team"),
        ];
        let query = MediaListQuery {
            category: Some("hero".to_string()),
            kind: Some("image".to_string()),
            search: None,
        };
        let names: Vec<_> = filter_media(items.clone(), &query)
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["hero"]);

        let by_tag = MediaListQuery {
            search: Some("TEAM".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_media(items, &by_tag).len(), 3);
    }

    #[test]
    fn test_media_view_exposes_preferred_url() {
        let mut m = item("hero", "image", "hero");
        m.public_path = Some("/images/hero/hero.png".to_string());
        let json = serde_json::to_value(MediaView::from(m)).unwrap();
        assert_eq!(json["preferredUrl"], "/images/hero/hero.png");
    }

    #[tokio::test]
    async fn test_list_media_requires_token() {
        let (status, _) = send(router(), Method::GET, "/api/admin/media", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_editor_cannot_delete_media() {
        let token = token_for(Role::Editor);
        let uri = format!("/api/admin/media/{}", Uuid::new_v4());
        let (status, _) = send(router(), Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("  ").unwrap(), "general");
        assert_eq!(normalize_category("Hero").unwrap(), "hero");
        assert!(normalize_category("../etc").is_err());
        assert!(normalize_category("a/b").is_err());
    }

    #[tokio::test]
    async fn test_patch_rejects_unsafe_category_before_database() {
        let token = token_for(Role::Admin);
        let uri = format!("/api/admin/media/{}", Uuid::new_v4());
        let (status, body) = send(
            router(),
            Method::PATCH,
            &uri,
            Some(&token),
            Some(serde_json::json!({ "category": "../../etc" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid category");

        let (status, _) = send(
            router(),
            Method::PATCH,
            &uri,
            Some(&token),
            Some(serde_json::json!({ "category": "team" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_delete_media_without_database() {
        let token = token_for(Role::Admin);
        let uri = format!("/api/admin/media/{}", Uuid::new_v4());
        let (status, _) = send(router(), Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
