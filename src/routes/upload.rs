/**
 * File Upload Routes
 * Generic file upload into the primary store, public-file removal,
 * and the validation helpers shared with the media library
 */
use axum::{extract::Multipart, http::HeaderMap, http::StatusCode, Json};
use chrono::Utc;
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};

use crate::permissions::Permission;
use crate::routes::{api_error, auth::authorize, ApiError, SuccessResponse};
use crate::storage::{validate_key, STORAGE};

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_FOLDER: &str = "media";
const PUBLIC_PREFIX: &str = "/images/";

const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub path: String,
    pub url: String,
    pub name: String,
    pub size: usize,
    pub content_type: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub file: UploadedFile,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileRequest {
    pub path: String,
}

/// Sniffs image content. `None` for anything that is not JPEG, PNG, GIF or WebP.
pub fn validate_image_magic_bytes(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn validate_document_magic_bytes(bytes: &[u8], declared: &str) -> bool {
    match declared {
        "application/pdf" => bytes.starts_with(b"%PDF"),
        // OLE2 compound file
        "application/msword" => bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]),
        // docx is a zip container
        _ => bytes.starts_with(b"PK\x03\x04"),
    }
}

/// Content type for a generic upload, or `None` if the bytes do not match an
/// allowed image or document type.
pub fn detect_upload_type(bytes: &[u8], declared: &str) -> Option<&'static str> {
    if let Some(mime) = validate_image_magic_bytes(bytes) {
        return Some(mime);
    }
    DOCUMENT_TYPES
        .iter()
        .find(|t| **t == declared)
        .filter(|_| validate_document_magic_bytes(bytes, declared))
        .copied()
}

pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    Some(match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        _ => return None,
    })
}

/// Lowercase `[a-z0-9-]` form of a filename stem; never empty.
pub fn sanitize_stem(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => name,
    };
    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed: String = out.trim_matches('-').chars().take(60).collect();
    let trimmed = trimmed.trim_end_matches('-');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<sanitized-stem>-<millis>-<random6>.<ext>`
pub fn unique_filename(original: &str, ext: &str) -> String {
    let random = Alphanumeric
        .sample_string(&mut rand::rng(), 6)
        .to_lowercase();
    format!(
        "{}-{}-{}.{}",
        sanitize_stem(original),
        Utc::now().timestamp_millis(),
        random,
        ext
    )
}

/// Single path segment of ASCII letters, digits, `-` and `_`, lowercased.
/// Blank means the default folder. Any other character, `.` and `/` included,
/// rejects the folder.
pub fn sanitize_folder(folder: &str) -> Option<String> {
    let folder = folder.trim().trim_matches('/');
    if folder.is_empty() {
        return Some(DEFAULT_FOLDER.to_string());
    }
    let valid = folder
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| folder.to_ascii_lowercase())
}

fn bad_request(msg: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, msg)
}

/// POST /api/upload - multipart `file` and optional `folder`
pub async fn upload_file(
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let principal = authorize(&headers, Permission::MediaUpload)?;

    let mut folder = DEFAULT_FOLDER.to_string();
    let mut file: Option<(String, String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Multipart error");
                return Err(bad_request("Invalid multipart data"));
            }
        };
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let declared = field.content_type().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    tracing::warn!(error = %e, "Failed to read upload bytes");
                    bad_request("Failed to read file data")
                })?;
                file = Some((name, declared, bytes.to_vec()));
            }
            Some("folder") => {
                let raw = field.text().await.unwrap_or_default();
                folder = sanitize_folder(&raw).ok_or_else(|| bad_request("Invalid folder"))?;
            }
            _ => {}
        }
    }

    let Some((name, declared, bytes)) = file else {
        return Err(bad_request("No file provided"));
    };
    if bytes.is_empty() {
        return Err(bad_request("Empty file"));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(bad_request("File size must be less than 10MB"));
    }
    let content_type =
        detect_upload_type(&bytes, &declared).ok_or_else(|| bad_request("Invalid file type"))?;
    let ext = extension_for_mime(content_type).unwrap_or("bin");

    let key = format!("{}/{}", folder, unique_filename(&name, ext));
    let stored = STORAGE
        .primary()
        .put(&key, &bytes, content_type)
        .await
        .map_err(|e| {
            tracing::error!(key = %key, error = %e, "File upload failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save file")
        })?;

    tracing::info!(
        key = %stored.path,
        size = bytes.len(),
        user = %principal.email,
        "File uploaded"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded successfully".to_string(),
        file: UploadedFile {
            path: stored.path,
            url: stored.url,
            name,
            size: bytes.len(),
            content_type: content_type.to_string(),
        },
    }))
}

/// Key inside the public mirror for a `/images/...` path.
pub fn public_key(path: &str) -> Result<&str, ApiError> {
    let key = path
        .strip_prefix(PUBLIC_PREFIX)
        .ok_or_else(|| bad_request("Only files under /images/ can be deleted"))?;
    validate_key(key).map_err(|_| bad_request("Invalid path"))?;
    Ok(key)
}

/// DELETE /api/admin/media/file - a missing file counts as deleted
pub async fn delete_public_file(
    headers: HeaderMap,
    Json(payload): Json<DeleteFileRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    authorize(&headers, Permission::MediaDelete)?;
    let key = public_key(&payload.path)?;

    let Some(mirror) = STORAGE.mirror() else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Public media directory not configured",
        ));
    };

    match mirror.remove(key).await {
        Ok(true) => tracing::info!(path = %payload.path, "Public file deleted"),
        Ok(false) => tracing::debug!(path = %payload.path, "Public file already gone"),
        Err(e) => {
            tracing::error!(path = %payload.path, error = %e, "Failed to delete public file");
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete file",
            ));
        }
    }

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::routes::test_support::{send, token_for};
    use axum::http::Method;
    use axum::routing::delete;
    use axum::Router;
    use serde_json::json;

    #[test]
    fn test_validate_image_magic_bytes() {
        assert_eq!(validate_image_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(
            validate_image_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D]),
            Some("image/png")
        );
        assert_eq!(validate_image_magic_bytes(b"GIF89a"), Some("image/gif"));
        assert_eq!(validate_image_magic_bytes(b"RIFF\0\0\0\0WEBPVP8"), Some("image/webp"));
        assert_eq!(validate_image_magic_bytes(b"<svg"), None);
        assert_eq!(validate_image_magic_bytes(&[0xFF]), None);
    }

    #[test]
    fn test_detect_upload_type_documents() {
        assert_eq!(
            detect_upload_type(b"%PDF-1.7", "application/pdf"),
            Some("application/pdf")
        );
        // declared pdf but not a pdf
        assert_eq!(detect_upload_type(b"hello", "application/pdf"), None);
        assert_eq!(detect_upload_type(b"%PDF-1.7", "text/plain"), None);
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("Hero Banner (final).PNG"), "hero-banner-final");
        assert_eq!(sanitize_stem("../../etc/passwd"), "etc-passwd");
        assert_eq!(sanitize_stem(".png"), "png");
        assert_eq!(sanitize_stem("###.jpg"), "file");
    }

    #[test]
    fn test_unique_filename_shape() {
        let name = unique_filename("Team Photo.jpg", "jpg");
        let parts: Vec<&str> = name.trim_end_matches(".jpg").rsplitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 6);
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2], "team-photo");
        assert_ne!(name, unique_filename("Team Photo.jpg", "jpg"));
    }

    #[test]
    fn test_sanitize_folder() {
        assert_eq!(sanitize_folder("").as_deref(), Some("media"));
        assert_eq!(sanitize_folder("/Docs/").as_deref(), Some("docs"));
        assert_eq!(sanitize_folder("../secret"), None);
        assert_eq!(sanitize_folder("case_studies-2024").as_deref(), Some("case_studies-2024"));
        assert_eq!(sanitize_folder("a.b"), None);
        assert_eq!(sanitize_folder("a/b"), None);
    }

    #[test]
    fn test_public_key_requires_images_prefix() {
        assert_eq!(public_key("/images/hero/a.png").unwrap(), "hero/a.png");
        assert!(public_key("/uploads/a.png").is_err());
        assert!(public_key("/images/../config.toml").is_err());
    }

    #[tokio::test]
    async fn test_delete_public_file_requires_media_delete() {
        let app = Router::new().route("/api/admin/media/file", delete(delete_public_file));
        let token = token_for(Role::Editor);
        let (status, _) = send(
            app,
            Method::DELETE,
            "/api/admin/media/file",
            Some(&token),
            Some(json!({ "path": "/images/hero/a.png" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delete_public_file_rejects_outside_prefix() {
        let app = Router::new().route("/api/admin/media/file", delete(delete_public_file));
        let token = token_for(Role::Admin);
        let (status, _) = send(
            app,
            Method::DELETE,
            "/api/admin/media/file",
            Some(&token),
            Some(json!({ "path": "/etc/passwd" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
