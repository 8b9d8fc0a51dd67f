use serde_json::{json, Value};
use sqlx::{types::Json, PgPool};

use super::StoreError;

const SITE_KEY: &str = "site";

/// Settings served before an administrator has saved anything.
pub fn default_settings() -> Value {
    json!({
        "siteName": "HABS Technologies Group",
        "siteTagline": "Innovation Through Technology",
        "companyEmail": "info@habstechnologies.com",
        "companyPhone": "+234 123 456 7890",
        "companyAddress": "Lagos, Nigeria",
        "socialMedia": {
            "facebook": "",
            "twitter": "",
            "linkedin": "",
            "instagram": ""
        },
        "seo": {
            "metaTitle": "HABS Technologies Group - Innovation Through Technology",
            "metaDescription": "Leading technology solutions provider in Africa",
            "metaKeywords": "technology, software, innovation, Africa"
        },
        "features": {
            "applicationsEnabled": true,
            "contactFormEnabled": true,
            "newsletterEnabled": false
        }
    })
}

/// Shallow merge: top-level keys of `patch` overwrite those of `base`.
/// A non-object patch replaces the whole document.
pub fn merge_settings(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}

pub async fn get(pool: &PgPool) -> Result<Value, StoreError> {
    let row: Option<(Json<Value>,)> =
        sqlx::query_as("SELECT content FROM site_settings WHERE key = $1")
            .bind(SITE_KEY)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(content,)| content.0).unwrap_or_else(default_settings))
}

pub async fn save(pool: &PgPool, content: &Value) -> Result<Value, StoreError> {
    let row: (Json<Value>,) = sqlx::query_as(
        r#"
        INSERT INTO site_settings (key, content, updated_at)
        VALUES ($1, $2, now())
        ON CONFLICT (key) DO UPDATE SET content = EXCLUDED.content, updated_at = now()
        RETURNING content
        "#,
    )
    .bind(SITE_KEY)
    .bind(Json(content))
    .fetch_one(pool)
    .await?;
    Ok(row.0 .0)
}
