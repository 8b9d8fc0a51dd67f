/**
 * News Routes
 * Admin CRUD over news articles plus the public published-only listing
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::{
    activity, news,
    news::NewsStatus,
    models::{NewsArticle, NewsDraft},
};
use crate::events::{self, ChangeAction, Collection};
use crate::permissions::Permission;
use crate::routes::{
    api_error, auth::authorize, auth::Principal, filter_value, matches_search, parse_id,
    require_pool, store_error, ApiError, SuccessResponse,
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct NewsListQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewsListResponse {
    pub items: Vec<NewsArticle>,
    pub total: usize,
}

/// Tags arrive either as a list or as a comma-separated string.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Csv(String),
}

impl TagsInput {
    pub fn into_tags(self) -> Vec<String> {
        let raw = match self {
            TagsInput::List(list) => list,
            TagsInput::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Body of create and update. On update, absent fields keep their stored value.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewsRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub featured_media: Option<String>,
    pub featured_thumbnail: Option<String>,
    pub tags: Option<TagsInput>,
    pub author: Option<String>,
}

// ============================================================================
// Filtering and validation
// ============================================================================

/// Category, status and search predicates; every set predicate must hold.
#[derive(Debug, Default, Clone)]
pub struct NewsFilter {
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

impl NewsFilter {
    pub fn from_query(query: &NewsListQuery) -> Self {
        Self {
            category: filter_value(&query.category).map(str::to_string),
            status: filter_value(&query.status).map(str::to_string),
            search: filter_value(&query.search).map(str::to_string),
        }
    }

    pub fn matches(&self, article: &NewsArticle) -> bool {
        if let Some(category) = &self.category {
            if article.category != *category {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if article.status != *status {
                return false;
            }
        }
        let tags = article.tags.join(" ");
        matches_search(
            self.search.as_deref(),
            &[
                article.title.as_str(),
                article.excerpt.as_str(),
                article.content.as_str(),
                article.author.as_str(),
                tags.as_str(),
            ],
        )
    }

    pub fn apply(&self, articles: Vec<NewsArticle>) -> Vec<NewsArticle> {
        articles.into_iter().filter(|a| self.matches(a)).collect()
    }
}

fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

/// Merges `req` over `existing` (if any) into a full draft.
///
/// `published_at` is kept while an article stays published, stamped with
/// `now` when it becomes published and cleared otherwise.
pub fn build_draft(
    req: NewsRequest,
    existing: Option<&NewsArticle>,
    author: &str,
    now: DateTime<Utc>,
) -> Result<NewsDraft, ApiError> {
    let title = req
        .title
        .map(|t| t.trim().to_string())
        .or_else(|| existing.map(|a| a.title.clone()))
        .unwrap_or_default();
    if title.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Title is required"));
    }

    let category = req
        .category
        .or_else(|| existing.map(|a| a.category.clone()))
        .unwrap_or_else(|| "company".to_string());
    if !news::is_valid_category(&category) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid category"));
    }

    let status_raw = req
        .status
        .or_else(|| existing.map(|a| a.status.clone()))
        .unwrap_or_else(|| NewsStatus::Draft.as_str().to_string());
    let status = NewsStatus::parse(&status_raw)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Invalid status"))?;

    let published_at = match (status, existing) {
        (NewsStatus::Published, Some(prev)) if prev.status == NewsStatus::Published.as_str() => {
            prev.published_at.or(Some(now))
        }
        (NewsStatus::Published, _) => Some(now),
        _ => None,
    };

    let content = match req.content {
        Some(c) => sanitize_html(&c),
        None => existing.map(|a| a.content.clone()).unwrap_or_default(),
    };

    Ok(NewsDraft {
        title,
        content,
        excerpt: req
            .excerpt
            .or_else(|| existing.map(|a| a.excerpt.clone()))
            .unwrap_or_default(),
        category,
        status: status.as_str().to_string(),
        featured_media: req
            .featured_media
            .or_else(|| existing.and_then(|a| a.featured_media.clone())),
        featured_thumbnail: req
            .featured_thumbnail
            .or_else(|| existing.and_then(|a| a.featured_thumbnail.clone())),
        tags: match req.tags {
            Some(tags) => tags.into_tags(),
            None => existing.map(|a| a.tags.clone()).unwrap_or_default(),
        },
        author: req
            .author
            .or_else(|| existing.map(|a| a.author.clone()))
            .unwrap_or_else(|| author.to_string()),
        published_at,
    })
}

/// Publishing needs `news.publish` on top of `news.write`.
fn check_publish(principal: &Principal, draft: &NewsDraft, was_published: bool) -> Result<(), ApiError> {
    let publishing = draft.status == NewsStatus::Published.as_str() && !was_published;
    if publishing && !principal.can(Permission::NewsPublish) {
        return Err(api_error(StatusCode::FORBIDDEN, "Insufficient permissions"));
    }
    Ok(())
}

// ============================================================================
// Public Handlers
// ============================================================================

/// GET /api/news - published articles only
pub async fn list_published(
    Query(query): Query<NewsListQuery>,
) -> Result<Json<NewsListResponse>, ApiError> {
    let mut filter = NewsFilter::from_query(&query);
    filter.status = None;
    let pool = require_pool()?;

    let items = filter.apply(
        news::list(&pool, true)
            .await
            .map_err(|e| store_error(e, "Article"))?,
    );
    let total = items.len();
    Ok(Json(NewsListResponse { items, total }))
}

/// GET /api/news/{id} - 404 unless published
pub async fn get_published(Path(id): Path<String>) -> Result<Json<NewsArticle>, ApiError> {
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    let article = news::get(&pool, id)
        .await
        .map_err(|e| store_error(e, "Article"))?;
    if article.status != NewsStatus::Published.as_str() {
        return Err(api_error(StatusCode::NOT_FOUND, "Article not found"));
    }
    Ok(Json(article))
}

// ============================================================================
// Admin Handlers
// ============================================================================

/// GET /api/admin/news
pub async fn list_articles(
    headers: HeaderMap,
    Query(query): Query<NewsListQuery>,
) -> Result<Json<NewsListResponse>, ApiError> {
    authorize(&headers, Permission::NewsRead)?;
    let filter = NewsFilter::from_query(&query);
    let pool = require_pool()?;

    let items = filter.apply(
        news::list(&pool, false)
            .await
            .map_err(|e| store_error(e, "Article"))?,
    );
    let total = items.len();
    Ok(Json(NewsListResponse { items, total }))
}

/// GET /api/admin/news/{id}
pub async fn get_article(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<NewsArticle>, ApiError> {
    authorize(&headers, Permission::NewsRead)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    let article = news::get(&pool, id)
        .await
        .map_err(|e| store_error(e, "Article"))?;
    Ok(Json(article))
}

/// POST /api/admin/news
pub async fn create_article(
    headers: HeaderMap,
    Json(payload): Json<NewsRequest>,
) -> Result<(StatusCode, Json<NewsArticle>), ApiError> {
    let principal = authorize(&headers, Permission::NewsWrite)?;
    let draft = build_draft(payload, None, &principal.email, Utc::now())?;
    check_publish(&principal, &draft, false)?;
    let pool = require_pool()?;

    let article = news::insert(&pool, &draft)
        .await
        .map_err(|e| store_error(e, "Article"))?;

    tracing::info!(article_id = %article.id, status = %article.status, "News article created");
    activity::record(
        &pool,
        "news_created",
        json!({ "articleId": article.id, "title": article.title }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::News, ChangeAction::Created, article.id.to_string());

    Ok((StatusCode::CREATED, Json(article)))
}

/// PATCH /api/admin/news/{id}
pub async fn update_article(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<NewsRequest>,
) -> Result<Json<NewsArticle>, ApiError> {
    let principal = authorize(&headers, Permission::NewsWrite)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    let existing = news::get(&pool, id)
        .await
        .map_err(|e| store_error(e, "Article"))?;
    let draft = build_draft(payload, Some(&existing), &principal.email, Utc::now())?;
    check_publish(
        &principal,
        &draft,
        existing.status == NewsStatus::Published.as_str(),
    )?;

    let article = news::update(&pool, id, &draft)
        .await
        .map_err(|e| store_error(e, "Article"))?;

    tracing::info!(article_id = %id, status = %article.status, "News article updated");
    activity::record(
        &pool,
        "news_updated",
        json!({ "articleId": id, "status": article.status }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::News, ChangeAction::Updated, id.to_string());

    Ok(Json(article))
}

/// DELETE /api/admin/news/{id}
pub async fn delete_article(
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let principal = authorize(&headers, Permission::NewsDelete)?;
    let id = parse_id(&id)?;
    let pool = require_pool()?;

    news::delete(&pool, id)
        .await
        .map_err(|e| store_error(e, "Article"))?;

    tracing::info!(article_id = %id, "News article deleted");
    activity::record(
        &pool,
        "news_deleted",
        json!({ "articleId": id }),
        Some(&principal.user_id),
    )
    .await;
    events::publish(Collection::News, ChangeAction::Deleted, id.to_string());

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
    use uuid::Uuid;

    fn article(title: &str, category: &str, status: &str, tags: &[&str]) -> NewsArticle {
        NewsArticle {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: String::new(),
            excerpt: String::new(),
            category: category.to_string(),
            status: status.to_string(),
            featured_media: None,
            featured_thumbnail: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            author: "Habs Newsroom".to_string(),
            published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn router() -> Router {
        Router::new()
            .route("/api/news", get(list_published))
            .route("/api/admin/news", get(list_articles).post(create_article))
            .route(
                "/api/admin/news/{id}",
                get(get_article).patch(update_article).delete(delete_article),
            )
    }

    #[test]
    fn test_filter_by_category_and_search_requires_both() {
        let articles = vec![
            article("AI Studio launch", "technology", "published", &[]),
            article("AI in banking", "industry", "published", &[]),
            article("Office move", "technology", "published", &[]),
            article("New hires", "technology", "draft", &["ai"]),
        ];
        let filter = NewsFilter {
            category: Some("technology".to_string()),
            status: None,
            search: Some("ai".to_string()),
        };
        let titles: Vec<_> = filter
            .apply(articles)
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["AI Studio launch", "New hires"]);
    }

    #[test]
    fn test_filter_from_query_ignores_all() {
        let filter = NewsFilter::from_query(&NewsListQuery {
            category: Some("all".to_string()),
            status: Some("published".to_string()),
            search: Some("".to_string()),
        });
        assert!(filter.category.is_none());
        assert_eq!(filter.status.as_deref(), Some("published"));
        assert!(filter.search.is_none());
    }

    #[test]
    fn test_build_draft_stamps_published_at_only_when_publishing() {
        let now = Utc::now();
        let req = NewsRequest {
            title: Some("Launch".to_string()),
            status: Some("published".to_string()),
            tags: Some(TagsInput::Csv("ai, launch,".to_string())),
            content: Some("<p>Hi</p><script>alert(1)</script>".to_string()),
            ..Default::default()
        };
        let draft = build_draft(req, None, "ed@example.com", now).unwrap();
        assert_eq!(draft.published_at, Some(now));
        assert_eq!(draft.tags, vec!["ai", "launch"]);
        assert_eq!(draft.author, "ed@example.com");
        assert!(!draft.content.contains("script"));

        let mut existing = article("Launch", "company", "published", &[]);
        let first = now - chrono::Duration::days(3);
        existing.published_at = Some(first);

        let unchanged = build_draft(NewsRequest::default(), Some(&existing), "x", now).unwrap();
        assert_eq!(unchanged.published_at, Some(first));

        let archived = build_draft(
            NewsRequest {
                status: Some("archived".to_string()),
                ..Default::default()
            },
            Some(&existing),
            "x",
            now,
        )
        .unwrap();
        assert_eq!(archived.published_at, None);
    }

    #[test]
    fn test_build_draft_validation() {
        let now = Utc::now();
        assert!(build_draft(NewsRequest::default(), None, "x", now).is_err());
        let bad_category = NewsRequest {
            title: Some("T".to_string()),
            category: Some("sports".to_string()),
            ..Default::default()
        };
        assert!(build_draft(bad_category, None, "x", now).is_err());
    }

    #[tokio::test]
    async fn test_client_cannot_read_admin_news() {
        let token = token_for(Role::Client);
        let (status, _) = send(router(), Method::GET, "/api/admin/news", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_create_without_title_rejected() {
        let token = token_for(Role::Editor);
        let (status, body) = send(
            router(),
            Method::POST,
            "/api/admin/news",
            Some(&token),
            Some(json!({ "content": "body" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title is required");
    }

    #[tokio::test]
    async fn test_public_list_needs_no_token() {
        let (status, _) = send(router(), Method::GET, "/api/news?category=all", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
