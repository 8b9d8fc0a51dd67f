use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::config::CONFIG;
use crate::db::{self, models::NewsArticle};
use crate::site;

const FEED_LIMIT: usize = 50;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn rfc822(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

fn article_date(article: &NewsArticle) -> DateTime<Utc> {
    article.published_at.unwrap_or(article.created_at)
}

/// Renders an RSS 2.0 channel over already-published articles, newest first.
pub fn render_feed(articles: &[NewsArticle], site_url: &str, site_name: &str) -> String {
    let base_url = site_url.trim_end_matches('/');

    let mut items = String::new();
    for article in articles.iter().take(FEED_LIMIT) {
        let article_url = format!("{}/news/{}", base_url, article.id);
        items.push_str(&format!(
            "    <item>\n\
                   <title>{}</title>\n\
                   <link>{}</link>\n\
                   <description>{}</description>\n\
                   <category>{}</category>\n\
                   <pubDate>{}</pubDate>\n\
                   <guid isPermaLink=\"true\">{}</guid>\n\
                 </item>\n",
            escape_xml(&article.title),
            escape_xml(&article_url),
            escape_xml(&article.excerpt),
            escape_xml(&article.category),
            rfc822(&article_date(article)),
            escape_xml(&article_url),
        ));
    }

    let feed_url = format!("{}/news/rss.xml", base_url);
    let news_url = format!("{}/news", base_url);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{}</title>
    <link>{}</link>
    <description>{}</description>
    <language>en-us</language>
    <atom:link href="{}" rel="self" type="application/rss+xml"/>
    <lastBuildDate>{}</lastBuildDate>
{}  </channel>
</rss>"#,
        escape_xml(&format!("{} News", site_name)),
        escape_xml(&news_url),
        escape_xml(site::DEFAULT_DESCRIPTION),
        escape_xml(&feed_url),
        articles.first().map(|a| rfc822(&article_date(a))).unwrap_or_default(),
        items,
    )
}

/// GET /news/rss.xml
pub async fn rss_feed() -> Response {
    let Some(pool) = db::get_pool() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Service unavailable",
        )
            .into_response();
    };

    let articles = match db::news::list(&pool, true).await {
        Ok(articles) => articles,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load news for RSS feed");
            Vec::new()
        }
    };

    let xml = render_feed(&articles, &CONFIG.site_url, &CONFIG.site_name);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/rss+xml; charset=utf-8"),
            (
                header::CACHE_CONTROL,
                "public, max-age=3600, stale-while-revalidate=600",
            ),
        ],
        xml,
    )
        .into_response()
}
