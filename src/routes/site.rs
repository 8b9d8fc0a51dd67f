/**
 * Site Catalog Routes
 * Static page metadata, pricing, navigation and the assignable section catalog
 */
use axum::{http::header, response::IntoResponse, Json};
use serde::Serialize;

use crate::config::CONFIG;
use crate::site::{
    self, NavLink, PageMetadata, PageSectionCatalog, PricingTier, NAVIGATION, NAV_CTA,
    PRICING_TIERS, SECTION_CATALOG,
};

const CACHE_HEADER: (header::HeaderName, &str) = (header::CACHE_CONTROL, "public, max-age=300");

#[derive(Debug, Serialize)]
pub struct PagesResponse {
    pub pages: Vec<PageMetadata>,
}

#[derive(Debug, Serialize)]
pub struct PricingResponse {
    pub tiers: &'static [PricingTier],
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub links: &'static [NavLink],
    pub cta: NavLink,
}

#[derive(Debug, Serialize)]
pub struct SectionsResponse {
    pub pages: &'static [PageSectionCatalog],
}

/// GET /api/site/pages
pub async fn pages() -> impl IntoResponse {
    let pages = site::all_page_metadata(&CONFIG.site_url, &CONFIG.site_name);
    ([CACHE_HEADER], Json(PagesResponse { pages }))
}

/// GET /api/site/pricing
pub async fn pricing() -> impl IntoResponse {
    ([CACHE_HEADER], Json(PricingResponse { tiers: PRICING_TIERS }))
}

/// GET /api/site/navigation
pub async fn navigation() -> impl IntoResponse {
    (
        [CACHE_HEADER],
        Json(NavigationResponse {
            links: NAVIGATION,
            cta: NAV_CTA,
        }),
    )
}

/// GET /api/site/sections
pub async fn sections() -> impl IntoResponse {
    ([CACHE_HEADER], Json(SectionsResponse { pages: SECTION_CATALOG }))
}
