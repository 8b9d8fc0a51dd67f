//! Static site catalog: page routes with SEO metadata, assignable page
//! sections, pricing tiers and the header navigation.

use serde::Serialize;

pub const DEFAULT_TAGLINE: &str = "Imagination in Motion";
pub const DEFAULT_DESCRIPTION: &str = "We design, build, and deploy modern AI and software solutions, \
     fast, secure, and production-ready. From Sierra Leone to the world.";
pub const DEFAULT_OG_IMAGE: &str = "/og-image.png";
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "AI solutions",
    "web development",
    "app development",
    "creative tech",
    "Sierra Leone tech",
    "African technology",
    "artificial intelligence",
    "software development",
];

#[derive(Debug, Clone, Copy)]
pub struct PageRoute {
    pub path: &'static str,
    pub title: Option<&'static str>,
    pub description: Option<&'static str>,
    pub keywords: &'static [&'static str],
}

pub const PAGES: &[PageRoute] = &[
    PageRoute {
        path: "/",
        title: None,
        description: None,
        keywords: &[],
    },
    PageRoute {
        path: "/about",
        title: Some("About Us"),
        description: Some(
            "We exist to turn imagination into useful technology, from Sierra Leone to the world. \
             Learn about our mission, vision, and values.",
        ),
        keywords: &["mission", "vision", "values"],
    },
    PageRoute {
        path: "/divisions",
        title: Some("Divisions"),
        description: Some(
            "One group. Specialized teams. End-to-end delivery. Explore our six specialized \
             divisions from AI to media production.",
        ),
        keywords: &["AI studio", "media production", "game development"],
    },
    PageRoute {
        path: "/services",
        title: Some("Services & Pricing"),
        description: Some(
            "Transparent tiers. Clear deliverables. Flexible add-ons. From starter landing pages \
             to custom e-commerce solutions.",
        ),
        keywords: &["pricing", "landing page", "e-commerce"],
    },
    PageRoute {
        path: "/case-studies",
        title: Some("Case Studies"),
        description: Some(
            "From idea to live product, outcomes that matter. See how we help businesses build \
             and scale with technology.",
        ),
        keywords: &["case studies", "portfolio"],
    },
    PageRoute {
        path: "/news",
        title: Some("News"),
        description: None,
        keywords: &["news", "announcements"],
    },
    PageRoute {
        path: "/contact",
        title: Some("Contact Us"),
        description: Some(
            "Let's build something great. Send a note and we'll get back within one business day.",
        ),
        keywords: &[],
    },
    PageRoute {
        path: "/application",
        title: Some("Start a Project"),
        description: Some(
            "Fill this short brief and we will reply with next steps and a proposed scope within \
             24 hours.",
        ),
        keywords: &["project brief", "quote"],
    },
];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub path: String,
    pub title: String,
    pub description: String,
    pub canonical_url: String,
    pub og_image: String,
    pub keywords: String,
}

/// Title falls back to `"<site> — <tagline>"`, description to the site default,
/// keywords are the site defaults followed by the page's own.
pub fn page_metadata(route: &PageRoute, site_url: &str, site_name: &str) -> PageMetadata {
    let site_url = site_url.trim_end_matches('/');
    let title = match route.title {
        Some(title) => format!("{} — {}", title, site_name),
        None => format!("{} — {}", site_name, DEFAULT_TAGLINE),
    };
    let canonical_url = if route.path == "/" {
        site_url.to_string()
    } else {
        format!("{}{}", site_url, route.path)
    };
    let keywords = DEFAULT_KEYWORDS
        .iter()
        .chain(route.keywords.iter())
        .copied()
        .collect::<Vec<_>>()
        .join(", ");

    PageMetadata {
        path: route.path.to_string(),
        title,
        description: route.description.unwrap_or(DEFAULT_DESCRIPTION).to_string(),
        canonical_url,
        og_image: format!("{}{}", site_url, DEFAULT_OG_IMAGE),
        keywords,
    }
}

pub fn all_page_metadata(site_url: &str, site_name: &str) -> Vec<PageMetadata> {
    PAGES
        .iter()
        .map(|route| page_metadata(route, site_url, site_name))
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Background,
    Icon,
    Photo,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSlot {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub preview: &'static str,
    #[serde(rename = "type")]
    pub kind: SectionKind,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSectionCatalog {
    pub page: &'static str,
    pub name: &'static str,
    pub sections: &'static [SectionSlot],
}

const fn slot(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    preview: &'static str,
    kind: SectionKind,
) -> SectionSlot {
    SectionSlot {
        id,
        name,
        description,
        preview,
        kind,
    }
}

pub const SECTION_CATALOG: &[PageSectionCatalog] = &[
    PageSectionCatalog {
        page: "homepage",
        name: "Homepage",
        sections: &[
            slot("hero-bg", "Hero Background", "Main hero section background image",
                 "/images/hero/hero-placeholder.svg", SectionKind::Background),
            slot("service-ai", "AI Solutions Icon", "Icon for AI Solutions service card",
                 "/images/services/service-ai.svg", SectionKind::Icon),
            slot("service-web", "Web Development Icon", "Icon for Web Development service card",
                 "/images/services/service-web.svg", SectionKind::Icon),
            slot("service-creative", "Creative Tech Icon", "Icon for Creative Tech service card",
                 "/images/services/service-creative.svg", SectionKind::Icon),
        ],
    },
    PageSectionCatalog {
        page: "about",
        name: "About Page",
        sections: &[
            slot("about-hero", "About Hero Background", "Hero section background for about page",
                 "/images/hero/hero-placeholder.svg", SectionKind::Background),
            slot("team-member-1", "Team Member 1", "First team member photo",
                 "/images/team/team-placeholder.svg", SectionKind::Photo),
            slot("team-member-2", "Team Member 2", "Second team member photo",
                 "/images/team/team-placeholder.svg", SectionKind::Photo),
        ],
    },
    PageSectionCatalog {
        page: "divisions",
        name: "Divisions Page",
        sections: &[
            slot("division-ai-studio", "Habs AI Studio Icon", "Icon for Habs AI Studio division",
                 "/images/divisions/ai-studio.svg", SectionKind::Icon),
            slot("division-ai-forge", "Habs AI Forge Icon", "Icon for Habs AI Forge division",
                 "/images/divisions/ai-forge.svg", SectionKind::Icon),
            slot("division-media", "Habs Media Icon", "Icon for Habs Media division",
                 "/images/divisions/media.svg", SectionKind::Icon),
            slot("division-play", "Habs Play Icon", "Icon for Habs Play division",
                 "/images/divisions/play.svg", SectionKind::Icon),
            slot("division-motion", "Habs Motion Icon", "Icon for Habs Motion division",
                 "/images/divisions/motion.svg", SectionKind::Icon),
            slot("division-connect", "Habs Connect Icon", "Icon for Habs Connect division",
                 "/images/divisions/connect.svg", SectionKind::Icon),
        ],
    },
];

pub fn find_section(page: &str, section_id: &str) -> Option<&'static SectionSlot> {
    SECTION_CATALOG
        .iter()
        .find(|p| p.page == page)?
        .sections
        .iter()
        .find(|s| s.id == section_id)
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTier {
    pub name: &'static str,
    pub badge: &'static str,
    pub best_for: &'static str,
    /// Starting price in euros.
    pub price: u32,
    pub currency: &'static str,
    pub timeline: &'static str,
    pub includes: &'static [&'static str],
    pub addons: &'static [&'static str],
}

pub const PRICING_TIERS: &[PricingTier] = &[
    PricingTier {
        name: "Starter Landing",
        badge: "One-Page",
        best_for: "Best for: New brands, launches, campaigns",
        price: 1250,
        currency: "EUR",
        timeline: "7–10 days",
        includes: &[
            "Responsive single page (hero, features, CTA, contact)",
            "Basic SEO, analytics, cookie banner",
            "Contact form with spam protection",
        ],
        addons: &["Copywriting", "Illustrations", "Motion", "Language variants"],
    },
    PricingTier {
        name: "Multi-Page Site",
        badge: "3–8 Pages",
        best_for: "Best for: Company sites with richer content",
        price: 2800,
        currency: "EUR",
        timeline: "2–3 weeks",
        includes: &[
            "All Starter features",
            "Pages like About, Services, Case Studies, Blog/News",
            "Performance & accessibility pass",
        ],
        addons: &["CMS blog", "Advanced SEO", "Animations", "Localization"],
    },
    PricingTier {
        name: "Site with Backend",
        badge: "Custom",
        best_for: "Best for: Dashboards, portals, protected content",
        price: 5500,
        currency: "EUR",
        timeline: "3–6+ weeks",
        includes: &[
            "Auth, roles, private Admin",
            "Data models (content, submissions), audit logs",
            "API integrations (payments, storage, analytics)",
        ],
        addons: &["Complex workflows", "Multi-tenant", "SSO", "Reporting"],
    },
    PricingTier {
        name: "Online Store",
        badge: "E-commerce",
        best_for: "Best for: Products, subscriptions, digital goods",
        price: 4500,
        currency: "EUR",
        timeline: "3–5 weeks",
        includes: &[
            "Product CMS, cart, checkout",
            "Payment processing (Stripe/PayPal)",
            "Order emails, taxes/VAT setup",
        ],
        addons: &["Multi-currency", "Subscriptions", "Marketplace", "Custom fulfillment"],
    },
];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NavLink {
    pub href: &'static str,
    pub label: &'static str,
}

pub const NAVIGATION: &[NavLink] = &[
    NavLink { href: "/", label: "Home" },
    NavLink { href: "/about", label: "About" },
    NavLink { href: "/divisions", label: "Divisions" },
    NavLink { href: "/services", label: "Services" },
    NavLink { href: "/case-studies", label: "Case Studies" },
    NavLink { href: "/contact", label: "Contact" },
];

/// Call-to-action shown next to the navigation.
pub const NAV_CTA: NavLink = NavLink {
    href: "/application",
    label: "Start a Project",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_metadata_titles_and_canonical_urls() {
        let about = PAGES.iter().find(|p| p.path == "/about").unwrap();
        let meta = page_metadata(about, "https://habs.example/", "Habs Technologies Group");
        assert_eq!(meta.title, "About Us — Habs Technologies Group");
        assert_eq!(meta.canonical_url, "https://habs.example/about");
        assert!(meta.keywords.starts_with("AI solutions, "));
        assert!(meta.keywords.ends_with("mission, vision, values"));

        let home = page_metadata(&PAGES[0], "https://habs.example", "Habs");
        assert_eq!(home.title, "Habs — Imagination in Motion");
        assert_eq!(home.canonical_url, "https://habs.example");
        assert_eq!(home.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_every_page_has_metadata() {
        let all = all_page_metadata("https://habs.example", "Habs");
        assert_eq!(all.len(), PAGES.len());
        assert!(all.iter().all(|m| !m.description.is_empty()));
    }

    #[test]
    fn test_section_ids_are_unique_per_page() {
        for page in SECTION_CATALOG {
            let mut ids: Vec<_> = page.sections.iter().map(|s| s.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), page.sections.len(), "duplicate in {}", page.page);
        }
        assert!(find_section("homepage", "hero-bg").is_some());
        assert!(find_section("about", "hero-bg").is_none());
    }

    #[test]
    fn test_four_pricing_tiers() {
        assert_eq!(PRICING_TIERS.len(), 4);
        let json = serde_json::to_value(PRICING_TIERS[0]).unwrap();
        assert_eq!(json["bestFor"], "Best for: New brands, launches, campaigns");
        assert_eq!(json["price"], 1250);
    }
}
