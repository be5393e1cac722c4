//! Navigation directives embedded in assistant replies.
//!
//! The assistant is instructed to end replies with `[NAV:/path|Button Label]` markup.
//! Parsing is pure: the directive text stays in the stored message and actions are
//! recomputed whenever a message is rendered.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const NAV_DIRECTIVE_PATTERN: &str = r"\[NAV:(/[^\]|]+)\|([^\]]+)\]";

fn nav_directive() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(NAV_DIRECTIVE_PATTERN).expect("NAV pattern is valid"))
}

/// A button the host renders under an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationAction {
    pub path: String,
    pub label: String,
}

/// Assistant text with directives removed, plus the actions they carried.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedContent {
    pub clean_content: String,
    /// In order of appearance; this is the button display order.
    pub actions: Vec<NavigationAction>,
}

/// Extract `[NAV:/path|Label]` directives from `content`.
///
/// Malformed directives (no label, no closing bracket, path not starting with `/`)
/// are left in the text untouched.
#[must_use]
pub fn parse_navigation_actions(content: &str) -> ParsedContent {
    let pattern = nav_directive();
    let mut actions = Vec::new();
    let mut text = content.to_string();

    // Removing a directive can splice its neighbours into a new one, so strip until
    // nothing matches. Cleaned output therefore never parses to further actions.
    loop {
        let found = actions.len();
        actions.extend(pattern.captures_iter(&text).map(|caps| NavigationAction {
            path: caps[1].to_string(),
            label: caps[2].to_string(),
        }));
        if actions.len() == found {
            break;
        }
        text = pattern.replace_all(&text, "").into_owned();
    }

    ParsedContent {
        clean_content: text.trim().to_string(),
        actions,
    }
}

/// A page of the marketing site the assistant may send users to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationRoute {
    pub key: &'static str,
    pub path: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

impl NavigationRoute {
    const fn new(
        key: &'static str,
        path: &'static str,
        label: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            key,
            path,
            label,
            description,
        }
    }
}

pub const NAVIGATION_ROUTES: &[NavigationRoute] = &[
    NavigationRoute::new("home", "/", "Home", "Main homepage"),
    NavigationRoute::new("services", "/services", "Our Services", "View all our services"),
    NavigationRoute::new(
        "implementation",
        "/implementation-services",
        "Implementation Services",
        "Oracle FDI implementation",
    ),
    NavigationRoute::new(
        "managed",
        "/managed-services",
        "Managed Services",
        "24/7 support and maintenance",
    ),
    NavigationRoute::new(
        "advisory",
        "/advisory-services",
        "Advisory Services",
        "Strategic consulting and training",
    ),
    NavigationRoute::new(
        "accelerators",
        "/accelerators",
        "Accelerators",
        "Pre-built solutions and tools",
    ),
    NavigationRoute::new(
        "whyUs",
        "/why-us",
        "Why Choose Us",
        "Our differentiators and expertise",
    ),
    NavigationRoute::new("careers", "/careers", "Careers", "Job opportunities"),
    NavigationRoute::new("contact", "/contact", "Contact Us", "Get in touch"),
    NavigationRoute::new(
        "consultation",
        "/consultation",
        "Book Consultation",
        "Free consultation booking",
    ),
    NavigationRoute::new("demo", "/demo", "Schedule Demo", "Book a product demo"),
    NavigationRoute::new("connect", "/connect", "Connect", "Connect with our team"),
    NavigationRoute::new(
        "inquiry",
        "/general-inquiry",
        "General Inquiry",
        "Submit an inquiry",
    ),
    NavigationRoute::new(
        "community",
        "/join-community",
        "Join Community",
        "Join our community",
    ),
    NavigationRoute::new(
        "resources",
        "/resources",
        "Resources",
        "Helpful resources and guides",
    ),
];

/// Look up a known page by path. Unknown paths are still navigable; the host decides.
#[must_use]
pub fn route_for_path(path: &str) -> Option<&'static NavigationRoute> {
    NAVIGATION_ROUTES.iter().find(|route| route.path == path)
}
