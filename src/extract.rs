//! Description and image extraction from a route page.
//!
//! Pages keep their prose in `div#content` and their photos in
//! `div#photo-gallery`. Older pages have no gallery and link lightbox images
//! straight from the content block instead.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::text;

pub const SITE_BASE: &str = "https://mountain.kz/";
pub const NO_DESCRIPTION: &str = "Description not available.";
pub const NO_IMAGES: &str = "No images available.";

static CONTENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div#content").unwrap());
static GALLERY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div#photo-gallery").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static GALLERY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[rel~="lightbox[id366]"]"#).unwrap());
static LIGHTBOX_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[rel~="lightbox"]"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub description: String,
    pub images: Vec<String>,
}

pub struct ContentExtractor {
    site_base: String,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(SITE_BASE)
    }
}

impl ContentExtractor {
    /// `site_base` is prepended verbatim to every image href.
    pub fn new(site_base: impl Into<String>) -> Self {
        Self {
            site_base: site_base.into(),
        }
    }

    /// Never fails: missing regions fall back to placeholder text.
    pub fn extract(&self, markup: &str) -> Extracted {
        let document = Html::parse_document(markup);
        let content = document.select(&CONTENT).next();
        let gallery = document.select(&GALLERY).next();

        let raw = content
            .map(|c| {
                c.select(&PARAGRAPH)
                    .map(|p| p.text().collect::<String>())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        let mut description = text::clean_description(&raw);
        if description.is_empty() {
            description = NO_DESCRIPTION.to_string();
        }

        let mut images = gallery
            .map(|g| self.image_links(g, &GALLERY_LINK))
            .unwrap_or_default();
        if images.is_empty() {
            if let Some(c) = content {
                images = self.image_links(c, &LIGHTBOX_LINK);
            }
        }
        if images.is_empty() {
            images.push(NO_IMAGES.to_string());
        }

        Extracted {
            description,
            images,
        }
    }

    fn image_links(&self, scope: ElementRef<'_>, selector: &Selector) -> Vec<String> {
        scope
            .select(selector)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| format!("{}{}", self.site_base, href))
            .collect()
    }
}
