//! Offline parsing of a rendered DOM snapshot into a [`RawBag`].
//!
//! The browser only navigates, scrolls and waits; everything read from the
//! page comes from one `page.content()` snapshot parsed here, so the region
//! rules can be tested against fixture HTML.

use domus_core::error::AppError;
use domus_core::models::{IMAGE_URLS, OWNER_NAME, PAGE_TEXT, PRICE_TEXT, RawBag};
use domus_core::registry::SourceFamily;
use htmd::HtmlToMarkdown;
use scraper::{ElementRef, Html, Selector};

const OLX_MAIN: &str = "[data-testid='main']";
const OLX_GALLERY: &str = "[data-testid='image-galery-container']";
const OLX_GALLERY_IMAGES: &str = "[data-testid='image-galery-container'] img";
const OLX_PRICE: &str = "[data-testid='ad-price-container']";
const OLX_OWNER: &str = "[data-testid='user-profile-user-name']";

const PUBLI24_MAIN: &str = ".detail-left";
const PUBLI24_OWNER: &str = ".user-profile-name";

/// Elements dropped when a region is converted to Markdown.
const MARKDOWN_SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "nav", "header", "footer", "aside", "button",
    "form",
];

/// Selector whose presence means the listing content rendered.
pub fn root_selector(family: SourceFamily) -> &'static str {
    match family {
        SourceFamily::Olx => OLX_MAIN,
        SourceFamily::Publi24 => PUBLI24_MAIN,
    }
}

/// Regions worth a short wait before taking the snapshot.
pub fn optional_selectors(family: SourceFamily) -> &'static [&'static str] {
    match family {
        SourceFamily::Olx => &[OLX_GALLERY, OLX_PRICE, OLX_OWNER],
        SourceFamily::Publi24 => &[PUBLI24_OWNER],
    }
}

/// Parse a DOM snapshot with the rules of `family`.
///
/// Missing root region yields an error bag; missing optional regions yield
/// a partial bag.
pub fn parse_snapshot(family: SourceFamily, url: &str, html: &str) -> RawBag {
    let document = Html::parse_document(html);
    let result = match family {
        SourceFamily::Olx => parse_olx(url, &document),
        SourceFamily::Publi24 => parse_publi24(url, &document),
    };
    result.unwrap_or_else(|e| RawBag::error(url, e.to_string()))
}

fn parse_olx(url: &str, document: &Html) -> Result<RawBag, AppError> {
    let Some(main) = document.select(&selector(OLX_MAIN)?).next() else {
        return Ok(missing_root(url, OLX_MAIN));
    };

    let mut bag = RawBag::new(url);
    bag.insert_text(PAGE_TEXT, visible_text(main));

    if document.select(&selector(OLX_GALLERY)?).next().is_some() {
        let mut urls: Vec<String> = Vec::new();
        for img in document.select(&selector(OLX_GALLERY_IMAGES)?) {
            let Some(src) = img.value().attr("src") else {
                continue;
            };
            if src.starts_with("http") && !urls.iter().any(|u| u == src) {
                urls.push(src.to_string());
            }
        }
        bag.insert_urls(IMAGE_URLS, urls);
    } else {
        bag.mark_missing(IMAGE_URLS);
    }

    match document.select(&selector(OLX_PRICE)?).next() {
        Some(price) => bag.insert_text(PRICE_TEXT, visible_text(price)),
        None => bag.mark_missing(PRICE_TEXT),
    }
    match document.select(&selector(OLX_OWNER)?).next() {
        Some(owner) => bag.insert_text(OWNER_NAME, visible_text(owner)),
        None => bag.mark_missing(OWNER_NAME),
    }

    Ok(bag)
}

fn parse_publi24(url: &str, document: &Html) -> Result<RawBag, AppError> {
    let Some(main) = document.select(&selector(PUBLI24_MAIN)?).next() else {
        return Ok(missing_root(url, PUBLI24_MAIN));
    };

    let mut bag = RawBag::new(url);
    bag.insert_text(PAGE_TEXT, region_markdown(main)?);

    match document.select(&selector(PUBLI24_OWNER)?).next() {
        Some(owner) => bag.insert_text(OWNER_NAME, visible_text(owner)),
        None => bag.mark_missing(OWNER_NAME),
    }

    Ok(bag)
}

fn missing_root(url: &str, css: &str) -> RawBag {
    RawBag::error(url, format!("Main content region {css} not found"))
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::BrowserError(format!("Bad selector {css}: {e}")))
}

/// Markdown for a free-form region (Publi24 descriptions). Runs of blank
/// lines left by `<br>` padding collapse to one.
fn region_markdown(element: ElementRef<'_>) -> Result<String, AppError> {
    let markdown = HtmlToMarkdown::builder()
        .skip_tags(MARKDOWN_SKIP_TAGS.to_vec())
        .build()
        .convert(&element.inner_html())
        .map_err(|e| AppError::CleanerError(e.to_string()))?;

    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0;
    for line in markdown.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    Ok(out.trim().to_string())
}

/// Text nodes of `element` outside script/style, trimmed, one per line.
fn visible_text(element: ElementRef<'_>) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name()))
                .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
            (!hidden).then(|| text.trim())
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
