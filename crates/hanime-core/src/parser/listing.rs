//! Listing page parser for hanime1.me
//!
//! Parses HTML from search, tag, genre and sorted listing pages and extracts
//! video summaries plus pagination state.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::payload::embedded_videos;
use super::text::{is_duration, parse_count, parse_duration};
use super::{element_text, ensure_recognizable, normalize_url};
use crate::error::ParseError;
use crate::types::{PageResult, VideoSummary};
use crate::url::watch_id;

const PAGE: &str = "listing";

/// Page-level wrappers that exist even when a search has no results
static CONTAINER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "#home-rows-wrapper, .content-padding-new, .search-videos-wrapper, .home-rows-videos-wrapper",
    )
    .expect("container selector")
});
static CARD_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="watch?v="]"#).expect("card link selector"));
static CARD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".home-rows-videos-div, .card-mobile-panel, .search-doujin-videos, .video-card")
        .expect("card selector")
});
static TITLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".home-rows-videos-title, .card-mobile-title, .title").expect("title selector")
});
static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").expect("img selector"));
static DURATION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".card-mobile-duration, .home-rows-videos-duration, .duration")
        .expect("duration selector")
});
static VIEWS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".card-mobile-views, .home-rows-videos-views, .views").expect("views selector")
});
/// A number directly followed by a views word, e.g. `12,345次` or `1.2k views`
static VIEWS_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d[\d,.]*\s*[萬万億亿kKmM]?)\s*(?:次|views?\b)").expect("views text regex")
});
static NEXT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[rel="next"]"#).expect("next selector"));
static PAGINATION_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".pagination a[href], .page-item a[href]").expect("pagination selector")
});
static PAGE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]page=(\d+)").expect("page param regex"));

/// Parses a listing page into one page of video summaries
///
/// # Arguments
/// * `html` - Raw HTML of the listing page
/// * `page` - The 1-indexed page number that was requested
///
/// # Returns
/// A [`PageResult`] whose items are in page order. When the same video
/// appears more than once, the last occurrence wins. An empty page is not an
/// error. When no card markup yields a video, the JSON state embedded in the
/// page's scripts is used instead.
///
/// # Errors
/// - `StructureChanged` if the listing container is missing and no embedded
///   payload lists any video
/// - `Unrecognized` for empty bodies or challenge pages
pub fn parse_listing(html: &str, page: u32) -> Result<PageResult<VideoSummary>, ParseError> {
    ensure_recognizable(html)?;
    let document = Html::parse_document(html);
    let has_container = document.select(&CONTAINER).next().is_some();

    let mut cards = Vec::new();
    if has_container {
        for link in document.select(&CARD_LINK) {
            if !inside_container(&link) {
                continue;
            }
            if let Some(video) = parse_card(&link) {
                cards.push(video);
            }
        }
    }

    if cards.is_empty() {
        cards = embedded_videos(&document);
        if !cards.is_empty() {
            tracing::debug!("Listing page {} read from embedded payload ({} videos)", page, cards.len());
        }
    }

    if !has_container && cards.is_empty() {
        return Err(ParseError::StructureChanged {
            page: PAGE,
            anchor: "video container",
        });
    }

    let items = dedup_last_wins(cards);
    let has_next_page = has_next_page(&document, page);

    Ok(PageResult::new(items, page, has_next_page))
}

fn inside_container(link: &ElementRef) -> bool {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| CONTAINER.matches(&ancestor))
}

/// Parses the card around a single watch link
///
/// Returns `None` (and logs) for links that carry no usable ID or title.
fn parse_card(link: &ElementRef) -> Option<VideoSummary> {
    let href = link.value().attr("href")?;
    let Some(id) = watch_id(href) else {
        tracing::warn!("Skipping listing card with unparsable id: {}", href);
        return None;
    };

    // Some layouts put an empty overlay link next to the card body
    let scope = link
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| CARD.matches(ancestor))
        .unwrap_or(*link);

    let Some(title) = extract_title(link, &scope) else {
        tracing::warn!("Skipping listing card {} without a title", id);
        return None;
    };

    Some(VideoSummary {
        id,
        title,
        thumbnail_url: extract_thumbnail(&scope),
        duration_secs: extract_duration(&scope),
        views: extract_views(&scope),
    })
}

fn extract_title(link: &ElementRef, scope: &ElementRef) -> Option<String> {
    let from_element = scope
        .select(&TITLE)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty());

    from_element
        .or_else(|| attr_text(link, "title"))
        .or_else(|| {
            scope
                .select(&IMAGE)
                .find_map(|img| attr_text(&img, "alt"))
        })
}

fn attr_text(element: &ElementRef, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(super::text::clean_text)
        .filter(|text| !text.is_empty())
}

/// Prefers `data-src` because `src` is often a lazy-load placeholder
fn extract_thumbnail(scope: &ElementRef) -> Option<String> {
    scope.select(&IMAGE).find_map(|img| {
        let value = img.value();
        value
            .attr("data-src")
            .and_then(normalize_url)
            .or_else(|| value.attr("src").and_then(normalize_url))
    })
}

fn extract_duration(scope: &ElementRef) -> Option<u32> {
    if let Some(secs) = scope
        .select(&DURATION)
        .find_map(|el| parse_duration(&element_text(&el)))
    {
        return Some(secs);
    }

    // Fallback: any bare "mm:ss" text node inside the card
    scope
        .text()
        .map(str::trim)
        .find(|text| is_duration(text))
        .and_then(parse_duration)
}

fn extract_views(scope: &ElementRef) -> Option<u64> {
    if let Some(views) = scope
        .select(&VIEWS)
        .find_map(|el| parse_count(&element_text(&el)))
    {
        return Some(views);
    }

    // Fallback: the first text node that is a count, not one that merely
    // mentions 次 (titles often do)
    scope.text().find_map(|text| {
        let caps = VIEWS_TEXT.captures(text.trim())?;
        parse_count(caps.get(1)?.as_str())
    })
}

/// Keeps the last occurrence of each ID, at that occurrence's position
fn dedup_last_wins(cards: Vec<VideoSummary>) -> Vec<VideoSummary> {
    let mut seen = HashSet::new();
    let mut kept: Vec<VideoSummary> = cards
        .into_iter()
        .rev()
        .filter(|card| seen.insert(card.id))
        .collect();
    kept.reverse();
    kept
}

fn has_next_page(document: &Html, page: u32) -> bool {
    if document.select(&NEXT_LINK).next().is_some() {
        return true;
    }

    document
        .select(&PAGINATION_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| PAGE_PARAM.captures(href))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .any(|linked| linked > page)
}
