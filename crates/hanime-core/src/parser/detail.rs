//! Watch page parser for hanime1.me
//!
//! Extracts the full metadata of a single video. Only the video ID and the
//! title are required; every other field degrades to an absent value.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use super::text::{clean_text, parse_count, parse_date, parse_duration, parse_iso_duration};
use super::{element_text, ensure_recognizable, normalize_url};
use crate::error::ParseError;
use crate::types::{VideoDetail, VideoId, VideoSummary};
use crate::url::watch_id;

const PAGE: &str = "detail";

/// Site chrome that shows up among the tag links
const TAG_BLACKLIST: &[&str] = &["Hanime1", "H動漫", "線上看", "免費", "1080p", "HD", "登入", "註冊"];
const MAX_TAG_CHARS: usize = 50;

/// Title prefixes that are release markers rather than artist names
const NOT_ARTISTS: &[&str] = &["中文字幕", "無碼", "无码"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static OG_URL: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[property="og:url"]"#));
static CANONICAL: LazyLock<Selector> = LazyLock::new(|| selector(r#"link[rel="canonical"]"#));
static DATA_ID: LazyLock<Selector> =
    LazyLock::new(|| selector("#video-id[value], [data-video-id]"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector("#shareBtn-title, .video-details-title"));
static DOC_TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static DESCRIPTION_PANEL: LazyLock<Selector> =
    LazyLock::new(|| selector(".video-description-panel, .video-details-wrapper"));
static CAPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(".video-caption-text, .video-description-panel .caption"));
static META_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    selector(r#"meta[property="og:description"], meta[name="description"]"#)
});
static OG_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[property="og:image"]"#));
static POSTER: LazyLock<Selector> = LazyLock::new(|| selector("video[poster], [data-poster]"));
static META_DURATION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[property="video:duration"]"#));
static DURATION: LazyLock<Selector> = LazyLock::new(|| selector(".video-duration, .duration"));
static ARTIST: LazyLock<Selector> = LazyLock::new(|| selector("#video-artist-name"));
static TAG_LINK: LazyLock<Selector> = LazyLock::new(|| selector(".single-video-tag a"));
static META_TAG: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[property="article:tag"]"#));
static RELATED_CONTAINER: LazyLock<Selector> = LazyLock::new(|| {
    selector("#related-tabcontent, .related-watch-wrap, #video-playlist-wrapper, .related-videos")
});
static WATCH_LINK: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[href*="watch?v="]"#));
static SOURCE: LazyLock<Selector> = LazyLock::new(|| selector("video source[src], video[src]"));
static JSON_LD: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"script[type="application/ld+json"]"#));

static TITLE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*[-|]\s*Hanime1.*$").expect("title suffix regex"));
static ARTIST_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[([^\]]+)\]").expect("artist prefix regex"));
static TAG_COUNT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\d+\)\s*$").expect("tag count regex"));
static VIEWS_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:觀看次數|观看次数)[：:]?\s*(\d[\d,.]*\s*[萬万億亿]?)\s*次").expect("views label regex")
});
static M3U8_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["'](https?:(?:\\/|/)[^"'\s]+?\.m3u8[^"'\s]*)["']"#).expect("m3u8 regex")
});
static MP4_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["'](https?:(?:\\/|/)[^"'\s]+?\.mp4[^"'\s]*)["']"#).expect("mp4 regex")
});

/// Parses a watch page into a [`VideoDetail`]
///
/// Falls back to the page's JSON-LD `VideoObject` for fields the markup
/// does not show.
///
/// # Errors
/// - `StructureChanged` if the video ID or the title cannot be located
/// - `Unrecognized` for empty bodies or challenge pages
pub fn parse_detail(html: &str) -> Result<VideoDetail, ParseError> {
    ensure_recognizable(html)?;
    let document = Html::parse_document(html);
    let json_ld = video_object(&document);

    let id = extract_id(&document, json_ld.as_ref()).ok_or(ParseError::StructureChanged {
        page: PAGE,
        anchor: "video id",
    })?;
    let title = extract_title(&document, json_ld.as_ref()).ok_or(ParseError::StructureChanged {
        page: PAGE,
        anchor: "video title",
    })?;

    let panel_text = document
        .select(&DESCRIPTION_PANEL)
        .map(|el| element_text(&el))
        .collect::<Vec<_>>()
        .join(" ");

    let summary = VideoSummary {
        id,
        thumbnail_url: extract_thumbnail(&document, json_ld.as_ref()),
        duration_secs: extract_duration(&document, json_ld.as_ref()),
        views: extract_views(&panel_text, json_ld.as_ref()),
        title: title.clone(),
    };

    Ok(VideoDetail {
        summary,
        tags: extract_tags(&document),
        upload_date: parse_date(&panel_text)
            .or_else(|| json_str(json_ld.as_ref(), "uploadDate").and_then(|d| parse_date(&d))),
        related_ids: extract_related_ids(&document, id),
        description: extract_description(&document, json_ld.as_ref()),
        uploader: extract_uploader(&document, &title),
        source_url: extract_source_url(&document, html),
    })
}

/// Finds the first JSON-LD object typed `VideoObject`
fn video_object(document: &Html) -> Option<Value> {
    document
        .select(&JSON_LD)
        .filter_map(|script| serde_json::from_str::<Value>(&script.inner_html()).ok())
        .find_map(find_video_object)
}

fn find_video_object(value: Value) -> Option<Value> {
    match value {
        Value::Array(items) => items.into_iter().find_map(find_video_object),
        Value::Object(mut map) => {
            if map.get("@type").and_then(Value::as_str) == Some("VideoObject") {
                return Some(Value::Object(map));
            }
            map.remove("@graph").and_then(find_video_object)
        }
        _ => None,
    }
}

fn json_str(json_ld: Option<&Value>, key: &str) -> Option<String> {
    let value = json_ld?.get(key)?;
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.first()?.as_str()?.to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let text = clean_text(&text);
    (!text.is_empty()).then_some(text)
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr("content"))
        .map(clean_text)
        .find(|content| !content.is_empty())
}

fn extract_id(document: &Html, json_ld: Option<&Value>) -> Option<VideoId> {
    let from_links = document
        .select(&OG_URL)
        .filter_map(|el| el.value().attr("content"))
        .chain(
            document
                .select(&CANONICAL)
                .filter_map(|el| el.value().attr("href")),
        )
        .find_map(watch_id);

    from_links
        .or_else(|| {
            document.select(&DATA_ID).find_map(|el| {
                let value = el.value();
                value
                    .attr("data-video-id")
                    .or_else(|| value.attr("value"))
                    .and_then(|raw| raw.parse().ok())
            })
        })
        .or_else(|| {
            ["url", "embedUrl"]
                .iter()
                .find_map(|key| json_str(json_ld, key).and_then(|u| watch_id(&u)))
        })
}

fn extract_title(document: &Html, json_ld: Option<&Value>) -> Option<String> {
    document
        .select(&TITLE)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
        .or_else(|| json_str(json_ld, "name"))
        .or_else(|| {
            let raw = element_text(&document.select(&DOC_TITLE).next()?);
            let stripped = TITLE_SUFFIX.replace(&raw, "").trim().to_string();
            (!stripped.is_empty()).then_some(stripped)
        })
}

fn extract_views(panel_text: &str, json_ld: Option<&Value>) -> Option<u64> {
    // The count must sit right after the label; the upload date follows it
    let from_panel = VIEWS_LABEL
        .captures(panel_text)
        .and_then(|caps| parse_count(caps.get(1)?.as_str()));

    from_panel.or_else(|| {
        let stats = json_ld?.get("interactionStatistic")?;
        let stat = match stats {
            Value::Array(items) => items.first()?,
            other => other,
        };
        match stat.get("userInteractionCount")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => parse_count(s),
            _ => None,
        }
    })
}

fn extract_duration(document: &Html, json_ld: Option<&Value>) -> Option<u32> {
    meta_content(document, &META_DURATION)
        .and_then(|secs| secs.parse().ok())
        .or_else(|| json_str(json_ld, "duration").and_then(|d| parse_iso_duration(&d)))
        .or_else(|| {
            document
                .select(&DURATION)
                .find_map(|el| parse_duration(&element_text(&el)))
        })
}

fn extract_thumbnail(document: &Html, json_ld: Option<&Value>) -> Option<String> {
    document
        .select(&OG_IMAGE)
        .filter_map(|el| el.value().attr("content"))
        .find_map(normalize_url)
        .or_else(|| {
            document.select(&POSTER).find_map(|el| {
                let value = el.value();
                value
                    .attr("poster")
                    .or_else(|| value.attr("data-poster"))
                    .and_then(normalize_url)
            })
        })
        .or_else(|| json_str(json_ld, "thumbnailUrl").and_then(|u| normalize_url(&u)))
}

fn extract_description(document: &Html, json_ld: Option<&Value>) -> Option<String> {
    document
        .select(&CAPTION)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
        .or_else(|| json_str(json_ld, "description"))
        .or_else(|| meta_content(document, &META_DESCRIPTION))
}

/// Artist link first, then a `[Artist]` prefix on the title
fn extract_uploader(document: &Html, title: &str) -> Option<String> {
    document
        .select(&ARTIST)
        .map(|el| element_text(&el))
        .find(|name| !name.is_empty())
        .or_else(|| {
            let name = clean_text(ARTIST_PREFIX.captures(title)?.get(1)?.as_str());
            let is_marker = NOT_ARTISTS.iter().any(|marker| name.contains(marker));
            (!name.is_empty() && !is_marker).then_some(name)
        })
}

/// Tag names in page order
///
/// Only the link's own text counts: the `#` marker and the `(n)` count
/// live in child spans.
fn extract_tags(document: &Html) -> Vec<String> {
    let from_links = document.select(&TAG_LINK).map(|link| own_text(&link));
    let from_meta = document
        .select(&META_TAG)
        .filter_map(|el| el.value().attr("content"))
        .map(str::to_string);

    let mut seen = HashSet::new();
    from_links
        .chain(from_meta)
        .filter_map(|raw| normalize_tag(&raw))
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

fn own_text(element: &ElementRef) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| &**text)
        .collect()
}

fn normalize_tag(raw: &str) -> Option<String> {
    let cleaned = clean_text(raw);
    let cleaned = cleaned.trim_start_matches('#').trim();
    let cleaned = TAG_COUNT_SUFFIX.replace(cleaned, "").trim().to_string();

    if cleaned.is_empty()
        || cleaned.chars().count() >= MAX_TAG_CHARS
        || TAG_BLACKLIST.contains(&cleaned.as_str())
    {
        return None;
    }
    Some(cleaned)
}

fn extract_related_ids(document: &Html, own_id: VideoId) -> Vec<VideoId> {
    let mut seen = HashSet::from([own_id]);
    document
        .select(&RELATED_CONTAINER)
        .flat_map(|container| container.select(&WATCH_LINK))
        .filter_map(|link| link.value().attr("href").and_then(watch_id))
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Player source as it appears in the page; never fetched
fn extract_source_url(document: &Html, html: &str) -> Option<String> {
    let from_player = document.select(&SOURCE).find_map(|el| {
        el.value()
            .attr("src")
            .and_then(normalize_url)
            .filter(|url| url.starts_with("http"))
    });

    from_player.or_else(|| {
        [&*M3U8_URL, &*MP4_URL].iter().find_map(|pattern| {
            pattern
                .captures(html)
                .and_then(|caps| caps.get(1))
                .map(|m| unescape_script_url(m.as_str()))
        })
    })
}

fn unescape_script_url(raw: &str) -> String {
    raw.replace("\\/", "/")
        .replace("\\u0026", "&")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn id(n: u64) -> VideoId {
        VideoId::new(n).unwrap()
    }

    const WATCH_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
    <title>[StarryMomoko] Ellen - Hanime1.me - H動漫/裏番/線上看</title>
    <meta property="og:url" content="https://hanime1.me/watch?v=39811">
    <meta property="og:image" content="https://vdownload.hembed.com/image/thumbnail/39811l.jpg?secure=abc&amp;expires=1">
    <meta property="article:tag" content="中文字幕">
    <meta property="article:tag" content="Hanime1">
    <meta property="article:tag" content="絕區零">
    <meta name="description" content="Meta description">
</head>
<body>
    <div id="player-div-wrapper">
        <video id="player" poster="https://img.example/poster.jpg">
            <source src="https://cdn.example/hls/39811/index.m3u8?token=1&amp;e=2" type="application/x-mpegURL">
        </video>
    </div>
    <div class="video-details-wrapper">
        <h3 id="shareBtn-title">[StarryMomoko] Ellen</h3>
        <a id="video-artist-name" href="/search?query=StarryMomoko">
            StarryMomoko
        </a>
        <div class="video-description-panel">
            <div>觀看次數：9.7萬次 &nbsp;&nbsp;2024-01-16</div>
            <div class="video-caption-text">A short caption.</div>
        </div>
        <div class="video-tags-wrapper">
            <div class="single-video-tag"><a href="/search?tags[]=絕區零"><span>#</span>&nbsp;絕區零</a></div>
            <div class="single-video-tag"><a href="/search?tags[]=無碼">無碼&nbsp;<span>(1)</span></a></div>
            <div class="single-video-tag"><a href="/search?tags[]=HD">HD</a></div>
            <div class="single-video-tag"><a href="/search?tags[]=巨乳"><span>#</span> 巨乳 <span>(12)</span></a></div>
        </div>
    </div>
    <div id="related-tabcontent">
        <a href="https://hanime1.me/watch?v=101"><img src="a.jpg"></a>
        <a href="https://hanime1.me/watch?v=39811"><img src="self.jpg"></a>
        <a href="https://hanime1.me/watch?v=102"><img src="b.jpg"></a>
        <a href="https://hanime1.me/watch?v=101"><img src="a-again.jpg"></a>
    </div>
    <footer><a href="https://hanime1.me/watch?v=555">Not related</a></footer>
</body>
</html>"##;

    #[test]
    fn test_parse_detail_id_title_tags() {
        let detail = parse_detail(WATCH_PAGE).unwrap();

        assert_eq!(detail.id(), id(39811));
        assert_eq!(detail.title(), "[StarryMomoko] Ellen");
        assert_eq!(detail.tags, vec!["絕區零", "無碼", "巨乳", "中文字幕"]);
    }

    #[test]
    fn test_parse_detail_metadata() {
        let detail = parse_detail(WATCH_PAGE).unwrap();

        assert_eq!(detail.summary.views, Some(97_000));
        assert_eq!(detail.upload_date, NaiveDate::from_ymd_opt(2024, 1, 16));
        assert_eq!(detail.uploader.as_deref(), Some("StarryMomoko"));
        assert_eq!(detail.description.as_deref(), Some("A short caption."));
        assert_eq!(
            detail.summary.thumbnail_url.as_deref(),
            Some("https://vdownload.hembed.com/image/thumbnail/39811l.jpg?secure=abc&expires=1")
        );
        assert_eq!(
            detail.source_url.as_deref(),
            Some("https://cdn.example/hls/39811/index.m3u8?token=1&e=2")
        );
        assert_eq!(detail.summary.duration_secs, None);
    }

    #[test]
    fn test_related_ids_exclude_self_and_duplicates() {
        let detail = parse_detail(WATCH_PAGE).unwrap();
        assert_eq!(detail.related_ids, vec![id(101), id(102)]);
    }

    #[test]
    fn test_tags_survive_json_round_trip() {
        let detail = parse_detail(WATCH_PAGE).unwrap();
        let json = serde_json::to_string(&detail).unwrap();
        let back: VideoDetail = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id(), id(39811));
        assert_eq!(back.title(), "[StarryMomoko] Ellen");
        assert_eq!(back.tags, detail.tags);
    }

    #[test]
    fn test_minimal_page_has_absent_optionals() {
        let html = r#"<html><head>
            <link rel="canonical" href="https://hanime1.me/watch?v=7">
            <title>Only Title - Hanime1.me</title>
            </head><body></body></html>"#;
        let detail = parse_detail(html).unwrap();

        assert_eq!(detail.id(), id(7));
        assert_eq!(detail.title(), "Only Title");
        assert!(detail.tags.is_empty());
        assert!(detail.related_ids.is_empty());
        assert_eq!(detail.summary.views, None);
        assert_eq!(detail.upload_date, None);
        assert_eq!(detail.uploader, None);
        assert_eq!(detail.source_url, None);
    }

    #[test]
    fn test_views_label_without_count_does_not_read_the_date() {
        let html = r#"<html><head><meta property="og:url" content="/watch?v=9"></head>
            <body><h3 id="shareBtn-title">No Count</h3>
            <div class="video-description-panel"><div>觀看次數： 2024-01-16</div></div>
            </body></html>"#;
        let detail = parse_detail(html).unwrap();
        assert_eq!(detail.summary.views, None);
        assert_eq!(detail.upload_date, NaiveDate::from_ymd_opt(2024, 1, 16));

        let with_json_ld = html.replace(
            "</head>",
            r#"<script type="application/ld+json">
            {"@type": "VideoObject", "interactionStatistic": {"userInteractionCount": "5,501"}}
            </script></head>"#,
        );
        assert_eq!(parse_detail(&with_json_ld).unwrap().summary.views, Some(5_501));
    }

    #[test]
    fn test_views_label_simplified_and_spaced() {
        let html = r#"<html><head><meta property="og:url" content="/watch?v=9"></head>
            <body><h3 id="shareBtn-title">Spaced</h3>
            <div class="video-details-wrapper"><div>观看次数: 12,345 次 2023-05-01</div></div>
            </body></html>"#;
        assert_eq!(parse_detail(html).unwrap().summary.views, Some(12_345));
    }

    #[test]
    fn test_uploader_from_title_prefix() {
        let html = r#"<html><head><meta property="og:url" content="/watch?v=8"></head>
            <body><h3 id="shareBtn-title">[Studio Fow] Episode 2</h3></body></html>"#;
        assert_eq!(parse_detail(html).unwrap().uploader.as_deref(), Some("Studio Fow"));

        let marker = r#"<html><head><meta property="og:url" content="/watch?v=8"></head>
            <body><h3 id="shareBtn-title">[中文字幕] Episode 2</h3></body></html>"#;
        assert_eq!(parse_detail(marker).unwrap().uploader, None);
    }

    #[test]
    fn test_json_ld_fallback() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@context": "https://schema.org", "@graph": [
                {"@type": "BreadcrumbList"},
                {"@type": "VideoObject",
                 "name": "From JSON",
                 "url": "https://hanime1.me/watch?v=4242",
                 "thumbnailUrl": ["https://img.example/4242.jpg"],
                 "uploadDate": "2023-09-03T12:00:00+08:00",
                 "duration": "PT23M45S",
                 "description": "JSON description",
                 "interactionStatistic": {"@type": "InteractionCounter", "userInteractionCount": 1234}}
            ]}
            </script>
            </head><body></body></html>"#;
        let detail = parse_detail(html).unwrap();

        assert_eq!(detail.id(), id(4242));
        assert_eq!(detail.title(), "From JSON");
        assert_eq!(detail.summary.thumbnail_url.as_deref(), Some("https://img.example/4242.jpg"));
        assert_eq!(detail.summary.duration_secs, Some(1425));
        assert_eq!(detail.summary.views, Some(1234));
        assert_eq!(detail.upload_date, NaiveDate::from_ymd_opt(2023, 9, 3));
        assert_eq!(detail.description.as_deref(), Some("JSON description"));
    }

    #[test]
    fn test_source_url_from_script() {
        let html = r#"<html><head><meta property="og:url" content="/watch?v=9"><title>T</title></head>
            <body><script>var player = {file: "https:\/\/cdn.example\/v\/9.mp4?a=1&b=2"};</script>
            </body></html>"#;
        assert_eq!(
            parse_detail(html).unwrap().source_url.as_deref(),
            Some("https://cdn.example/v/9.mp4?a=1&b=2")
        );
    }

    #[test]
    fn test_missing_id_is_structure_change() {
        let html = "<html><head><title>Some page</title></head><body><h3 id=\"shareBtn-title\">x</h3></body></html>";
        assert_eq!(
            parse_detail(html),
            Err(ParseError::StructureChanged {
                page: "detail",
                anchor: "video id"
            })
        );
    }

    #[test]
    fn test_missing_title_is_structure_change() {
        let html = r#"<html><head><meta property="og:url" content="/watch?v=3"></head><body></body></html>"#;
        assert_eq!(
            parse_detail(html),
            Err(ParseError::StructureChanged {
                page: "detail",
                anchor: "video title"
            })
        );
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("# 巨乳 (12)"), Some("巨乳".to_string()));
        assert_eq!(normalize_tag("HD"), None);
        assert_eq!(normalize_tag("  "), None);
        assert_eq!(normalize_tag(&"長".repeat(60)), None);
    }
}
