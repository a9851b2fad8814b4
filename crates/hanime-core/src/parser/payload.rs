//! Video lists embedded as JSON in listing pages
//!
//! Some layouts render their cards client-side from a state object instead
//! of shipping them as markup. Those objects are read from
//! `<script id="__NUXT_DATA__">` and from `window.__NUXT__` /
//! `window.__INITIAL_STATE__` assignments. The walk only descends through
//! keys known to hold video lists, so unrelated state (users, ads, menus)
//! never turns into cards.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use super::normalize_url;
use super::text::{clean_text, parse_count, parse_duration};
use crate::types::{VideoId, VideoSummary};

const MAX_DEPTH: usize = 5;
const LIST_KEYS: &[&str] = &["videos", "items", "results", "data", "hentai_videos", "state"];
const ID_KEYS: &[&str] = &["id", "video_id"];
const TITLE_KEYS: &[&str] = &["name", "title"];
const THUMBNAIL_KEYS: &[&str] = &["cover_url", "thumbnail", "poster_url", "cover"];

static NUXT_DATA: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script#__NUXT_DATA__"#).expect("nuxt data selector")
});
static SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("script selector"));
static STATE_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"window\.(?:__NUXT__|__INITIAL_STATE__)\s*=\s*").expect("state assignment regex")
});
static UNDEFINED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bundefined\b").expect("undefined regex"));

/// Videos found in the first embedded payload that yields any
///
/// Payload order is preserved; duplicates are left to the caller.
pub(crate) fn embedded_videos(document: &Html) -> Vec<VideoSummary> {
    for payload in payloads(document) {
        let mut videos = Vec::new();
        collect(&payload, 0, &mut videos);
        if !videos.is_empty() {
            return videos;
        }
    }
    Vec::new()
}

fn payloads(document: &Html) -> Vec<Value> {
    let mut found = Vec::new();

    for script in document.select(&NUXT_DATA) {
        let text: String = script.text().collect();
        match serde_json::from_str(&text) {
            Ok(value) => found.push(value),
            Err(e) => tracing::debug!("Unreadable __NUXT_DATA__ payload: {}", e),
        }
    }

    for script in document.select(&SCRIPT) {
        let text: String = script.text().collect();
        for assignment in STATE_ASSIGNMENT.find_iter(&text) {
            let rest = UNDEFINED.replace_all(&text[assignment.end()..], "null");
            // Only the first value counts; the statement usually ends in `;`
            match serde_json::Deserializer::from_str(&rest)
                .into_iter::<Value>()
                .next()
            {
                Some(Ok(value)) => found.push(value),
                Some(Err(e)) => tracing::debug!("Unreadable embedded state object: {}", e),
                None => {}
            }
        }
    }

    found
}

fn collect(value: &Value, depth: usize, out: &mut Vec<VideoSummary>) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        Value::Array(items) => {
            for item in items {
                collect(item, depth + 1, out);
            }
        }
        Value::Object(map) => {
            if let Some(video) = video_from(map) {
                out.push(video);
                return;
            }
            for key in LIST_KEYS {
                if let Some(child) = map.get(*key) {
                    collect(child, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

fn video_from(map: &Map<String, Value>) -> Option<VideoSummary> {
    let id = ID_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(id_value))
        .or_else(|| map.get("slug")?.as_str()?.parse().ok())?;

    let Some(title) = TITLE_KEYS
        .iter()
        .filter_map(|key| map.get(*key)?.as_str())
        .map(clean_text)
        .find(|title| !title.is_empty())
    else {
        tracing::debug!("Skipping embedded video {} without a title", id);
        return None;
    };

    Some(VideoSummary {
        id,
        title,
        thumbnail_url: THUMBNAIL_KEYS
            .iter()
            .find_map(|key| map.get(*key)?.as_str().and_then(normalize_url)),
        duration_secs: map.get("duration").and_then(duration_value),
        views: map.get("views").and_then(views_value),
    })
}

fn id_value(value: &Value) -> Option<VideoId> {
    match value {
        Value::Number(n) => n.as_u64().and_then(VideoId::new),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn duration_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|secs| u32::try_from(secs).ok()),
        Value::String(s) => parse_duration(s),
        _ => None,
    }
}

fn views_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_count(s),
        _ => None,
    }
}
