//! URL helper functions for hanime1.me
//!
//! Provides functions for building watch and search URLs and for pulling a
//! video ID out of user input.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::VideoId;

/// Default site root
pub const BASE_URL: &str = "https://hanime1.me";

/// Listing order understood by the search page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Latest,
    MostViewed,
}

impl SortOrder {
    /// Value the site expects in the `sort` query parameter
    pub fn as_query(self) -> &'static str {
        match self {
            SortOrder::Latest => "最新上傳",
            SortOrder::MostViewed => "觀看次數",
        }
    }
}

/// Parameters of a `/search` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub query: Option<String>,
    pub genre: Option<String>,
    pub tags: Vec<String>,
    pub sort: Option<SortOrder>,
    /// 1-indexed; `0` and `1` both mean the first page
    pub page: u32,
}

impl SearchParams {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn genre(genre: impl Into<String>) -> Self {
        Self {
            genre: Some(genre.into()),
            ..Self::default()
        }
    }

    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn sorted(sort: SortOrder) -> Self {
        Self {
            sort: Some(sort),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }
}

/// Strips a trailing slash so paths can be appended safely
fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

/// Builds the watch page URL for a video
///
/// # Example
/// ```
/// use hanime_core::url::{build_video_url, BASE_URL};
/// use hanime_core::VideoId;
/// let id = VideoId::new(39811).unwrap();
/// assert_eq!(build_video_url(BASE_URL, id), "https://hanime1.me/watch?v=39811");
/// ```
pub fn build_video_url(base: &str, id: VideoId) -> String {
    format!("{}/watch?v={}", trim_base(base), id)
}

/// Builds a `/search` URL
///
/// Query values are percent-encoded. The page parameter is only added past
/// the first page, matching the links the site itself generates.
///
/// # Example
/// ```
/// use hanime_core::url::{build_search_url, SearchParams, BASE_URL};
/// let url = build_search_url(BASE_URL, &SearchParams::query("love live").with_page(2));
/// assert_eq!(url, "https://hanime1.me/search?query=love%20live&page=2");
/// ```
pub fn build_search_url(base: &str, params: &SearchParams) -> String {
    let mut pairs: Vec<String> = Vec::new();

    if let Some(query) = &params.query {
        pairs.push(format!("query={}", urlencoding::encode(query)));
    }
    if let Some(genre) = &params.genre {
        pairs.push(format!("genre={}", urlencoding::encode(genre)));
    }
    for tag in &params.tags {
        pairs.push(format!("tags%5B%5D={}", urlencoding::encode(tag)));
    }
    if let Some(sort) = params.sort {
        pairs.push(format!("sort={}", urlencoding::encode(sort.as_query())));
    }
    if params.page > 1 {
        pairs.push(format!("page={}", params.page));
    }

    if pairs.is_empty() {
        format!("{}/search", trim_base(base))
    } else {
        format!("{}/search?{}", trim_base(base), pairs.join("&"))
    }
}

static WATCH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"watch\?(?:[^#]*&)?v=(\d+)").expect("watch id regex"));
static VIDEO_PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/video/(\d+)").expect("video path regex"));

/// Extracts a video ID from an href or URL containing `watch?v=`
pub fn watch_id(href: &str) -> Option<VideoId> {
    WATCH_ID
        .captures(href)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Extracts a video ID from user input
///
/// Accepts a bare numeric ID, a watch URL, or a `/video/<id>` path.
///
/// # Example
/// ```
/// use hanime_core::url::extract_video_id;
/// let id = extract_video_id("https://hanime1.me/watch?v=39811").unwrap();
/// assert_eq!(id.get(), 39811);
/// ```
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(id) = trimmed.parse::<VideoId>() {
        return Some(id);
    }

    watch_id(trimmed).or_else(|| {
        VIDEO_PATH_ID
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}
