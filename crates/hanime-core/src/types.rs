//! Core data types for the hanime scraper
//!
//! Contains the records produced by the parsers and returned by the façade.
//! All of them implement Serialize and Deserialize so a formatting layer can
//! consume them as JSON.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Site-assigned numeric video ID (always positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(NonZeroU64);

impl VideoId {
    /// Returns `None` for `0`, which the site never assigns
    pub fn new(id: u64) -> Option<Self> {
        NonZeroU64::new(id).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VideoId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("not a numeric video id: {:?}", s));
        }
        trimmed
            .parse::<u64>()
            .ok()
            .and_then(VideoId::new)
            .ok_or_else(|| format!("video id out of range: {:?}", s))
    }
}

/// A video as it appears on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub id: VideoId,

    pub title: String,

    /// Absolute thumbnail URL
    pub thumbnail_url: Option<String>,

    /// Duration in seconds
    pub duration_secs: Option<u32>,

    /// View count
    pub views: Option<u64>,
}

/// Full metadata from a video's watch page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDetail {
    #[serde(flatten)]
    pub summary: VideoSummary,

    /// Tag names in page order, deduplicated
    pub tags: Vec<String>,

    pub upload_date: Option<NaiveDate>,

    /// IDs of the videos the page recommends, in page order
    pub related_ids: Vec<VideoId>,

    pub description: Option<String>,

    /// Artist / studio credited on the page
    pub uploader: Option<String>,

    /// Player source (m3u8 or mp4) as shown in the page, never fetched
    pub source_url: Option<String>,
}

impl VideoDetail {
    pub fn id(&self) -> VideoId {
        self.summary.id
    }

    pub fn title(&self) -> &str {
        &self.summary.title
    }
}

impl From<VideoDetail> for VideoSummary {
    fn from(detail: VideoDetail) -> Self {
        detail.summary
    }
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,

    /// 1-indexed page number
    pub page: u32,

    pub has_next_page: bool,
}

impl<T> PageResult<T> {
    pub fn new(items: Vec<T>, page: u32, has_next_page: bool) -> Self {
        Self {
            items,
            page: page.max(1),
            has_next_page,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keeps at most `max` items
    ///
    /// The next-page flag stays set when items were cut off, so callers can
    /// still page forward.
    pub fn truncate(mut self, max: usize) -> Self {
        if self.items.len() > max {
            self.items.truncate(max);
            self.has_next_page = true;
        }
        self
    }
}

/// A tag offered by the site's search filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    pub name: String,
    /// Result-count hint, when the site shows one
    pub count: Option<u64>,
}

/// A category (genre) offered by the site's search filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub count: Option<u64>,
}

/// Related videos of one video, resolved into summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedVideos {
    pub page: PageResult<VideoSummary>,

    /// Number of related lookups that failed and were left out
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> VideoId {
        VideoId::new(n).unwrap()
    }

    fn summary(n: u64) -> VideoSummary {
        VideoSummary {
            id: id(n),
            title: format!("Video {}", n),
            thumbnail_url: None,
            duration_secs: None,
            views: None,
        }
    }

    #[test]
    fn test_video_id_rejects_zero() {
        assert!(VideoId::new(0).is_none());
        assert_eq!(VideoId::new(12345).map(VideoId::get), Some(12345));
    }

    #[test]
    fn test_video_id_from_str() {
        assert_eq!("39811".parse::<VideoId>(), Ok(id(39811)));
        assert_eq!(" 7 ".parse::<VideoId>(), Ok(id(7)));
        assert!("0".parse::<VideoId>().is_err());
        assert!("-3".parse::<VideoId>().is_err());
        assert!("abc".parse::<VideoId>().is_err());
        assert!("".parse::<VideoId>().is_err());
    }

    #[test]
    fn test_video_detail_serializes_flat() {
        let detail = VideoDetail {
            summary: VideoSummary {
                id: id(100),
                title: "Title".to_string(),
                thumbnail_url: Some("https://img.example/100.jpg".to_string()),
                duration_secs: Some(1425),
                views: Some(97000),
            },
            tags: vec!["中文字幕".to_string()],
            upload_date: NaiveDate::from_ymd_opt(2024, 1, 16),
            related_ids: vec![id(101)],
            description: None,
            uploader: Some("Studio".to_string()),
            source_url: None,
        };

        let json = serde_json::to_value(&detail).expect("Serialization should succeed");
        assert_eq!(json["id"], 100);
        assert_eq!(json["title"], "Title");
        assert_eq!(json["upload_date"], "2024-01-16");
        assert_eq!(json["related_ids"][0], 101);

        let back: VideoDetail = serde_json::from_value(json).expect("Deserialization should succeed");
        assert_eq!(back, detail);
    }

    #[test]
    fn test_page_result_page_is_at_least_one() {
        let page: PageResult<VideoSummary> = PageResult::new(Vec::new(), 0, false);
        assert_eq!(page.page, 1);
        assert!(page.is_empty());
    }

    #[test]
    fn test_truncate_keeps_next_page_when_cut() {
        let items: Vec<_> = (1..=10).map(summary).collect();
        let page = PageResult::new(items, 1, false).truncate(3);
        assert_eq!(page.len(), 3);
        assert!(page.has_next_page);
        assert_eq!(page.items[2].id, id(3));
    }

    #[test]
    fn test_truncate_without_cut_preserves_flag() {
        let items: Vec<_> = (1..=2).map(summary).collect();
        let page = PageResult::new(items.clone(), 4, false).truncate(3);
        assert_eq!(page.len(), 2);
        assert!(!page.has_next_page);

        let page = PageResult::new(items, 4, true).truncate(3);
        assert!(page.has_next_page);
    }
}
