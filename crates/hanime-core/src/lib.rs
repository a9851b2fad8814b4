//! Hanime1.me Scraper Core Library
//!
//! Provides an async API for querying video metadata from hanime1.me.
//!
//! # Overview
//!
//! This crate provides:
//! - An HTTP transport with optional proxy and bounded retries
//! - HTML parsers for listing, watch and search-filter pages
//! - A query façade: search, tag and category browsing, latest, popular,
//!   detail, random and related videos
//! - A thumbnail pipeline that blurs on demand and cleans up after itself
//!
//! # Example
//!
//! ```no_run
//! use hanime_core::{HanimeScraper, ScraperConfig, ThumbnailPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScraperConfig::default();
//!     let scraper = HanimeScraper::with_config(&config)?;
//!
//!     let results = scraper.search("love live", 1).await?;
//!     for video in &results.items {
//!         println!("{}: {}", video.id, video.title);
//!     }
//!
//!     if let Some(video) = results.items.first() {
//!         let detail = scraper.detail(video.id).await?;
//!         println!("tags: {}", detail.tags.join(", "));
//!
//!         // The thumbnail file is deleted when `asset` goes out of scope
//!         let pipeline = ThumbnailPipeline::from_config(scraper.transport(), &config);
//!         if let Some(url) = &detail.summary.thumbnail_url {
//!             let asset = pipeline.acquire(url, 40).await?;
//!             println!("thumbnail at {}", asset.path().display());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`](https://docs.rs/tracing) events and never
//! installs a subscriber; that is up to the binary.

mod client;
pub mod config;
mod error;
pub mod parser;
mod scraper;
mod thumbnail;
mod types;
pub mod url;

// Re-export client types
pub use client::{ClientConfig, HanimeClient, MAX_RETRIES_CAP, Transport};

// Re-export configuration
pub use config::{ConfigError, ScraperConfig};

// Re-export error types
pub use error::{
    HanimeError, ImageError, ImageErrorKind, NetworkCause, NetworkError, ParseError, QueryError,
    QueryErrorKind, QueryResult, Result, ThumbnailError,
};

// Re-export parser functions
pub use parser::{parse_category_list, parse_detail, parse_listing, parse_tag_list};

// Re-export main scraper API
pub use scraper::HanimeScraper;

// Re-export thumbnail pipeline
pub use thumbnail::{MAX_BLUR_LEVEL, ThumbnailAsset, ThumbnailPipeline};

// Re-export data types
pub use types::{
    CategoryEntry, PageResult, RelatedVideos, TagEntry, VideoDetail, VideoId, VideoSummary,
};

// Re-export URL helper functions for convenience
pub use url::{SearchParams, SortOrder, build_search_url, build_video_url, extract_video_id};
