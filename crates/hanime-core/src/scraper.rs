//! Query façade for hanime1.me
//!
//! Provides the high-level API combining the transport and the parsers.

use std::fmt::Debug;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;

use crate::client::{HanimeClient, Transport};
use crate::config::ScraperConfig;
use crate::error::{NetworkError, QueryError, QueryResult, Result};
use crate::parser::{parse_category_list, parse_detail, parse_listing, parse_tag_list};
use crate::types::{
    CategoryEntry, PageResult, RelatedVideos, TagEntry, VideoDetail, VideoId, VideoSummary,
};
use crate::url::{SearchParams, SortOrder, build_search_url, build_video_url};

/// Main query API for hanime1.me
///
/// Every operation fetches one page (or, for [`related`](Self::related), a
/// bounded fan-out of pages), parses it and caps the result. Operations do
/// not share mutable state, so one scraper can serve many concurrent calls.
pub struct HanimeScraper {
    transport: Arc<dyn Transport>,
    base_url: String,
    max_results: usize,
    related_concurrency: usize,
}

impl HanimeScraper {
    /// Create a new scraper with default configuration
    ///
    /// # Errors
    /// Returns error if HTTP client initialization fails
    pub fn new() -> Result<Self> {
        Self::with_config(&ScraperConfig::default())
    }

    /// Create a new scraper from a configuration
    ///
    /// # Errors
    /// Returns `Config` if the configuration is invalid or the HTTP client
    /// cannot be built from it
    pub fn with_config(config: &ScraperConfig) -> Result<Self> {
        config.validate()?;
        let client = HanimeClient::with_config(config.client_config())?;
        Ok(Self::with_transport(Arc::new(client), config))
    }

    /// Create a scraper on top of an existing transport
    ///
    /// Useful to share one connection pool with a
    /// [`ThumbnailPipeline`](crate::ThumbnailPipeline), or to inject a test
    /// double.
    pub fn with_transport(transport: Arc<dyn Transport>, config: &ScraperConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_search_results.max(1),
            related_concurrency: config.related_concurrency.max(1),
        }
    }

    /// The transport this scraper fetches through
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Search videos by free text
    ///
    /// # Arguments
    /// * `query` - Search text, must not be blank
    /// * `page` - 1-indexed page number
    ///
    /// # Errors
    /// - `InvalidArgument` if query is blank or page < 1 (no request is made)
    /// - `Network` if the request fails
    /// - `Parse` if the listing cannot be parsed
    ///
    /// # Example
    /// ```no_run
    /// # async fn example() -> hanime_core::Result<()> {
    /// use hanime_core::HanimeScraper;
    /// let scraper = HanimeScraper::new()?;
    /// let results = scraper.search("love live", 1).await?;
    /// for video in &results.items {
    ///     println!("{}: {}", video.id, video.title);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn search(&self, query: &str, page: i64) -> QueryResult<PageResult<VideoSummary>> {
        let operation = format!("search(query={:?}, page={})", query, page);
        let query = require_term(&operation, "query", query)?;
        let page = validate_page(&operation, page)?;

        self.listing(&operation, SearchParams::query(query).with_page(page))
            .await
    }

    /// Browse videos carrying one tag
    pub async fn browse_tag(&self, tag: &str, page: i64) -> QueryResult<PageResult<VideoSummary>> {
        let operation = format!("browse_tag(tag={:?}, page={})", tag, page);
        let tag = require_term(&operation, "tag", tag)?;
        let page = validate_page(&operation, page)?;

        self.listing(&operation, SearchParams::tags([tag]).with_page(page))
            .await
    }

    /// Browse videos carrying all of the given tags
    ///
    /// # Errors
    /// `InvalidArgument` if the list is empty or any tag is blank
    pub async fn browse_tags<S>(&self, tags: &[S], page: i64) -> QueryResult<PageResult<VideoSummary>>
    where
        S: AsRef<str> + Debug,
    {
        let operation = format!("browse_tags(tags={:?}, page={})", tags, page);
        if tags.is_empty() {
            return Err(invalid(&operation, "at least one tag is required"));
        }
        let tags = tags
            .iter()
            .map(|tag| require_term(&operation, "tag", tag.as_ref()))
            .collect::<QueryResult<Vec<_>>>()?;
        let page = validate_page(&operation, page)?;

        self.listing(&operation, SearchParams::tags(tags).with_page(page))
            .await
    }

    /// Browse one category (genre)
    pub async fn browse_category(
        &self,
        genre: &str,
        page: i64,
    ) -> QueryResult<PageResult<VideoSummary>> {
        let operation = format!("browse_category(genre={:?}, page={})", genre, page);
        let genre = require_term(&operation, "genre", genre)?;
        let page = validate_page(&operation, page)?;

        self.listing(&operation, SearchParams::genre(genre).with_page(page))
            .await
    }

    /// Newest uploads
    pub async fn latest(&self, page: i64) -> QueryResult<PageResult<VideoSummary>> {
        let operation = format!("latest(page={})", page);
        let page = validate_page(&operation, page)?;

        self.listing(&operation, SearchParams::sorted(SortOrder::Latest).with_page(page))
            .await
    }

    /// Most viewed videos
    pub async fn popular(&self, page: i64) -> QueryResult<PageResult<VideoSummary>> {
        let operation = format!("popular(page={})", page);
        let page = validate_page(&operation, page)?;

        self.listing(&operation, SearchParams::sorted(SortOrder::MostViewed).with_page(page))
            .await
    }

    /// Full metadata of one video
    ///
    /// # Errors
    /// - `NotFound` if the site answers 404 or 410 for the watch page
    /// - `Network` for any other transport failure
    /// - `Parse` if the watch page cannot be parsed
    ///
    /// # Example
    /// ```no_run
    /// # async fn example() -> hanime_core::Result<()> {
    /// use hanime_core::{HanimeScraper, VideoId};
    /// let scraper = HanimeScraper::new()?;
    /// if let Some(id) = VideoId::new(39811) {
    ///     let video = scraper.detail(id).await?;
    ///     println!("{} ({} tags)", video.title(), video.tags.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn detail(&self, id: VideoId) -> QueryResult<VideoDetail> {
        let operation = format!("detail(id={})", id);
        let url = build_video_url(&self.base_url, id);

        let html = self.fetch(&url).await.map_err(|source| match source.status() {
            Some(404) | Some(410) => QueryError::NotFound {
                operation: operation.clone(),
                what: format!("video {}", id),
            },
            _ => QueryError::Network {
                operation: operation.clone(),
                source,
            },
        })?;

        let detail = parse_detail(&html).map_err(|source| QueryError::Parse {
            operation: operation.clone(),
            source,
        })?;

        tracing::info!("{} -> {:?}", operation, detail.title());
        Ok(detail)
    }

    /// A random video
    ///
    /// Picks among the videos the site itself lists as newest, so the ID is
    /// always one the site knows about.
    ///
    /// # Errors
    /// `NotFound` if the site lists no videos at all
    pub async fn random(&self) -> QueryResult<VideoDetail> {
        let operation = "random()".to_string();
        let candidates = self
            .fetch_listing(&operation, SearchParams::sorted(SortOrder::Latest))
            .await?;

        // The RNG is not Send and must be gone before the next await
        let picked = {
            let mut rng = rand::thread_rng();
            candidates.items.choose(&mut rng).map(|video| video.id)
        };
        let Some(id) = picked else {
            return Err(QueryError::NotFound {
                operation,
                what: "random candidate".to_string(),
            });
        };

        tracing::debug!("random() picked {} out of {}", id, candidates.len());
        self.detail(id).await
    }

    /// Related videos of one video, resolved into summaries
    ///
    /// Looks up at most `max_search_results` related IDs, running up to
    /// `related_concurrency` detail lookups at once. Lookups that fail are
    /// left out and counted in [`RelatedVideos::failed`]; the rest keep the
    /// order the site lists them in.
    ///
    /// # Errors
    /// Only the lookup of `id` itself can fail the operation.
    pub async fn related(&self, id: VideoId) -> QueryResult<RelatedVideos> {
        let source = self.detail(id).await?;
        let total = source.related_ids.len();
        let ids: Vec<VideoId> = source
            .related_ids
            .into_iter()
            .take(self.max_results)
            .collect();

        let lookups: Vec<(VideoId, QueryResult<VideoDetail>)> = stream::iter(ids)
            .map(|related_id| async move { (related_id, self.detail(related_id).await) })
            .buffered(self.related_concurrency)
            .collect()
            .await;

        let mut items = Vec::with_capacity(lookups.len());
        let mut failed = 0;
        for (related_id, lookup) in lookups {
            match lookup {
                Ok(detail) => items.push(VideoSummary::from(detail)),
                Err(e) => {
                    tracing::warn!("Related lookup {} of {} failed: {}", related_id, id, e);
                    failed += 1;
                }
            }
        }

        tracing::info!(
            "related(id={}) -> {} resolved, {} failed, {} listed",
            id,
            items.len(),
            failed,
            total
        );
        Ok(RelatedVideos {
            page: PageResult::new(items, 1, total > self.max_results),
            failed,
        })
    }

    /// Tags offered by the site's search filters
    pub async fn tag_list(&self) -> QueryResult<Vec<TagEntry>> {
        let operation = "tag_list()";
        let html = self.fetch_search(operation, &SearchParams::default()).await?;
        parse_tag_list(&html).map_err(|source| QueryError::Parse {
            operation: operation.to_string(),
            source,
        })
    }

    /// Categories (genres) offered by the site's search filters
    pub async fn category_list(&self) -> QueryResult<Vec<CategoryEntry>> {
        let operation = "category_list()";
        let html = self.fetch_search(operation, &SearchParams::default()).await?;
        parse_category_list(&html).map_err(|source| QueryError::Parse {
            operation: operation.to_string(),
            source,
        })
    }

    /// Fetches and parses a listing, capped to `max_search_results`
    async fn listing(
        &self,
        operation: &str,
        params: SearchParams,
    ) -> QueryResult<PageResult<VideoSummary>> {
        let page = self.fetch_listing(operation, params).await?;
        let found = page.len();
        let page = page.truncate(self.max_results);

        tracing::info!("{} -> {} of {} results", operation, page.len(), found);
        Ok(page)
    }

    /// Fetches and parses a listing without capping it
    async fn fetch_listing(
        &self,
        operation: &str,
        params: SearchParams,
    ) -> QueryResult<PageResult<VideoSummary>> {
        let html = self.fetch_search(operation, &params).await?;
        parse_listing(&html, params.page.max(1)).map_err(|source| QueryError::Parse {
            operation: operation.to_string(),
            source,
        })
    }

    async fn fetch_search(&self, operation: &str, params: &SearchParams) -> QueryResult<String> {
        let url = build_search_url(&self.base_url, params);
        self.fetch(&url).await.map_err(|source| QueryError::Network {
            operation: operation.to_string(),
            source,
        })
    }

    async fn fetch(&self, url: &str) -> std::result::Result<String, NetworkError> {
        let body = self.transport.fetch(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn invalid(operation: &str, message: impl Into<String>) -> QueryError {
    QueryError::InvalidArgument {
        operation: operation.to_string(),
        message: message.into(),
    }
}

/// Pages are 1-indexed; anything below is rejected before any request
fn validate_page(operation: &str, page: i64) -> QueryResult<u32> {
    if page < 1 {
        return Err(invalid(operation, format!("page must be >= 1, got {}", page)));
    }
    u32::try_from(page).map_err(|_| invalid(operation, format!("page {} is out of range", page)))
}

fn require_term(operation: &str, name: &str, value: &str) -> QueryResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(operation, format!("{} cannot be empty", name)));
    }
    Ok(trimmed.to_string())
}
