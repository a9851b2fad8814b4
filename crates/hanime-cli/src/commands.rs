use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::json;

use hanime_core::{
    ConfigError, HanimeError, HanimeScraper, ImageErrorKind, NetworkCause, ParseError, QueryError,
    ScraperConfig, ThumbnailError, ThumbnailPipeline, VideoId, extract_video_id,
};

use crate::cli::Commands;

pub async fn run(command: Commands, config: &ScraperConfig, scraper: &HanimeScraper) -> Result<()> {
    match command {
        Commands::Search { query, page } => print(&scraper.search(&query.join(" "), page).await?),
        Commands::Tag { tags, page } => {
            let tags = split_tags(&tags);
            print(&scraper.browse_tags(&tags, page).await?)
        }
        Commands::Category { genre, page } => print(&scraper.browse_category(&genre, page).await?),
        Commands::Latest { page } => print(&scraper.latest(page).await?),
        Commands::Popular { page } => print(&scraper.popular(page).await?),
        Commands::Detail { video } => print(&scraper.detail(resolve_id(&video)?).await?),
        Commands::Random => print(&scraper.random().await?),
        Commands::Related { video } => print(&scraper.related(resolve_id(&video)?).await?),
        Commands::Tags => print(&scraper.tag_list().await?),
        Commands::Categories => print(&scraper.category_list().await?),
        Commands::Thumb { video, blur } => thumbnail(config, scraper, &video, blur).await,
    }
}

async fn thumbnail(
    config: &ScraperConfig,
    scraper: &HanimeScraper,
    video: &str,
    blur: Option<u8>,
) -> Result<()> {
    let detail = scraper.detail(resolve_id(video)?).await?;
    let url = detail
        .summary
        .thumbnail_url
        .as_deref()
        .ok_or_else(|| anyhow!("video {} has no thumbnail", detail.id()))?;

    let pipeline = ThumbnailPipeline::from_config(scraper.transport(), config);
    let asset = pipeline
        .acquire(url, blur.unwrap_or(config.blur_level))
        .await?;

    print(&json!({
        "id": detail.id(),
        "path": asset.path(),
        "bytes": asset.len(),
        "blurred": asset.is_blurred(),
    }))?;

    asset
        .release()
        .with_context(|| format!("failed to remove thumbnail of video {}", detail.id()))
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split([',', '，'])
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve_id(input: &str) -> Result<VideoId> {
    extract_video_id(input).ok_or_else(|| anyhow!("not a video id or watch URL: {:?}", input))
}

/// One human-readable line per failure kind
pub fn describe(error: &anyhow::Error) -> String {
    if let Some(e) = error.downcast_ref::<QueryError>() {
        return describe_query(e);
    }
    if let Some(e) = error.downcast_ref::<ThumbnailError>() {
        return describe_thumbnail(e);
    }
    if let Some(e) = error.downcast_ref::<HanimeError>() {
        return match e {
            HanimeError::Query(e) => describe_query(e),
            HanimeError::Thumbnail(e) => describe_thumbnail(e),
            HanimeError::Config(e) => describe_config(e),
        };
    }
    if let Some(e) = error.downcast_ref::<ConfigError>() {
        return describe_config(e);
    }
    format!("{:#}", error)
}

fn describe_query(error: &QueryError) -> String {
    match error {
        QueryError::InvalidArgument { message, .. } => format!("invalid argument: {}", message),
        QueryError::NotFound { .. } => "video not found".to_string(),
        QueryError::Network { source, .. } => match source.cause {
            NetworkCause::Timeout => "site timed out".to_string(),
            NetworkCause::Status(code) => format!("site answered HTTP {}", code),
            NetworkCause::Dns | NetworkCause::Refused | NetworkCause::Tls | NetworkCause::Interrupted => {
                "site unreachable".to_string()
            }
        },
        QueryError::Parse { source, .. } => match source {
            ParseError::StructureChanged { .. } => "site layout changed, please report".to_string(),
            ParseError::Unrecognized(_) => "site returned an unexpected page (anti-bot check?)".to_string(),
        },
    }
}

fn describe_thumbnail(error: &ThumbnailError) -> String {
    match error {
        ThumbnailError::Network(_) => "thumbnail unreachable".to_string(),
        ThumbnailError::Image(e) => match e.kind() {
            ImageErrorKind::DecodeFailed => "thumbnail could not be decoded".to_string(),
            ImageErrorKind::EncodeFailed | ImageErrorKind::Io | ImageErrorKind::Worker => {
                "thumbnail processing failed".to_string()
            }
        },
    }
}

fn describe_config(error: &ConfigError) -> String {
    format!("invalid configuration: {}", error)
}
