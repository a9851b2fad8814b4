//! Thumbnail pipeline
//!
//! Fetches a thumbnail, optionally blurs it and stores the result in a
//! uniquely named temp file. The returned [`ThumbnailAsset`] owns that file:
//! dropping or releasing it deletes the file.

use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use image::ImageFormat;
use tempfile::NamedTempFile;

use crate::client::Transport;
use crate::config::ScraperConfig;
use crate::error::{ImageError, ThumbnailError};

/// Highest accepted blur level; larger values are clamped
pub const MAX_BLUR_LEVEL: u8 = 100;

const TEMP_PREFIX: &str = "thumb-";
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Produces scoped thumbnail files
pub struct ThumbnailPipeline {
    transport: Arc<dyn Transport>,
    dir: PathBuf,
}

impl ThumbnailPipeline {
    /// Create a pipeline writing into `dir` (created on first use)
    pub fn new(transport: Arc<dyn Transport>, dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            dir: dir.into(),
        }
    }

    /// Create a pipeline writing into the configured thumbnail directory
    pub fn from_config(transport: Arc<dyn Transport>, config: &ScraperConfig) -> Self {
        Self::new(transport, config.thumbnail_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch a thumbnail and store it, blurred when `blur_level > 0`
    ///
    /// Level 0 stores the fetched bytes unmodified without decoding them.
    /// Higher levels decode the image, apply a Gaussian blur that grows with
    /// the level and store the result as PNG. The output is deterministic
    /// for a given input and level.
    ///
    /// # Errors
    /// - `Network` if the image cannot be fetched
    /// - `Image(DecodeFailed)` if the image cannot be decoded; no file is
    ///   left behind and the original is not substituted
    ///
    /// # Example
    /// ```no_run
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// use std::sync::Arc;
    /// use hanime_core::{HanimeClient, ThumbnailPipeline};
    /// let pipeline = ThumbnailPipeline::new(Arc::new(HanimeClient::new()?), "/tmp/thumbs");
    /// let asset = pipeline.acquire("https://img.example/1.jpg", 30).await?;
    /// println!("{}", asset.path().display());
    /// asset.release()?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn acquire(&self, url: &str, blur_level: u8) -> Result<ThumbnailAsset, ThumbnailError> {
        let level = blur_level.min(MAX_BLUR_LEVEL);
        let bytes = self.transport.fetch(url).await?;
        let fetched = bytes.len();

        let dir = self.dir.clone();
        let extension = if level == 0 { source_extension(url) } else { "png" };

        let (file, len) = tokio::task::spawn_blocking(move || {
            let payload = if level == 0 { bytes } else { blur(&bytes, level)? };
            let file = write_temp(&dir, extension, &payload)?;
            Ok::<_, ImageError>((file, payload.len() as u64))
        })
        .await
        .map_err(|e| ImageError::Worker(e.to_string()))??;

        tracing::debug!(
            "Thumbnail {} ({} bytes, blur {}) -> {}",
            url,
            fetched,
            level,
            file.path().display()
        );

        Ok(ThumbnailAsset {
            file,
            len,
            blurred: level > 0,
        })
    }

    /// Delete leftover thumbnail files older than `max_age`
    ///
    /// Covers files of processes that were killed before their assets were
    /// dropped. Blocking; call it at startup or from `spawn_blocking`.
    ///
    /// # Returns
    /// Number of files removed
    pub fn sweep_stale(&self, max_age: Duration) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        // One unreadable entry must not stop the sweep
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Failed to read entry in {}: {}", self.dir.display(), e);
                    continue;
                }
            };
            let is_thumbnail = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(TEMP_PREFIX));
            if !is_thumbnail {
                continue;
            }

            let path = entry.path();
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!("Failed to stat {}: {}", path.display(), e);
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove stale thumbnail {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            tracing::info!("Removed {} stale thumbnails from {}", removed, self.dir.display());
        }
        Ok(removed)
    }
}

/// A thumbnail stored in a temp file
///
/// The file lives exactly as long as this value: it is deleted on drop
/// (including during unwinding) or by [`release`](Self::release).
#[derive(Debug)]
pub struct ThumbnailAsset {
    file: NamedTempFile,
    len: u64,
    blurred: bool,
}

impl ThumbnailAsset {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Size of the stored image in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when the stored image is a blurred re-encode
    pub fn is_blurred(&self) -> bool {
        self.blurred
    }

    pub async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }

    /// Delete the file now, reporting failures that drop would swallow
    pub fn release(self) -> io::Result<()> {
        self.file.close()
    }
}

/// Decode, blur with `sigma = 0.5 + level / 4`, encode as PNG
fn blur(bytes: &[u8], level: u8) -> Result<Vec<u8>, ImageError> {
    let decoded = image::load_from_memory(bytes).map_err(ImageError::DecodeFailed)?;
    let sigma = 0.5 + f32::from(level) / 4.0;
    let blurred = decoded.blur(sigma);

    let mut out = Cursor::new(Vec::new());
    blurred
        .write_to(&mut out, ImageFormat::Png)
        .map_err(ImageError::EncodeFailed)?;
    Ok(out.into_inner())
}

fn write_temp(dir: &Path, extension: &str, payload: &[u8]) -> Result<NamedTempFile, ImageError> {
    fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&format!(".{}", extension))
        .tempfile_in(dir)?;
    file.write_all(payload)?;
    file.flush()?;
    Ok(file)
}

/// Extension of the image URL's path, `img` when unknown
fn source_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    KNOWN_EXTENSIONS
        .iter()
        .copied()
        .find(|known| *known == extension)
        .unwrap_or("img")
}
