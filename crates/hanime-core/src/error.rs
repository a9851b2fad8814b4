//! Error types for the hanime scraper
//!
//! Each layer has its own error type so callers can tell failures apart by
//! kind instead of by message:
//! - [`NetworkError`] for transport failures
//! - [`ParseError`] when the remote page no longer looks like we expect
//! - [`QueryError`] for façade operations (wraps the two above)
//! - [`ImageError`] / [`ThumbnailError`] for the thumbnail pipeline
//!
//! [`HanimeError`] is the umbrella type used at the crate boundary.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::ConfigError;

/// Why a fetch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCause {
    /// The request did not finish within the configured timeout
    Timeout,
    /// The connection was refused or reset
    Refused,
    /// The host name could not be resolved
    Dns,
    /// TLS handshake or certificate failure
    Tls,
    /// The server answered with a non-success status code
    Status(u16),
    /// The connection dropped while the body was being read
    Interrupted,
}

impl fmt::Display for NetworkCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkCause::Timeout => f.write_str("timeout"),
            NetworkCause::Refused => f.write_str("connection refused"),
            NetworkCause::Dns => f.write_str("dns lookup failed"),
            NetworkCause::Tls => f.write_str("tls failure"),
            NetworkCause::Status(code) => write!(f, "http status {}", code),
            NetworkCause::Interrupted => f.write_str("connection interrupted"),
        }
    }
}

/// Transport-level failure
#[derive(Error, Debug)]
#[error("{cause} while fetching {url}")]
pub struct NetworkError {
    pub cause: NetworkCause,
    pub url: String,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl NetworkError {
    pub fn new(cause: NetworkCause, url: impl Into<String>) -> Self {
        Self {
            cause,
            url: url.into(),
            source: None,
        }
    }

    pub(crate) fn with_source(cause: NetworkCause, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self {
            cause,
            url: url.into(),
            source: Some(source),
        }
    }

    /// HTTP status the server answered with, if that is what failed
    pub fn status(&self) -> Option<u16> {
        match self.cause {
            NetworkCause::Status(code) => Some(code),
            _ => None,
        }
    }
}

/// The remote page could not be turned into records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A required anchor is missing, the site layout has diverged
    #[error("site layout changed: {anchor} not found on {page} page")]
    StructureChanged {
        page: &'static str,
        anchor: &'static str,
    },

    /// The payload is not a page we know at all (empty body, bot challenge)
    #[error("unrecognized page: {0}")]
    Unrecognized(String),
}

/// Classification of a [`QueryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    InvalidArgument,
    NotFound,
    Network,
    Parse,
}

/// Error returned by every façade operation
///
/// `operation` records what was attempted, e.g. `search(query="x", page=2)`.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("{operation}: invalid argument: {message}")]
    InvalidArgument { operation: String, message: String },

    #[error("{operation}: {what} not found")]
    NotFound { operation: String, what: String },

    #[error("{operation}: {source}")]
    Network {
        operation: String,
        #[source]
        source: NetworkError,
    },

    #[error("{operation}: {source}")]
    Parse {
        operation: String,
        #[source]
        source: ParseError,
    },
}

impl QueryError {
    pub fn kind(&self) -> QueryErrorKind {
        match self {
            QueryError::InvalidArgument { .. } => QueryErrorKind::InvalidArgument,
            QueryError::NotFound { .. } => QueryErrorKind::NotFound,
            QueryError::Network { .. } => QueryErrorKind::Network,
            QueryError::Parse { .. } => QueryErrorKind::Parse,
        }
    }

    /// The operation (with parameters) that failed
    pub fn operation(&self) -> &str {
        match self {
            QueryError::InvalidArgument { operation, .. }
            | QueryError::NotFound { operation, .. }
            | QueryError::Network { operation, .. }
            | QueryError::Parse { operation, .. } => operation,
        }
    }
}

/// Classification of an [`ImageError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageErrorKind {
    DecodeFailed,
    EncodeFailed,
    Io,
    Worker,
}

/// Thumbnail image processing failure
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("failed to decode thumbnail: {0}")]
    DecodeFailed(#[source] image::ImageError),

    #[error("failed to encode thumbnail: {0}")]
    EncodeFailed(#[source] image::ImageError),

    #[error("failed to write thumbnail: {0}")]
    Io(#[from] std::io::Error),

    #[error("thumbnail worker failed: {0}")]
    Worker(String),
}

impl ImageError {
    pub fn kind(&self) -> ImageErrorKind {
        match self {
            ImageError::DecodeFailed(_) => ImageErrorKind::DecodeFailed,
            ImageError::EncodeFailed(_) => ImageErrorKind::EncodeFailed,
            ImageError::Io(_) => ImageErrorKind::Io,
            ImageError::Worker(_) => ImageErrorKind::Worker,
        }
    }
}

/// Error returned by [`crate::ThumbnailPipeline::acquire`]
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Umbrella error for the crate boundary
///
/// Implements Display for human-readable messages and Serialize so it
/// can be handed to a formatting layer as a plain string.
#[derive(Error, Debug)]
pub enum HanimeError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Serialize for HanimeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for crate-boundary operations
pub type Result<T> = std::result::Result<T, HanimeError>;

/// Result type alias for façade operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;
