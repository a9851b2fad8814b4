//! HTTP transport for hanime1.me
//!
//! Provides the [`Transport`] seam used by the façade and the thumbnail
//! pipeline, and [`HanimeClient`], its reqwest implementation with optional
//! proxying and bounded retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::config::ConfigError;
use crate::error::{HanimeError, NetworkCause, NetworkError, Result};

/// Hard upper bound for configured retries
pub const MAX_RETRIES_CAP: u32 = 3;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "zh-TW,zh;q=0.9,en;q=0.8,ja;q=0.7";

/// Something that can fetch a URL and hand back the whole body
///
/// Implementations must either return the complete body or fail; a
/// truncated body is never returned.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, NetworkError>;
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Proxy URI (http, https, socks5); `None` connects directly
    pub proxy: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Retry attempts for transient errors (default: 0, capped at 3)
    pub max_retries: u32,
    /// Base delay of the exponential backoff in milliseconds (default: 1000)
    pub retry_backoff_ms: u64,
    /// Sent as `Referer` on every request
    pub referer: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 1000,
            referer: None,
        }
    }
}

/// HTTP client wrapper implementing [`Transport`]
///
/// Handles all HTTP communication with the site:
/// - one pooled `reqwest::Client`, safe to share between tasks
/// - optional proxy for every request
/// - browser-like headers (User-Agent, Accept-Language, Referer)
/// - bounded retries with exponential backoff, off by default
pub struct HanimeClient {
    client: reqwest::Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HanimeClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    ///
    /// # Errors
    /// Returns `Config` if the proxy URI or a header value is invalid
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));
        if let Some(referer) = &config.referer {
            let value = HeaderValue::from_str(referer)
                .map_err(|e| invalid_config(format!("invalid referer {:?}: {}", referer, e)))?;
            headers.insert(header::REFERER, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .default_headers(headers);

        // Unset means direct, not "whatever HTTP_PROXY says"
        builder = match &config.proxy {
            Some(proxy) => {
                let proxy = reqwest::Proxy::all(proxy.as_str())
                    .map_err(|e| invalid_config(format!("invalid proxy {:?}: {}", proxy, e)))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|e| invalid_config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: config.max_retries.min(MAX_RETRIES_CAP),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// Internal method to fetch with retry logic
    async fn fetch_with_retry(&self, url: &str) -> std::result::Result<Vec<u8>, NetworkError> {
        let mut attempt = 0;

        loop {
            match self.do_fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) if Self::is_retryable(&e) && attempt < self.max_retries => {
                    // Exponential backoff: base, 2x base, 4x base
                    let backoff = self.retry_backoff * (1 << attempt);
                    tracing::debug!(
                        "Retrying {} after {:?} ({}), attempt {}",
                        url,
                        backoff,
                        e.cause,
                        attempt + 1
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Perform a single fetch attempt
    async fn do_fetch(&self, url: &str) -> std::result::Result<Vec<u8>, NetworkError> {
        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NetworkError::with_source(classify(&e), url, e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("{} answered {}", url, status);
            return Err(NetworkError::new(NetworkCause::Status(status.as_u16()), url));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::with_source(classify_body(&e), url, e))?;

        tracing::debug!("Got {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }

    /// Check if an error is retryable
    fn is_retryable(error: &NetworkError) -> bool {
        match error.cause {
            NetworkCause::Timeout | NetworkCause::Refused | NetworkCause::Interrupted => true,
            NetworkCause::Status(code) => code == 429 || (500..600).contains(&code),
            NetworkCause::Dns | NetworkCause::Tls => false,
        }
    }
}

#[async_trait]
impl Transport for HanimeClient {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, NetworkError> {
        self.fetch_with_retry(url).await
    }
}

fn invalid_config(message: String) -> HanimeError {
    HanimeError::Config(ConfigError::Invalid(message))
}

/// Maps a send-phase reqwest error to a cause
fn classify(error: &reqwest::Error) -> NetworkCause {
    if error.is_timeout() {
        return NetworkCause::Timeout;
    }
    if let Some(status) = error.status() {
        return NetworkCause::Status(status.as_u16());
    }

    // reqwest does not expose DNS/TLS failures as kinds, only via the source
    // chain. The top-level message embeds the URL, so it is left out.
    let chain = std::error::Error::source(error)
        .map(error_chain)
        .unwrap_or_default();
    if let Some(cause) = connect_cause(&chain) {
        cause
    } else if error.is_body() || error.is_decode() {
        NetworkCause::Interrupted
    } else {
        NetworkCause::Refused
    }
}

/// Recognizes DNS and TLS failures in an error source chain
fn connect_cause(chain: &str) -> Option<NetworkCause> {
    let chain = chain.to_lowercase();
    if chain.contains("dns")
        || chain.contains("lookup")
        || chain.contains("resolve")
        || chain.contains("name or service not known")
    {
        Some(NetworkCause::Dns)
    } else if chain.contains("certificate")
        || chain.contains("tls")
        || chain.contains("ssl")
        || chain.contains("handshake")
    {
        Some(NetworkCause::Tls)
    } else {
        None
    }
}

/// Maps a body-phase reqwest error to a cause
fn classify_body(error: &reqwest::Error) -> NetworkCause {
    if error.is_timeout() {
        NetworkCause::Timeout
    } else {
        NetworkCause::Interrupted
    }
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> ClientConfig {
        ClientConfig {
            timeout_secs: 2,
            retry_backoff_ms: 10,
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.proxy, None);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_client_creation() {
        assert!(HanimeClient::new().is_ok());
    }

    #[test]
    fn test_client_with_proxy() {
        let config = ClientConfig {
            proxy: Some("socks5://127.0.0.1:1080".to_string()),
            ..ClientConfig::default()
        };
        assert!(HanimeClient::with_config(config).is_ok());
    }

    #[test]
    fn test_client_rejects_bad_proxy() {
        let config = ClientConfig {
            proxy: Some("::not a proxy::".to_string()),
            ..ClientConfig::default()
        };
        match HanimeClient::with_config(config) {
            Err(HanimeError::Config(ConfigError::Invalid(msg))) => assert!(msg.contains("proxy")),
            other => panic!("Expected Config error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_retries_are_capped() {
        let config = ClientConfig {
            max_retries: 50,
            ..ClientConfig::default()
        };
        let client = HanimeClient::with_config(config).unwrap();
        assert_eq!(client.max_retries, MAX_RETRIES_CAP);
    }

    #[test]
    fn test_is_retryable() {
        let retryable = |cause| HanimeClient::is_retryable(&NetworkError::new(cause, "u"));
        assert!(retryable(NetworkCause::Timeout));
        assert!(retryable(NetworkCause::Status(503)));
        assert!(retryable(NetworkCause::Status(429)));
        assert!(!retryable(NetworkCause::Status(404)));
        assert!(!retryable(NetworkCause::Dns));
        assert!(!retryable(NetworkCause::Tls));
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HanimeClient::with_config(fast_config()).unwrap();
        let body = client.fetch(&format!("{}/search", server.uri())).await.unwrap();
        assert_eq!(body, b"<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_status_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig {
            max_retries: 2,
            ..fast_config()
        };
        let client = HanimeClient::with_config(config).unwrap();
        let error = client
            .fetch(&format!("{}/watch?v=1", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(error.cause, NetworkCause::Status(404));
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = HanimeClient::with_config(fast_config()).unwrap();
        let error = client.fetch(&server.uri()).await.unwrap_err();
        assert_eq!(error.cause, NetworkCause::Status(503));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("second time lucky"))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig {
            max_retries: 1,
            ..fast_config()
        };
        let client = HanimeClient::with_config(config).unwrap();
        let body = client.fetch(&server.uri()).await.unwrap();
        assert_eq!(body, b"second time lucky");
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let config = ClientConfig {
            timeout_secs: 1,
            ..fast_config()
        };
        let client = HanimeClient::with_config(config).unwrap();
        let error = client.fetch(&server.uri()).await.unwrap_err();
        assert_eq!(error.cause, NetworkCause::Timeout);
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop a listener so the port is known to be closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HanimeClient::with_config(fast_config()).unwrap();
        let error = client.fetch(&format!("http://{}/", addr)).await.unwrap_err();
        assert_eq!(error.cause, NetworkCause::Refused);
    }

    #[tokio::test]
    async fn test_refused_url_words_do_not_change_cause() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HanimeClient::with_config(fast_config()).unwrap();
        let url = format!("http://{}/search?query=dns-lookup-resolve-ssl-tls-handshake", addr);
        let error = client.fetch(&url).await.unwrap_err();
        assert_eq!(error.cause, NetworkCause::Refused);
    }

    #[test]
    fn test_connect_cause() {
        assert_eq!(
            connect_cause("client error (Connect): dns error: failed to lookup address information"),
            Some(NetworkCause::Dns)
        );
        assert_eq!(
            connect_cause("client error (Connect): invalid peer certificate: UnknownIssuer"),
            Some(NetworkCause::Tls)
        );
        assert_eq!(
            connect_cause("client error (Connect): tcp connect error: Connection refused (os error 111)"),
            None
        );
        assert_eq!(connect_cause(""), None);
    }

    #[tokio::test]
    async fn test_requests_route_through_proxy() {
        // The mock server acts as a plain HTTP proxy for an unresolvable host
        let proxy = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
            .expect(1)
            .mount(&proxy)
            .await;

        let config = ClientConfig {
            proxy: Some(proxy.uri()),
            ..fast_config()
        };
        let client = HanimeClient::with_config(config).unwrap();
        let body = client.fetch("http://hanime.invalid/search").await.unwrap();
        assert_eq!(body, b"via proxy");
    }
}
