//! Page fetch sessions
//!
//! This module defines the fetch collaborator used by discovery and extraction:
//! - `FetchSession`: one isolated browsing session (navigate, wait, reveal, read)
//! - `SessionFactory`: opens a fresh session per worker
//! - `HttpSession`: the default session, backed by a `reqwest` client
//!
//! A session is released when it is dropped, so every exit path of a worker
//! (including a panic unwinding through it) gives its session back.

use crate::config::FetcherConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a fetch session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The page could not be loaded (connection failure, HTTP error status, ...)
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// The page did not load or become ready within the allowed time
    #[error("Timed out loading {url}")]
    PageTimeout { url: String },

    /// Content was requested before any page was loaded
    #[error("No page loaded in this session")]
    NoPage,

    /// A session could not be opened
    #[error("Failed to open fetch session: {0}")]
    Session(String),
}

/// One isolated page-fetching session
///
/// Sessions are never shared between workers; each worker opens its own
/// through a [`SessionFactory`] and drops it when its chunk is finished.
#[async_trait]
pub trait FetchSession: Send {
    /// Loads `url` as the session's current page
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError>;

    /// Waits, at most `timeout`, for the current page to be ready for reading
    async fn wait_for_ready(&mut self, timeout: Duration) -> Result<(), FetchError>;

    /// Best-effort expansion of truncated content ("show more")
    ///
    /// Returns true if something was expanded. Failures are swallowed.
    async fn try_reveal_more(&mut self) -> bool;

    /// Returns the current page content
    async fn content(&mut self) -> Result<String, FetchError>;
}

/// Opens independent fetch sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn FetchSession>, FetchError>;
}

/// Loads a page and returns its content once ready
///
/// When `reveal` is set, a best-effort expansion of truncated content runs
/// between the readiness wait and the content read.
pub async fn load_page(
    session: &mut dyn FetchSession,
    url: &str,
    ready_timeout: Duration,
    reveal: bool,
) -> Result<String, FetchError> {
    session.navigate(url).await?;
    session.wait_for_ready(ready_timeout).await?;

    if reveal && session.try_reveal_more().await {
        tracing::trace!("Expanded truncated content on {}", url);
    }

    session.content().await
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::FetcherConfig;
/// use catalog_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.page_load_timeout())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// A page loaded by an [`HttpSession`]
#[derive(Debug, Clone)]
struct LoadedPage {
    url: String,
    body: String,
}

/// Fetch session backed by a dedicated HTTP client
///
/// Served markup is complete as delivered, so readiness only requires a
/// loaded, non-empty page and there is never anything to reveal.
pub struct HttpSession {
    id: usize,
    client: Client,
    current: Option<LoadedPage>,
}

impl HttpSession {
    pub fn new(id: usize, client: Client) -> Self {
        tracing::debug!("Opened fetch session {}", id);
        Self {
            id,
            client,
            current: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl FetchSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        self.current = None;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Navigation {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| classify_error(url, e))?;

        self.current = Some(LoadedPage {
            url: final_url,
            body,
        });
        Ok(())
    }

    async fn wait_for_ready(&mut self, _timeout: Duration) -> Result<(), FetchError> {
        match &self.current {
            Some(page) if !page.body.trim().is_empty() => Ok(()),
            Some(page) => Err(FetchError::PageTimeout {
                url: page.url.clone(),
            }),
            None => Err(FetchError::NoPage),
        }
    }

    async fn try_reveal_more(&mut self) -> bool {
        false
    }

    async fn content(&mut self) -> Result<String, FetchError> {
        self.current
            .as_ref()
            .map(|page| page.body.clone())
            .ok_or(FetchError::NoPage)
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        tracing::debug!("Released fetch session {}", self.id);
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::PageTimeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Navigation {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Navigation {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Opens [`HttpSession`]s, each with its own client and connection pool
pub struct HttpSessionFactory {
    config: FetcherConfig,
    next_id: AtomicUsize,
}

impl HttpSessionFactory {
    pub fn new(config: FetcherConfig) -> Self {
        Self {
            config,
            next_id: AtomicUsize::new(1),
        }
    }
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self) -> Result<Box<dyn FetchSession>, FetchError> {
        let client =
            build_http_client(&self.config).map_err(|e| FetchError::Session(e.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(HttpSession::new(id, client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> FetcherConfig {
        FetcherConfig {
            user_agent: "TestHarvester/1.0".to_string(),
            page_load_timeout_secs: 5,
            ready_timeout_secs: 1,
            connect_timeout_secs: 1,
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config()).is_ok());
    }

    #[tokio::test]
    async fn test_load_page_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/book/show/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>ok</body></html>"))
            .mount(&server)
            .await;

        let factory = HttpSessionFactory::new(create_test_config());
        let mut session = factory.open().await.unwrap();
        let url = format!("{}/book/show/1", server.uri());

        let content = load_page(session.as_mut(), &url, Duration::from_secs(1), true)
            .await
            .unwrap();
        assert!(content.contains("ok"));
    }

    #[tokio::test]
    async fn test_http_error_is_navigation_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let factory = HttpSessionFactory::new(create_test_config());
        let mut session = factory.open().await.unwrap();
        let url = format!("{}/book/show/missing", server.uri());

        let result = session.navigate(&url).await;
        assert!(matches!(result, Err(FetchError::Navigation { .. })));
        assert_eq!(session.content().await, Err(FetchError::NoPage));
    }

    #[tokio::test]
    async fn test_empty_body_never_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   "))
            .mount(&server)
            .await;

        let factory = HttpSessionFactory::new(create_test_config());
        let mut session = factory.open().await.unwrap();
        session.navigate(&server.uri()).await.unwrap();

        let result = session.wait_for_ready(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(FetchError::PageTimeout { .. })));
    }

    #[tokio::test]
    async fn test_content_before_navigate() {
        let factory = HttpSessionFactory::new(create_test_config());
        let mut session = factory.open().await.unwrap();
        assert_eq!(session.content().await, Err(FetchError::NoPage));
        assert!(!session.try_reveal_more().await);
    }
}
