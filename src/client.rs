//! HTTP client for the flight plan search endpoint.
//!
//! [`SearchClient`] issues a single form POST per page. [`PageFetcher`] wraps
//! any [`PageSource`] and keeps retrying that page until the server answers
//! with a 200.

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL},
    Client, StatusCode,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Search endpoint of the CAAC flight plan service.
pub const DEFAULT_SEARCH_URL: &str =
    "http://www.caac.gov.cn/caacgov/frontend/flight/plan/getlist.do";

/// Page size the server pages with. Pagination math depends on every
/// request using the same value.
pub const DEFAULT_PAGE_SIZE: u32 = 15;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Request timed out")]
    Timeout,
    #[error("Server returned error status: {status}")]
    ServerError { status: StatusCode },
}

/// Configuration for the search client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Search endpoint URL
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Fixed pause before every attempt at a page
    pub retry_delay: Duration,
    /// `pageSize` sent with every request
    pub page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SEARCH_URL.to_string(),
            timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Form fields for one page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageQuery {
    #[serde(rename = "ori")]
    pub origin: String,
    #[serde(rename = "arr")]
    pub destination: String,
    #[serde(rename = "pageIndex")]
    pub page_index: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
}

/// Something that can answer a single page request with a raw body.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Send one request. `Ok` only for a 200 response.
    async fn post_page(&self, query: &PageQuery) -> Result<String, ClientError>;
}

/// reqwest-backed [`PageSource`] talking to the real endpoint.
pub struct SearchClient {
    client: Client,
    url: String,
}

impl SearchClient {
    /// Create a new search client.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert("pragma", HeaderValue::from_static("no-cache"));
        headers.insert(
            "x-requested-with",
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl PageSource for SearchClient {
    async fn post_page(&self, query: &PageQuery) -> Result<String, ClientError> {
        tracing::debug!(
            "POST {} ori={} arr={} pageIndex={}",
            self.url,
            query.origin,
            query.destination,
            query.page_index
        );

        let response = self
            .client
            .post(&self.url)
            .form(query)
            .send()
            .await
            .map_err(classify)?;

        match response.status() {
            StatusCode::OK => Ok(response.text().await.map_err(classify)?),
            status => Err(ClientError::ServerError { status }),
        }
    }
}

fn classify(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Request(e)
    }
}

/// A successfully fetched page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub body: String,
    /// Failed attempts before the one that succeeded
    pub retries: u32,
}

/// Fetches single pages, retrying each one until it succeeds.
///
/// There is no retry limit and no escalating backoff: the upstream service
/// is flaky but eventually answers, so every attempt waits the same fixed
/// delay, the first one included.
pub struct PageFetcher<S> {
    source: S,
    page_size: u32,
    retry_delay: Duration,
}

impl<S: PageSource> PageFetcher<S> {
    pub fn new(source: S, config: &ClientConfig) -> Self {
        Self {
            source,
            page_size: config.page_size,
            retry_delay: config.retry_delay,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch one page of results for a route. Never fails.
    pub async fn fetch(&self, origin: &str, destination: &str, page_index: u32) -> FetchedPage {
        let query = PageQuery {
            origin: origin.to_string(),
            destination: destination.to_string(),
            page_index,
            page_size: self.page_size,
        };

        let mut retries = 0;

        loop {
            sleep(self.retry_delay).await;

            match self.source.post_page(&query).await {
                Ok(body) => return FetchedPage { body, retries },
                Err(e) => {
                    retries += 1;
                    tracing::warn!(
                        "Retrying {} -> {} page {} (attempt {}): {}",
                        query.origin,
                        query.destination,
                        query.page_index,
                        retries + 1,
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Replays a fixed list of responses and records every query it sees.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<String, ClientError>>>,
        seen: Mutex<Vec<PageQuery>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<String, ClientError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn post_page(&self, query: &PageQuery) -> Result<String, ClientError> {
            self.seen.lock().push(query.clone());
            self.responses
                .lock()
                .pop_front()
                .expect("source queried more times than scripted")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_retries_until_success() {
        let source = ScriptedSource::new(vec![
            Err(ClientError::Timeout),
            Err(ClientError::ServerError {
                status: StatusCode::BAD_GATEWAY,
            }),
            Ok("{\"success\": true}".to_string()),
        ]);
        let config = ClientConfig::default().with_retry_delay(Duration::from_secs(1));
        let fetcher = PageFetcher::new(source, &config);

        let start = tokio::time::Instant::now();
        let page = fetcher.fetch("上海", "东京", 3).await;
        let elapsed = start.elapsed();

        assert_eq!(page.retries, 2);
        assert_eq!(page.body, "{\"success\": true}");
        // One fixed pause ahead of each of the three attempts
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));

        let seen = fetcher.source.seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|q| q == &seen[0]));
        assert_eq!(seen[0].page_index, 3);
        assert_eq!(seen[0].page_size, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_does_not_validate_body() {
        let source = ScriptedSource::new(vec![Ok(String::new())]);
        let fetcher = PageFetcher::new(source, &ClientConfig::default());

        let page = fetcher.fetch("A", "X", 1).await;
        assert_eq!(page.retries, 0);
        assert!(page.body.is_empty());
    }

    /// Serve a single HTTP response on a local port and hand back the raw
    /// request that was received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/getlist.do", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&buf);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&buf).into_owned()
        });

        (url, handle)
    }

    fn query() -> PageQuery {
        PageQuery {
            origin: "A".to_string(),
            destination: "X".to_string(),
            page_index: 2,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[tokio::test]
    async fn test_search_client_posts_form() {
        let (url, server) = serve_once("200 OK", r#"{"success":true}"#).await;
        let client = SearchClient::new(&ClientConfig::default().with_url(url)).unwrap();

        let body = client.post_page(&query()).await.unwrap();
        assert_eq!(body, r#"{"success":true}"#);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /getlist.do"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"));
        assert!(request.ends_with("ori=A&arr=X&pageIndex=2&pageSize=15"));
    }

    #[tokio::test]
    async fn test_search_client_rejects_error_status() {
        let (url, server) = serve_once("503 Service Unavailable", "busy").await;
        let client = SearchClient::new(&ClientConfig::default().with_url(url)).unwrap();

        let err = client.post_page(&query()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::ServerError { status } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
        server.await.unwrap();
    }
}
