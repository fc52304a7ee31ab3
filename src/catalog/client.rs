//! HTTP client for the remote catalog API
//!
//! Wraps `reqwest` with rate limiting (global concurrency semaphore plus a
//! minimum per-host request interval) and maps transport and status failures
//! onto the classified [`SyncError`] taxonomy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::CatalogApi;
use crate::config::{CatalogConfig, RateLimitConfig};
use crate::error::SyncError;
use crate::models::{ProductDetail, ProductPage};

/// Rate-limited HTTP client for the remote catalog
///
/// Features:
/// - Per-host request interval enforcement
/// - Global concurrent request limiting via semaphore
/// - HTTP 429 handling with Retry-After support
/// - Status-code classification into retryable vs. permanent errors
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    semaphore: Arc<Semaphore>,
    last_request: Arc<Mutex<HashMap<String, Instant>>>,
    rate_limit: RateLimitConfig,
}

impl HttpCatalogClient {
    /// Create a new client from catalog configuration
    pub fn new(config: &CatalogConfig) -> Result<Self, SyncError> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client with a custom reqwest Client (for testing)
    pub fn with_client(client: Client, config: &CatalogConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            semaphore: Arc::new(Semaphore::new(config.rate_limit.max_concurrent)),
            last_request: Arc::new(Mutex::new(HashMap::new())),
            rate_limit: config.rate_limit.clone(),
        }
    }

    /// Number of available concurrent-request permits
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Perform a GET request and decode the JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SyncError> {
        let body = self.get(url).await?;
        serde_json::from_slice(&body).map_err(|e| SyncError::InvalidData(e.to_string()))
    }

    /// Perform a GET request, returning the raw body
    async fn get(&self, url: &str) -> Result<Bytes, SyncError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| SyncError::Network("request limiter closed".to_string()))?;

        self.wait_for_rate_limit(url).await;

        debug!(url = url, "Sending HTTP GET request");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout(self.request_timeout)
            } else if e.is_connect() {
                SyncError::ConnectionRefused
            } else {
                SyncError::Network(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| SyncError::Network(e.to_string()))?;
                debug!(url = url, body_size = body.len(), "Received response");
                Ok(body)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let wait = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(self.rate_limit.rate_limit_wait_secs);

                warn!(url = url, retry_after = wait, "Rate limited by upstream");
                Err(SyncError::RateLimited(wait))
            }
            StatusCode::NOT_FOUND => {
                debug!(url = url, "Resource not found (404)");
                Err(SyncError::NotFound)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(url = url, status = ?response.status(), "Unauthorized");
                Err(SyncError::Unauthorized)
            }
            status => {
                warn!(url = url, status = status.as_u16(), "Error status");
                Err(SyncError::ServerError(status.as_u16()))
            }
        }
    }

    /// Wait out the minimum request interval for the given URL's host
    async fn wait_for_rate_limit(&self, url: &str) {
        let host = extract_host(url);
        let min_interval = Duration::from_millis(self.rate_limit.min_interval_ms);

        let mut last_requests = self.last_request.lock().await;

        if let Some(last) = last_requests.get(&host) {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                let wait_time = min_interval - elapsed;
                debug!(
                    host = host,
                    wait_ms = wait_time.as_millis(),
                    "Waiting for rate limit"
                );
                drop(last_requests); // Release lock while waiting
                tokio::time::sleep(wait_time).await;
                last_requests = self.last_request.lock().await;
            }
        }

        last_requests.insert(host, Instant::now());
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    async fn list_page(&self, page: u32, lang: &str) -> Result<ProductPage, SyncError> {
        let url = format!("{}/products?lang={}&page={}", self.base_url, lang, page);
        self.get_json(&url).await
    }

    async fn get_product(&self, id: &str, lang: &str) -> Result<ProductDetail, SyncError> {
        let url = format!("{}/products/{}?lang={}", self.base_url, id, lang);
        self.get_json(&url).await
    }
}

/// Extract the host portion of a URL for rate limiting purposes
fn extract_host(url: &str) -> String {
    url.split("://")
        .nth(1)
        .and_then(|s| s.split('/').next())
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> CatalogConfig {
        CatalogConfig {
            base_url,
            rate_limit: RateLimitConfig {
                min_interval_ms: 0,
                max_concurrent: 4,
                rate_limit_wait_secs: 60,
            },
            ..CatalogConfig::default()
        }
    }

    fn client_for(server: &MockServer) -> HttpCatalogClient {
        HttpCatalogClient::new(&test_config(server.uri())).unwrap()
    }

    // Test 1: Listing page is fetched and decoded
    #[tokio::test]
    async fn test_list_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("page", "2"))
            .and(query_param("lang", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "items": [{"id": "p-1", "name": "Hammer"}, {"id": "p-2", "name": "Saw"}],
                    "page": 2,
                    "total_count": 42,
                    "total_pages": 3
                }"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let page = client_for(&server).list_page(2, "en").await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.page, 2);
        assert_eq!(page.total_count, 42);
        assert_eq!(page.total_pages, 3);
    }

    // Test 2: Product detail is fetched and decoded
    #[tokio::test]
    async fn test_get_product() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/p-7"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "id": "p-7",
                    "name": "Cordless Drill",
                    "category": "Power Tools",
                    "description": "18V drill. Includes two batteries.",
                    "sku": "CD-18",
                    "price_cents": 12999,
                    "currency": "EUR",
                    "stock_quantity": 42
                }"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let detail = client_for(&server).get_product("p-7", "en").await.unwrap();

        assert_eq!(detail.id, "p-7");
        assert_eq!(detail.category, "Power Tools");
        assert_eq!(detail.price_cents, 12999);
    }

    // Test 3: HTTP 404 maps to NotFound
    #[tokio::test]
    async fn test_404_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client_for(&server).get_product("missing", "en").await;
        assert_eq!(result.unwrap_err(), SyncError::NotFound);
    }

    // Test 4: HTTP 429 maps to RateLimited with the Retry-After value
    #[tokio::test]
    async fn test_429_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
            .mount(&server)
            .await;

        let result = client_for(&server).list_page(1, "en").await;
        assert_eq!(result.unwrap_err(), SyncError::RateLimited(120));
    }

    // Test 5: HTTP 429 without Retry-After uses the configured default
    #[tokio::test]
    async fn test_429_default_wait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client_for(&server).list_page(1, "en").await;
        assert_eq!(result.unwrap_err(), SyncError::RateLimited(60));
    }

    // Test 6: HTTP 5xx maps to ServerError
    #[tokio::test]
    async fn test_5xx_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client_for(&server).list_page(1, "en").await;
        assert_eq!(result.unwrap_err(), SyncError::ServerError(503));
    }

    // Test 7: Undecodable body maps to InvalidData
    #[tokio::test]
    async fn test_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server).list_page(1, "en").await;
        assert!(matches!(result.unwrap_err(), SyncError::InvalidData(_)));
    }

    // Test 8: Concurrent requests are bounded by the semaphore
    #[tokio::test]
    async fn test_concurrent_request_limiting() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(
                        r#"{"items": [], "page": 1, "total_count": 0, "total_pages": 0}"#,
                        "application/json",
                    )
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let mut config = test_config(server.uri());
        config.rate_limit.max_concurrent = 2;
        let client = Arc::new(HttpCatalogClient::new(&config).unwrap());

        let start = std::time::Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let c = client.clone();
                tokio::spawn(async move { c.list_page(1, "en").await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // With max_concurrent=2, 3 requests of 100ms each take ~200ms
        assert!(
            start.elapsed() >= Duration::from_millis(150),
            "Requests should be limited: {:?}",
            start.elapsed()
        );
    }

    // Test 9: Minimum request interval is enforced per host
    #[tokio::test]
    async fn test_min_interval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"items": [], "page": 1, "total_count": 0, "total_pages": 0}"#,
                "application/json",
            ))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = test_config(server.uri());
        config.rate_limit.min_interval_ms = 100;
        let client = HttpCatalogClient::new(&config).unwrap();

        let start = std::time::Instant::now();
        client.list_page(1, "en").await.unwrap();
        client.list_page(1, "en").await.unwrap();

        assert!(
            start.elapsed() >= Duration::from_millis(90),
            "Second request should wait: {:?}",
            start.elapsed()
        );
    }

    // Test 10: Host extraction for the interval map
    #[test]
    fn test_extract_host() {
        assert_eq!(extract_host("https://example.com/path"), "example.com");
        assert_eq!(
            extract_host("http://api.example.com:8080/x"),
            "api.example.com:8080"
        );
        assert_eq!(extract_host("invalid"), "invalid");
    }
}
