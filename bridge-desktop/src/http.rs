//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{ByteSource, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use futures_util::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// User agent of the mobile client whose gateway behaviour the core relies on.
pub const DEFAULT_USER_AGENT: &str = "Deezer/8.32.0.2 (iOS; 14.4; Mobile; en; iPhone10_5)";

/// Default timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - Single-attempt [`HttpClient::execute`]: every status comes back as a response
/// - Opt-in retry with exponential backoff on 5xx, 429 and connection failures
///   through [`HttpClient::execute_with_retry`]
/// - Streaming downloads
///
/// Client errors (4xx) are never retried. A retryable status on the final
/// attempt is returned as a response too, so callers see the real status.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::try_with_config(timeout, DEFAULT_USER_AGENT).expect("Failed to build HTTP client")
    }

    /// Build a client, reporting TLS backend initialisation failures.
    pub fn try_with_config(timeout: Duration, user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    fn backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
        if policy.use_exponential_backoff {
            let exponential_delay = policy.base_delay * 2u32.pow(attempt.saturating_sub(1));
            exponential_delay.min(policy.max_delay)
        } else {
            policy.base_delay
        }
    }

    async fn execute_with_retry_internal(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < policy.max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts = policy.max_attempts,
                method = ?request.method,
                "Executing HTTP request"
            );

            match self.build_request(request.clone()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    let retryable = status >= 500 || status == 429;
                    if retryable && attempt + 1 < policy.max_attempts {
                        warn!(status, attempt = attempt + 1, "Retryable HTTP status");
                        last_error = Some(BridgeError::OperationFailed(format!(
                            "HTTP {} error",
                            status
                        )));
                    } else {
                        let headers: HashMap<String, String> = response
                            .headers()
                            .iter()
                            .filter_map(|(k, v)| {
                                v.to_str().ok().map(|s| (k.to_string(), s.to_string()))
                            })
                            .collect();

                        let body = response
                            .bytes()
                            .await
                            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

                        return Ok(HttpResponse {
                            status,
                            headers,
                            body,
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "HTTP request failed");

                    last_error = Some(if e.is_timeout() {
                        BridgeError::OperationFailed("Request timed out".to_string())
                    } else if e.is_connect() {
                        BridgeError::OperationFailed(format!("Connection failed: {}", e))
                    } else {
                        BridgeError::OperationFailed(e.to_string())
                    });
                }
            }

            attempt += 1;

            if attempt < policy.max_attempts {
                let delay = Self::backoff(&policy, attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::no_retry())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.execute_with_retry_internal(request, policy).await
    }

    async fn download_stream(&self, url: String) -> Result<ByteSource> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        debug!(
            content_length = response.content_length().unwrap_or(0),
            "Streaming download started"
        );

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);

        Ok(Box::new(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local server answering every request with `status`, counting requests.
    async fn fixed_status_server(status: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let mut seen = Vec::new();
                    while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => seen.extend_from_slice(&buf[..n]),
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    let response = format!(
                        "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        status
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}/gateway.php", addr), hits)
    }

    fn local_client() -> ReqwestHttpClient {
        ReqwestHttpClient::with_client(Client::builder().no_proxy().build().unwrap())
    }

    #[test]
    fn test_http_client_creation() {
        let client = ReqwestHttpClient::try_with_config(DEFAULT_TIMEOUT, DEFAULT_USER_AGENT);
        assert!(client.is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Post),
            reqwest::Method::POST
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            use_exponential_backoff: true,
        };

        assert_eq!(ReqwestHttpClient::backoff(&policy, 1), Duration::from_millis(100));
        assert_eq!(ReqwestHttpClient::backoff(&policy, 2), Duration::from_millis(200));
        assert_eq!(ReqwestHttpClient::backoff(&policy, 8), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_execute_sends_server_error_once() {
        let (url, hits) = fixed_status_server("500 Internal Server Error").await;
        let client = local_client();

        let response = client.execute(HttpRequest::post(url)).await.unwrap();

        assert_eq!(response.status, 500);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_with_retry_returns_final_status() {
        let (url, hits) = fixed_status_server("503 Service Unavailable").await;
        let client = local_client();
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            use_exponential_backoff: true,
        };

        let response = client
            .execute_with_retry(HttpRequest::get(url), policy)
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
