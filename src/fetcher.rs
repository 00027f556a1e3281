use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, FetchError, Result};

/// Retrieves a page body. Implementations must be shareable across concurrently
/// running items.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Fetches pages over HTTP(S) with a shared connection pool.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(cfg: &Config) -> Result<Self> {
        Self::with_timeouts(&cfg.user_agent, cfg.fetch_timeout(), cfg.fetch_connect_timeout())
    }

    pub fn with_timeouts(user_agent: &str, timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(AppError::Http)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        // Decodes using the response charset so the extractor always sees UTF-8.
        let body = resp.text().await?;
        debug!(url, status = status.as_u16(), bytes = body.len(), "[FETCH] Page retrieved");
        Ok(body.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response per connection, forever.
    async fn serve(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/item")
    }

    fn fetcher(timeout_ms: u64) -> HttpFetcher {
        HttpFetcher::with_timeouts(
            "test-agent",
            Duration::from_millis(timeout_ms),
            Duration::from_millis(timeout_ms),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn returns_body_on_success() {
        let url = serve(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n<p class=\"p\">$10.00</p>\r\n",
        )
        .await;
        let body = fetcher(2000).fetch(&url).await.unwrap();
        assert!(String::from_utf8(body).unwrap().contains("$10.00"));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let url = serve("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        assert_eq!(fetcher(2000).fetch(&url).await, Err(FetchError::Status(503)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = fetcher(2000).fetch(&format!("http://127.0.0.1:{port}/")).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_) | FetchError::Timeout), "{err:?}");
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let err = fetcher(200).fetch(&format!("http://{addr}/")).await.unwrap_err();
        assert_eq!(err, FetchError::Timeout);
    }
}
