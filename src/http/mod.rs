//! # HTTP Transfer Module
//!
//! Single-shot HTTP GET transfers used for the connectivity probe and the
//! telemetry upload.
//!
//! The [`HttpTransferClient`] trait is the seam the orchestrator depends
//! on; [`ReqwestTransferClient`] is the real implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::{Result, TransferError, UplinkError};

pub mod buffer;

pub use buffer::ResponseBuffer;

/// Performs one HTTP GET and returns the response body
#[async_trait]
pub trait HttpTransferClient: Send + Sync {
    /// Fetch `url`
    ///
    /// # Errors
    ///
    /// Any [`TransferError`]; none of them are retried by the client.
    async fn get(&self, url: &str) -> std::result::Result<Bytes, TransferError>;
}

/// HTTP client backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransferClient {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl ReqwestTransferClient {
    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialised
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_s))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| UplinkError::HttpClient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }
}

#[async_trait]
impl HttpTransferClient for ReqwestTransferClient {
    async fn get(&self, url: &str) -> std::result::Result<Bytes, TransferError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| TransferError::InvalidUrl(format!("{}: {}", url, e)))?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| classify(&e, &host))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                status: status.as_u16(),
                host,
            });
        }

        let mut buffer = ResponseBuffer::with_limit(self.max_response_bytes);
        if let Some(length) = response.content_length() {
            let length = usize::try_from(length).unwrap_or(usize::MAX);
            buffer.reserve(length)?;
        }

        while let Some(chunk) = response.chunk().await.map_err(|e| classify(&e, &host))? {
            buffer.append(&chunk)?;
        }

        debug!("Received {} bytes from {}", buffer.len(), host);
        Ok(buffer.into_bytes())
    }
}

/// Map a `reqwest` failure onto the transfer taxonomy
///
/// Certificate problems are recognised anywhere in the error chain, since
/// the TLS backend nests them below connector errors.
fn classify(err: &reqwest::Error, host: &str) -> TransferError {
    let mut chain = Vec::new();
    let mut source: Option<&dyn std::error::Error> = Some(err);

    while let Some(e) = source {
        let text = e.to_string();
        if text.to_ascii_lowercase().contains("certificate") {
            return TransferError::Certificate {
                host: host.to_string(),
                reason: text,
            };
        }
        chain.push(text);
        source = e.source();
    }

    TransferError::Transport(chain.join(": "))
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port
    async fn serve_once(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket.write_all(response).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}/get", addr)
    }

    fn client(max_response_bytes: usize) -> ReqwestTransferClient {
        let config = HttpConfig {
            request_timeout_s: 5,
            max_response_bytes,
            ..HttpConfig::default()
        };
        ReqwestTransferClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        )
        .await;

        let body = client(1024).get(&url).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_get_unsized_body() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n12345").await;

        let body = client(1024).get(&url).await.unwrap();
        assert_eq!(&body[..], b"12345");
    }

    #[tokio::test]
    async fn test_get_status_failure() {
        let url = serve_once(
            b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        match client(1024).get(&url).await {
            Err(TransferError::Status { status, host }) => {
                assert_eq!(status, 500);
                assert_eq!(host, "127.0.0.1");
            }
            other => panic!("Expected Status error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_declared_length_over_limit() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\n0123456789",
        )
        .await;

        assert!(matches!(
            client(4).get(&url).await,
            Err(TransferError::ResponseTooLarge { limit: 4 })
        ));
    }

    #[tokio::test]
    async fn test_get_streamed_body_over_limit() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n0123456789").await;

        assert!(matches!(
            client(4).get(&url).await,
            Err(TransferError::ResponseTooLarge { limit: 4 })
        ));
    }

    #[tokio::test]
    async fn test_get_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        match client(1024).get(&format!("http://{}/", addr)).await {
            Err(TransferError::Transport(msg)) => assert!(!msg.is_empty()),
            other => panic!("Expected Transport error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_invalid_url() {
        assert!(matches!(
            client(1024).get("not a url").await,
            Err(TransferError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_replays_script() {
        let mock = mocks::MockTransferClient::with_replies(&[
            mocks::MockReply::Fail,
            mocks::MockReply::Body("42"),
        ]);

        assert!(mock.get("http://a/").await.is_err());
        assert_eq!(&mock.get("http://b/").await.unwrap()[..], b"42");
        assert!(mock.get("http://c/").await.unwrap().is_empty());
        assert_eq!(mock.get_requests(), vec!["http://a/", "http://b/", "http://c/"]);
    }

    // Needs network access
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_get_real_probe() {
        let body = client(64 * 1024).get("http://httpbin.org/get").await.unwrap();
        assert!(!body.is_empty());
    }
}
