//! Transport seam for the subscriber.
//!
//! [`SubscriberClient`](crate::SubscriberClient) only needs a byte stream per
//! connection attempt. [`HttpConnector`] is the production implementation;
//! tests script their own.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};

use crate::error::ClientError;

/// Raw body chunks of one open event stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, ClientError>>;

/// Opens event stream transports.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a stream to `url`. Resolves once the server has accepted it.
    async fn open(&self, url: &str) -> Result<ByteStream, ClientError>;
}

/// `reqwest`-backed connector.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Result<Self, ClientError> {
        // No overall timeout: the body is meant to stay open indefinitely.
        let client = reqwest::Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn open(&self, url: &str) -> Result<ByteStream, ClientError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            return Err(ClientError::ContentType(content_type.to_string()));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from))
            .boxed())
    }
}
