use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::Client;

use crate::core::error::{InstallerError, InstallerResult};

/// Upper bound on buffer space reserved from an advertised length.
pub const MAX_PREALLOCATION: usize = 1 << 20;

/// Response body of a successful request, streamed in chunks.
pub struct TransferBody {
    pub total: Option<u64>,
    pub chunks: BoxStream<'static, InstallerResult<Vec<u8>>>,
}

impl TransferBody {
    /// Drain the whole body into memory.
    pub async fn collect(mut self) -> InstallerResult<Vec<u8>> {
        let hint = self.total.unwrap_or(0).min(MAX_PREALLOCATION as u64) as usize;
        let mut buf = Vec::with_capacity(hint);
        while let Some(chunk) = self.chunks.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf)
    }
}

/// Byte source behind the download engine.
///
/// Any failure to produce a body (connection error, non-2xx status) is an
/// `Err`; the engine treats it as "try the next candidate".
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> InstallerResult<TransferBody>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> InstallerResult<TransferBody> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstallerError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(InstallerError::from))
            .boxed();

        Ok(TransferBody { total, chunks })
    }
}
