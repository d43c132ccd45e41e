//! HTTP narration client.
//!
//! `POST {base_url}/api/stream-narrative` with the request as camelCase JSON;
//! the response body is read as a byte stream and decoded to text
//! incrementally, carrying split UTF-8 sequences over to the next chunk.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use loreweave_core::narration::NarrationRequest;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::transport::{ChunkStream, NarrationTransport};

/// Path of the streaming narration endpoint.
pub const NARRATION_PATH: &str = "/api/stream-narrative";

/// Narration transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpNarrationTransport {
    http: Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl HttpNarrationTransport {
    /// Create a transport for the service at `base_url`. Without a timeout
    /// the request runs until the service closes the stream.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Full endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}{NARRATION_PATH}", self.base_url)
    }
}

#[async_trait]
impl NarrationTransport for HttpNarrationTransport {
    async fn open(&self, request: &NarrationRequest) -> Result<ChunkStream> {
        let url = self.endpoint();
        debug!(url = %url, history = request.history.len(), "Opening narration stream");

        let mut builder = self.http.post(&url).json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let resp = builder.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Narration service returned error");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut decoder = Utf8Decoder::default();
        let chunks = resp.bytes_stream().map(move |bytes| {
            bytes
                .map(|b| decoder.decode(&b))
                .map_err(TransportError::from)
        });
        Ok(Box::pin(chunks))
    }
}

/// Incremental UTF-8 decoder. Incomplete trailing sequences are carried to
/// the next chunk; invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode `bytes`, returning all text that is complete so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.carry) {
                Ok(text) => {
                    out.push_str(text);
                    self.carry.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.carry[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.carry.drain(..valid + bad);
                        }
                        None => {
                            self.carry.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Bytes waiting for the rest of their sequence.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}
