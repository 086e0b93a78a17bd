//! Core `DialogueTransport` trait and `HttpDialogueClient` implementation.
//!
//! The client speaks the dialogue server's two-endpoint protocol:
//!
//! * `POST {base}/chat` — multipart upload of the recorded utterance under
//!   the form field `audio`; the response body is a [`DialogueReply`].
//! * `GET {base}{audio_url}` — fetch of the spoken reply referenced by the
//!   previous response.
//!
//! All connection details come from [`ServerConfig`]; nothing is hardcoded.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::net::reply::DialogueReply;

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the dialogue server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("dialogue server request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("dialogue server returned HTTP {0}")]
    Status(u16),

    /// Reading the utterance or writing the reply audio failed locally.
    #[error("local audio file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// DialogueTransport trait
// ---------------------------------------------------------------------------

/// Async trait for the dialogue server round-trip.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn DialogueTransport>`).
#[async_trait]
pub trait DialogueTransport: Send + Sync {
    /// Upload the recorded utterance and return the server's parsed reply.
    async fn send_utterance(&self, audio: &Path) -> Result<DialogueReply, TransportError>;

    /// Fetch the reply audio referenced by `audio_url` into `dest`.
    async fn fetch_reply_audio(&self, audio_url: &str, dest: &Path)
        -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// HttpDialogueClient
// ---------------------------------------------------------------------------

/// `reqwest`-backed [`DialogueTransport`].
///
/// The upload and the audio fetch carry different per-request timeouts
/// (thinking time dominates the former, file size the latter), so timeouts
/// are attached per request rather than on the shared client.
pub struct HttpDialogueClient {
    client: reqwest::Client,
    config: ServerConfig,
}

impl HttpDialogueClient {
    /// Build a client from application config.
    ///
    /// A default client is used as a last-resort fallback if the builder
    /// fails (should never happen in practice).
    pub fn from_config(config: &ServerConfig) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// Resolve a server-relative audio reference against the base URL.
    /// Absolute `http(s)` references pass through unchanged.
    fn resolve(&self, audio_url: &str) -> String {
        if audio_url.starts_with("http://") || audio_url.starts_with("https://") {
            audio_url.to_string()
        } else {
            format!("{}{}", self.config.base_url(), audio_url)
        }
    }
}

#[async_trait]
impl DialogueTransport for HttpDialogueClient {
    async fn send_utterance(&self, audio: &Path) -> Result<DialogueReply, TransportError> {
        let bytes = tokio::fs::read(audio).await?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("user_input.wav")
            .mime_str("audio/wav")
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let url = format!("{}/chat", self.config.base_url());
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(std::time::Duration::from_secs(self.config.upload_timeout_secs))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        Ok(DialogueReply::parse(&body))
    }

    async fn fetch_reply_audio(
        &self,
        audio_url: &str,
        dest: &Path,
    ) -> Result<(), TransportError> {
        let url = self.resolve(audio_url);
        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(
                self.config.download_timeout_secs,
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        log::debug!("net: fetched {} ({} bytes) to {}", url, bytes.len(), dest.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
