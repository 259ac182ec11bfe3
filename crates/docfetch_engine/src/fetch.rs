use std::time::Duration;

use bytes::{Bytes, BytesMut};
use docfetch_core::FailureKind;
use engine_logging::engine_trace;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE};

use crate::{FetchError, FetchMetadata, FetchOutput};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            redirect_limit: 10,
            max_bytes: 256 * 1024 * 1024,
            user_agent: concat!("docfetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Non-interactive GET of a whole resource.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Non-success statuses are errors.
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError>;

    /// Like [`Fetcher::fetch`], but an error page is returned with its status
    /// and body, the way a browser would show it.
    async fn fetch_page(&self, url: &str) -> Result<FetchOutput, FetchError> {
        self.fetch(url).await
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network(err.to_string()), err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        self.get(url, false).await
    }

    async fn fetch_page(&self, url: &str) -> Result<FetchOutput, FetchError> {
        self.get(url, true).await
    }
}

impl ReqwestFetcher {
    async fn get(&self, url: &str, keep_error_pages: bool) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|err| {
            FetchError::new(FailureKind::InvalidUrl(err.to_string()), err.to_string())
        })?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() && !keep_error_pages {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = header_text(response.headers(), CONTENT_TYPE);
        let content_disposition = header_text(response.headers(), CONTENT_DISPOSITION);

        let mut bytes = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
        }
        engine_trace!("fetched {} bytes from {}", bytes.len(), final_url);

        let bytes: Bytes = bytes.freeze();
        let metadata = FetchMetadata {
            original_url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            content_disposition,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchOutput { bytes, metadata })
    }
}

fn header_text(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    let message = err.to_string();
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout(message.clone()), message);
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded(message.clone()), message);
    }
    FetchError::new(FailureKind::Network(message.clone()), message)
}
