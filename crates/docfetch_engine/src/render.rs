//! Fallback retrieval through a page-rendering collaborator.
//!
//! The collaborator is consumed only through [`RenderSession`]: navigate to a
//! URL, read back the body of what was served, and snapshot the rendered
//! document. One session is opened per run through a [`SessionProvider`] and
//! driven by exactly one navigation at a time.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use docfetch_core::{FailureKind, FetchOutcome};
use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::links::find_artifact_link;
use crate::persist::{path_exists, persist_bytes};
use crate::{ContentVerifier, DirectFetcher};

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WaitUntil::DomContentLoaded => "dom-content-loaded",
            WaitUntil::Load => "load",
            WaitUntil::NetworkIdle => "network-idle",
        };
        f.write_str(label)
    }
}

impl FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "domcontentloaded" => Ok(WaitUntil::DomContentLoaded),
            "load" => Ok(WaitUntil::Load),
            "networkidle" => Ok(WaitUntil::NetworkIdle),
            other => Err(format!("unknown wait strategy: {other}")),
        }
    }
}

/// Per-navigation parameters. Callers pick the wait strategy; there is no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
}

impl NavigateOptions {
    pub fn new(wait_until: WaitUntil, timeout: Duration) -> Self {
        Self { wait_until, timeout }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Main-frame response of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResponse {
    pub url: String,
    pub status: u16,
    /// Header names are matched case-insensitively by [`RenderedResponse::header`].
    pub headers: Vec<(String, String)>,
}

impl RenderedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Snapshot of the rendered DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// URL the document was loaded from; relative links resolve against it.
    pub url: String,
    pub html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("nothing has been loaded in this session")]
    NothingLoaded,
    #[error("render session unavailable: {0}")]
    Session(String),
}

#[async_trait::async_trait]
pub trait RenderSession: Send {
    /// Load `url`. `Ok(None)` means the navigation produced no main-frame response.
    async fn navigate(
        &mut self,
        url: &str,
        options: &NavigateOptions,
    ) -> Result<Option<RenderedResponse>, RenderError>;

    /// Raw body of the last navigation's response.
    async fn body(&mut self) -> Result<Bytes, RenderError>;

    /// DOM of the currently loaded page.
    async fn document(&mut self) -> Result<RenderedDocument, RenderError>;

    async fn close(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Opens the single session a run's fallback phase uses.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// Retries one item through a render session.
#[derive(Clone)]
pub struct RenderFallbackFetcher {
    direct: DirectFetcher,
    verifier: ContentVerifier,
    options: NavigateOptions,
}

impl RenderFallbackFetcher {
    pub fn new(direct: DirectFetcher, options: NavigateOptions) -> Self {
        let verifier = *direct.verifier();
        Self {
            direct,
            verifier,
            options,
        }
    }

    /// Strategies in order: served artifact, embedded/linked artifact, give up.
    ///
    /// `prior` is the direct-fetch failure; it is reported instead of
    /// "no PDF found" when nothing turns up here.
    pub async fn fetch_via_render(
        &self,
        session: &mut dyn RenderSession,
        url: &str,
        out_path: &Path,
        prior: Option<&FailureKind>,
    ) -> FetchOutcome {
        if path_exists(out_path).await {
            return FetchOutcome::Skipped(out_path.to_path_buf());
        }

        let response = match self.bounded(session.navigate(url, &self.options)).await {
            Ok(response) => response,
            Err(kind) => {
                engine_warn!("navigation to {} failed: {}", url, kind);
                return FetchOutcome::Failed(kind);
            }
        };

        let served_artifact = response
            .as_ref()
            .map(|r| self.verifier.content_type_matches(r.content_type()))
            .unwrap_or(false);
        if served_artifact {
            let body = match self.bounded(session.body()).await {
                Ok(body) => body,
                Err(kind) => return FetchOutcome::Failed(kind),
            };
            engine_info!("{} served a PDF directly ({} bytes)", url, body.len());
            return match persist_bytes(out_path.to_path_buf(), body).await {
                Ok(path) => FetchOutcome::Downloaded(path),
                Err(err) => FetchOutcome::Failed(FailureKind::Persist(err.to_string())),
            };
        }

        let document = match self.bounded(session.document()).await {
            Ok(document) => document,
            Err(kind) => return FetchOutcome::Failed(kind),
        };
        if let Some(href) = find_artifact_link(&document.html, Some(&document.url), &self.verifier) {
            engine_info!("{} links to {}", url, href);
            return self.direct.fetch(&href, out_path).await;
        }

        engine_debug!("no PDF reachable from {}", url);
        FetchOutcome::Failed(prior.cloned().unwrap_or(FailureKind::NoPdfFound))
    }

    /// Apply the navigation deadline to one session call.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, RenderError>>,
    ) -> Result<T, FailureKind> {
        match tokio::time::timeout(self.options.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(FailureKind::Navigation(err.to_string())),
            Err(_) => Err(FailureKind::NavigationTimeout {
                timeout_ms: self.options.timeout_ms(),
            }),
        }
    }
}
