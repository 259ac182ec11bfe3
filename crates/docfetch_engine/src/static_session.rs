use std::sync::Arc;

use bytes::Bytes;
use engine_logging::engine_trace;

use crate::decode::DecodedHtml;
use crate::render::{
    NavigateOptions, RenderError, RenderSession, RenderedDocument, RenderedResponse,
    SessionProvider,
};
use crate::{FetchOutput, Fetcher};

/// Render session without a browser: a navigation is one GET and the served
/// HTML is taken as the document, whatever the status. Scripts never run, so
/// `wait_until` has no effect here.
pub struct StaticRenderSession {
    fetcher: Arc<dyn Fetcher>,
    loaded: Option<FetchOutput>,
}

impl StaticRenderSession {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            loaded: None,
        }
    }

    fn loaded(&self) -> Result<&FetchOutput, RenderError> {
        self.loaded.as_ref().ok_or(RenderError::NothingLoaded)
    }
}

#[async_trait::async_trait]
impl RenderSession for StaticRenderSession {
    async fn navigate(
        &mut self,
        url: &str,
        options: &NavigateOptions,
    ) -> Result<Option<RenderedResponse>, RenderError> {
        engine_trace!("static navigate {} (wait_until={})", url, options.wait_until);
        self.loaded = None;
        // Error pages are loaded like any other page; their status rides along.
        let output = self
            .fetcher
            .fetch_page(url)
            .await
            .map_err(|err| RenderError::Navigation(err.kind.to_string()))?;

        let meta = &output.metadata;
        let mut headers = Vec::new();
        if let Some(ct) = &meta.content_type {
            headers.push(("content-type".to_string(), ct.clone()));
        }
        if let Some(cd) = &meta.content_disposition {
            headers.push(("content-disposition".to_string(), cd.clone()));
        }
        let response = RenderedResponse {
            url: meta.final_url.clone(),
            status: meta.status,
            headers,
        };
        self.loaded = Some(output);
        Ok(Some(response))
    }

    async fn body(&mut self) -> Result<Bytes, RenderError> {
        Ok(self.loaded()?.bytes.clone())
    }

    async fn document(&mut self) -> Result<RenderedDocument, RenderError> {
        let loaded = self.loaded()?;
        let decoded =
            DecodedHtml::decode_lossy(&loaded.bytes, loaded.metadata.content_type.as_deref());
        Ok(RenderedDocument {
            url: loaded.metadata.final_url.clone(),
            html: decoded.html,
        })
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.loaded = None;
        Ok(())
    }
}

/// Hands out [`StaticRenderSession`]s sharing one transport.
#[derive(Clone)]
pub struct StaticSessionProvider {
    fetcher: Arc<dyn Fetcher>,
}

impl StaticSessionProvider {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn open(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        Ok(Box::new(StaticRenderSession::new(self.fetcher.clone())))
    }
}
