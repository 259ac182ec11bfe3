use std::path::Path;
use std::sync::Arc;

use docfetch_core::{FailureKind, FetchOutcome};
use engine_logging::{engine_debug, engine_warn};

use crate::persist::{path_exists, persist_bytes};
use crate::{ContentVerifier, Fetcher};

/// Plain HTTP retrieval of one artifact into its output path.
///
/// Every failure is folded into the returned [`FetchOutcome`]; callers never
/// see an error.
#[derive(Clone)]
pub struct DirectFetcher {
    fetcher: Arc<dyn Fetcher>,
    verifier: ContentVerifier,
}

impl DirectFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_verifier(fetcher, ContentVerifier::default())
    }

    pub fn with_verifier(fetcher: Arc<dyn Fetcher>, verifier: ContentVerifier) -> Self {
        Self { fetcher, verifier }
    }

    pub fn verifier(&self) -> &ContentVerifier {
        &self.verifier
    }

    pub async fn fetch(&self, url: &str, out_path: &Path) -> FetchOutcome {
        // Existence is the only dedup; the file is not revalidated.
        if path_exists(out_path).await {
            engine_debug!("skip {}: {:?} already present", url, out_path);
            return FetchOutcome::Skipped(out_path.to_path_buf());
        }

        let output = match self.fetcher.fetch(url).await {
            Ok(output) => output,
            Err(err) => {
                engine_warn!("direct fetch of {} failed: {}", url, err);
                return FetchOutcome::Failed(err.kind);
            }
        };

        let verdict = self.verifier.verify(&output.metadata, &output.bytes);
        if !verdict.accepted() {
            engine_warn!(
                "{} is not a PDF (content-type {:?}, {} bytes)",
                url,
                output.metadata.content_type,
                output.metadata.byte_len
            );
            return FetchOutcome::Failed(FailureKind::NotPdf);
        }
        engine_debug!(
            "{} verified (headers_ok={}, magic_ok={})",
            url,
            verdict.headers_ok,
            verdict.magic_ok
        );

        match persist_bytes(out_path.to_path_buf(), output.bytes).await {
            Ok(path) => FetchOutcome::Downloaded(path),
            Err(err) => {
                engine_warn!("writing {:?} failed: {}", out_path, err);
                FetchOutcome::Failed(FailureKind::Persist(err.to_string()))
            }
        }
    }
}
