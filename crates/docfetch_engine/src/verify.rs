use url::Url;

use crate::FetchMetadata;

/// How an artifact type announces itself in headers, URLs and leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSignature {
    /// Substring looked for in `Content-Type`, lowercase.
    pub mime_token: &'static str,
    /// Lowercase extension including the dot.
    pub extension: &'static str,
    pub magic: &'static [u8],
}

impl ArtifactSignature {
    pub const PDF: ArtifactSignature = ArtifactSignature {
        mime_token: "pdf",
        extension: ".pdf",
        magic: b"%PDF",
    };
}

/// Which of the two independent checks passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub headers_ok: bool,
    pub magic_ok: bool,
}

impl Verdict {
    /// Either check suffices.
    pub fn accepted(&self) -> bool {
        self.headers_ok || self.magic_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentVerifier {
    signature: ArtifactSignature,
}

impl Default for ContentVerifier {
    fn default() -> Self {
        Self::new(ArtifactSignature::PDF)
    }
}

impl ContentVerifier {
    pub fn new(signature: ArtifactSignature) -> Self {
        Self { signature }
    }

    pub fn verify(&self, metadata: &FetchMetadata, bytes: &[u8]) -> Verdict {
        // The requested URL counts, the redirect target does not.
        let headers_ok = self.content_type_matches(metadata.content_type.as_deref())
            || self.url_has_extension(&metadata.original_url)
            || self.disposition_matches(metadata.content_disposition.as_deref());
        Verdict {
            headers_ok,
            magic_ok: self.magic_matches(bytes),
        }
    }

    pub fn content_type_matches(&self, content_type: Option<&str>) -> bool {
        content_type
            .map(|ct| ct.to_ascii_lowercase().contains(self.signature.mime_token))
            .unwrap_or(false)
    }

    pub fn disposition_matches(&self, disposition: Option<&str>) -> bool {
        disposition
            .map(|cd| cd.to_ascii_lowercase().contains(self.signature.extension))
            .unwrap_or(false)
    }

    /// Path-only check; query strings and fragments are ignored when the URL parses.
    pub fn url_has_extension(&self, url: &str) -> bool {
        let candidate = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_ascii_lowercase(),
            Err(_) => url.to_ascii_lowercase(),
        };
        candidate.ends_with(self.signature.extension)
    }

    pub fn magic_matches(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(self.signature.magic)
    }
}
