//! Docfetch engine: network retrieval, verification, persistence and archival.
mod archive;
mod decode;
mod direct;
mod events;
mod fetch;
mod limiter;
mod links;
mod persist;
mod pipeline;
mod render;
mod static_session;
mod types;
mod verify;

pub use archive::{archive, write_archive, ArchiveError, ArchiveOutcome};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use direct::DirectFetcher;
pub use events::{ChannelProgressSink, LogProgressSink, PipelineEvent, ProgressSink};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use limiter::ConcurrencyLimiter;
pub use links::{candidate_links, find_artifact_link};
pub use persist::{ensure_output_dir, path_exists, persist_bytes, AtomicFileWriter, PersistError};
pub use pipeline::{Pipeline, PipelineSettings};
pub use render::{
    NavigateOptions, RenderError, RenderFallbackFetcher, RenderSession, RenderedDocument,
    RenderedResponse, SessionProvider, WaitUntil,
};
pub use static_session::{StaticRenderSession, StaticSessionProvider};
pub use types::{FetchError, FetchMetadata, FetchOutput};
pub use verify::{ArtifactSignature, ContentVerifier, Verdict};
