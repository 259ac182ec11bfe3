use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use bytes::Bytes;
use docfetch_core::{FailureKind, FetchOutcome, Phase, PipelineReport, Record};
use docfetch_engine::{
    ChannelProgressSink, FetchError, FetchMetadata, FetchOutput, FetchSettings, Fetcher,
    NavigateOptions, Pipeline, PipelineEvent, PipelineSettings, RenderError, RenderSession,
    RenderedDocument, RenderedResponse, ReqwestFetcher, SessionProvider, StaticSessionProvider,
    WaitUntil,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn settings(dest: &Path) -> PipelineSettings {
    PipelineSettings::new(
        dest,
        NavigateOptions::new(WaitUntil::DomContentLoaded, Duration::from_secs(5)),
    )
}

fn http() -> Arc<dyn Fetcher> {
    Arc::new(ReqwestFetcher::new(FetchSettings::default()).expect("client builds"))
}

fn zip_members(path: &Path) -> Vec<String> {
    let zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = zip.file_names().map(String::from).collect();
    names.sort();
    names
}

async fn mount_catalog(server: &MockServer, pdf_requests: u64) {
    Mock::given(method("GET"))
        .and(path("/a.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4 A", "application/pdf"))
        .expect(pdf_requests)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.html"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html><p>no document</p></html>", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn mixed_worklist_end_to_end() {
    engine_logging::initialize_for_tests();
    let server = MockServer::start().await;
    mount_catalog(&server, 1).await;
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("output").join("pdfs");

    let records = vec![
        record(json!({"product_code": "A", "url": format!("{}/a.pdf", server.uri())})),
        record(json!({"code": "B", "link": format!("{}/b.html", server.uri())})),
    ];
    let fetcher = http();
    let provider = StaticSessionProvider::new(fetcher.clone());
    let report = Pipeline::new(settings(&dest), fetcher)
        .run(records, Some(&provider))
        .await;

    assert_eq!(report.downloaded, vec![dest.join("A.pdf")]);
    assert!(report.skipped.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].item["code"], json!("B"));
    assert_eq!(report.failed[0].reason, "not a PDF (headers+magic mismatch)");

    let zip_path = temp.path().join("output").join("pdfs.zip");
    assert_eq!(report.zip, Some(zip_path.clone()));
    assert!(report.zip_error.is_none());
    assert_eq!(zip_members(&zip_path), vec!["A.pdf".to_string()]);
    assert!(!dest.join("B.pdf").exists());
}

#[tokio::test]
async fn second_run_skips_what_is_on_disk() {
    let server = MockServer::start().await;
    mount_catalog(&server, 1).await;
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("pdfs");
    let records = vec![record(
        json!({"product_code": "A", "url": format!("{}/a.pdf", server.uri())}),
    )];
    let pipeline = Pipeline::new(settings(&dest), http());

    let first = pipeline.run(records.clone(), None).await;
    assert_eq!(first.downloaded, vec![dest.join("A.pdf")]);

    let second = pipeline.run(records, None).await;
    assert!(second.downloaded.is_empty());
    assert_eq!(second.skipped, vec![dest.join("A.pdf")]);
    assert!(second.failed.is_empty());
    assert_eq!(second.zip, None);
}

#[tokio::test]
async fn incomplete_records_fail_without_network_traffic() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let records = vec![
        record(json!({"product_code": "A"})),
        record(json!({"url": format!("{}/a.pdf", server.uri())})),
        record(json!({"product_code": "", "url": ""})),
        record(json!({"value": 7})),
    ];

    let report = Pipeline::new(settings(&temp.path().join("pdfs")), http())
        .run(records, None)
        .await;

    assert_eq!(report.failed.len(), 4);
    assert!(report
        .failed
        .iter()
        .all(|failed| failed.reason == "missing product_code or url"));
    assert_eq!(report.failed[3].item["value"], json!(7));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    assert_eq!(report.zip, None);
}

/// Always serves the same HTML page and counts what it is asked to do.
struct CountingProvider {
    opened: AtomicUsize,
    navigations: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl CountingProvider {
    fn new() -> Self {
        Self {
            opened: AtomicUsize::new(0),
            navigations: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

struct CountingSession {
    navigations: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    url: String,
}

#[async_trait::async_trait]
impl RenderSession for CountingSession {
    async fn navigate(
        &mut self,
        url: &str,
        _options: &NavigateOptions,
    ) -> Result<Option<RenderedResponse>, RenderError> {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        self.url = url.to_string();
        Ok(Some(RenderedResponse {
            url: url.to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
        }))
    }

    async fn body(&mut self) -> Result<Bytes, RenderError> {
        Ok(Bytes::new())
    }

    async fn document(&mut self) -> Result<RenderedDocument, RenderError> {
        Ok(RenderedDocument {
            url: self.url.clone(),
            html: "<p>empty</p>".to_string(),
        })
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionProvider for CountingProvider {
    async fn open(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSession {
            navigations: self.navigations.clone(),
            closed: self.closed.clone(),
            url: String::new(),
        }))
    }
}

#[tokio::test]
async fn direct_failures_get_exactly_one_fallback_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let records = vec![
        record(json!({"product_code": "M", "url": format!("{}/missing.pdf", server.uri())})),
        record(json!({"product_code": "N"})),
    ];
    let provider = CountingProvider::new();

    let report = Pipeline::new(settings(&temp.path().join("pdfs")), http())
        .run(records, Some(&provider))
        .await;

    assert_eq!(provider.opened.load(Ordering::SeqCst), 1);
    assert_eq!(provider.navigations.load(Ordering::SeqCst), 1);
    assert!(provider.closed.load(Ordering::SeqCst));
    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.total(), 2);
    let reasons: Vec<&str> = report.failed.iter().map(|f| f.reason.as_str()).collect();
    assert!(reasons.contains(&"http 404"));
    assert!(reasons.contains(&"missing product_code or url"));
}

#[tokio::test]
async fn session_is_not_opened_when_nothing_needs_it() {
    let server = MockServer::start().await;
    mount_catalog(&server, 1).await;
    let temp = TempDir::new().unwrap();
    let provider = CountingProvider::new();
    let records = vec![record(
        json!({"product_code": "A", "url": format!("{}/a.pdf", server.uri())}),
    )];

    let report = Pipeline::new(settings(&temp.path().join("pdfs")), http())
        .run(records, Some(&provider))
        .await;

    assert_eq!(report.downloaded.len(), 1);
    assert_eq!(provider.opened.load(Ordering::SeqCst), 0);
}

struct BrokenProvider;

#[async_trait::async_trait]
impl SessionProvider for BrokenProvider {
    async fn open(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        Err(RenderError::Session("browser missing".to_string()))
    }
}

#[tokio::test]
async fn unavailable_session_keeps_direct_reason() {
    let server = MockServer::start().await;
    mount_catalog(&server, 0).await;
    let temp = TempDir::new().unwrap();
    let records = vec![record(
        json!({"product_code": "B", "url": format!("{}/b.html", server.uri())}),
    )];

    let report = Pipeline::new(settings(&temp.path().join("pdfs")), http())
        .run(records, Some(&BrokenProvider))
        .await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].reason, "not a PDF (headers+magic mismatch)");
}

/// Serves a tiny PDF for every URL after a short pause, tracking overlap.
struct SlowPdfFetcher {
    running: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Fetcher for SlowPdfFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(15)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        let bytes = Bytes::from_static(b"%PDF-1.4");
        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                status: 200,
                content_type: Some("application/pdf".to_string()),
                content_disposition: None,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}

#[tokio::test]
async fn direct_phase_respects_concurrency_bound() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(SlowPdfFetcher {
        running: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        calls: AtomicUsize::new(0),
    });
    let mut settings = settings(&temp.path().join("pdfs"));
    settings.concurrency = 4;
    settings.archive = false;
    let records: Vec<Record> = (0..25)
        .map(|i| record(json!({"product_code": format!("P{i}"), "url": format!("https://cdn.example/{i}.pdf")})))
        .collect();

    let pipeline = Pipeline::new(settings, fetcher.clone());
    let report = pipeline.run(records, None).await;

    assert_eq!(report.downloaded.len(), 25);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 25);
    assert!(fetcher.peak.load(Ordering::SeqCst) <= 4);
    assert!(pipeline.limiter().peak() <= 4);
    assert_eq!(report.zip, None);
    assert!(!temp.path().join("pdfs.zip").exists());
}

#[tokio::test]
async fn fallback_phase_starts_after_every_direct_result() {
    let server = MockServer::start().await;
    mount_catalog(&server, 1).await;
    let temp = TempDir::new().unwrap();
    let records = vec![
        record(json!({"product_code": "B", "url": format!("{}/b.html", server.uri())})),
        record(json!({"product_code": "A", "url": format!("{}/a.pdf", server.uri())})),
        record(json!({"product_code": "C", "url": format!("{}/b.html", server.uri())})),
    ];
    let (tx, rx) = mpsc::channel();
    let provider = CountingProvider::new();

    let report: PipelineReport = Pipeline::new(settings(&temp.path().join("pdfs")), http())
        .with_sink(Arc::new(ChannelProgressSink::new(tx)))
        .run(records, Some(&provider))
        .await;
    let events: Vec<PipelineEvent> = rx.try_iter().collect();

    let fallback_start = events
        .iter()
        .position(|event| {
            matches!(
                event,
                PipelineEvent::PhaseStarted {
                    phase: Phase::Fallback,
                    items: 2
                }
            )
        })
        .expect("fallback phase ran");
    let direct_settled: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, event)| {
            matches!(
                event,
                PipelineEvent::ItemSettled {
                    phase: Phase::Direct,
                    ..
                }
            )
        })
        .map(|(position, _)| position)
        .collect();
    assert_eq!(direct_settled.len(), 3);
    assert!(direct_settled.iter().all(|&position| position < fallback_start));

    let fallback_failures = events
        .iter()
        .filter(|event| {
            matches!(
                event,
                PipelineEvent::ItemSettled {
                    phase: Phase::Fallback,
                    outcome: FetchOutcome::Failed(FailureKind::NotPdf),
                    ..
                }
            )
        })
        .count();
    assert_eq!(fallback_failures, 2);
    assert_eq!(provider.navigations.load(Ordering::SeqCst), 2);
    assert_eq!(report.downloaded.len(), 1);
    assert_eq!(report.failed.len(), 2);
    assert!(events
        .iter()
        .any(|event| matches!(event, PipelineEvent::ArchiveWritten { members: 1, .. })));
}

#[tokio::test]
async fn colliding_codes_do_not_overwrite_each_other() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(SlowPdfFetcher {
        running: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        calls: AtomicUsize::new(0),
    });
    let dest: PathBuf = temp.path().join("pdfs");
    let records = vec![
        record(json!({"product_code": "A/1", "url": "https://cdn.example/x.pdf"})),
        record(json!({"product_code": "A?1", "url": "https://cdn.example/y.pdf"})),
    ];

    let report = Pipeline::new(settings(&dest), fetcher).run(records, None).await;

    assert_eq!(report.downloaded.len(), 2);
    assert_eq!(report.downloaded[0], dest.join("A_1.pdf"));
    assert_ne!(report.downloaded[0], report.downloaded[1]);
    let zip_path = temp.path().join("pdfs.zip");
    assert_eq!(zip_members(&zip_path).len(), 2);
}

#[tokio::test]
async fn repeated_code_is_fetched_once_and_then_skipped() {
    let server = MockServer::start().await;
    mount_catalog(&server, 1).await;
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("pdfs");
    let url = format!("{}/a.pdf", server.uri());
    let records = vec![
        record(json!({"product_code": "A", "url": url})),
        record(json!({"product_code": "A", "url": url})),
    ];

    let report = Pipeline::new(settings(&dest), http()).run(records, None).await;

    assert_eq!(report.downloaded, vec![dest.join("A.pdf")]);
    assert_eq!(report.skipped, vec![dest.join("A.pdf")]);
    assert_eq!(zip_members(&temp.path().join("pdfs.zip")), vec!["A.pdf".to_string()]);
}

#[tokio::test]
async fn static_fallback_handles_http_error_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.pdf"))
        .respond_with(ResponseTemplate::new(404).set_body_raw(
            r#"<html><body><a href="/real.pdf">current manual</a></body></html>"#,
            "text/html",
        ))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/real.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.pdf"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("<p>not here</p>", "text/html"))
        .expect(2)
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("pdfs");
    let records = vec![
        record(json!({"product_code": "R", "url": format!("{}/missing.pdf", server.uri())})),
        record(json!({"product_code": "G", "url": format!("{}/gone.pdf", server.uri())})),
    ];
    let fetcher = http();
    let provider = StaticSessionProvider::new(fetcher.clone());

    let report = Pipeline::new(settings(&dest), fetcher)
        .run(records, Some(&provider))
        .await;

    assert_eq!(report.downloaded, vec![dest.join("R.pdf")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].item["product_code"], json!("G"));
    assert_eq!(report.failed[0].reason, "http 404");
}
