use std::path::PathBuf;

use clap::Parser;
use docfetch_engine::WaitUntil;

/// Download the PDFs named in a worklist and bundle them into a zip archive.
#[derive(Debug, Clone, Parser)]
#[command(name = "docfetch", version, about)]
pub struct Cli {
    /// JSON array of `{product_code|product|code, url|link}` records.
    #[arg(default_value = "data/pdfs.json")]
    pub input: PathBuf,

    /// Directory the PDFs are written to [default: output/pdfs].
    #[arg(long, env = "DOCFETCH_DEST")]
    pub dest: Option<PathBuf>,

    /// Maximum concurrent direct downloads [default: 6].
    #[arg(long, short = 'j', env = "CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Where the JSON run report is written.
    #[arg(long, default_value = "output/extraction-result.json")]
    pub report: PathBuf,

    /// Per-item navigation timeout of the render fallback [default: 30000].
    #[arg(long)]
    pub nav_timeout_ms: Option<u64>,

    /// When a fallback navigation counts as loaded [default: dom-content-loaded].
    #[arg(long, value_parser = parse_wait_until)]
    pub wait_until: Option<WaitUntil>,

    /// Skip the render fallback phase.
    #[arg(long)]
    pub no_render: bool,

    /// Do not bundle downloads into a zip archive.
    #[arg(long)]
    pub no_archive: bool,

    /// RON settings file; explicit flags take precedence over it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write the log to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, short)]
    pub verbose: bool,
}

fn parse_wait_until(raw: &str) -> Result<WaitUntil, String> {
    raw.parse()
}
