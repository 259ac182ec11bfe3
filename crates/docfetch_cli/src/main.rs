mod cli;
mod config;
mod report;
mod worklist;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use docfetch_core::PipelineReport;
use docfetch_engine::{Fetcher, Pipeline, ReqwestFetcher, SessionProvider, StaticSessionProvider};
use engine_logging::{engine_error, engine_info, LevelFilter, LogDestination};

use crate::cli::Cli;
use crate::config::RunConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(LogDestination::terminal_and(cli.log_file.clone()), level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            engine_error!("docfetch failed: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = RunConfig::resolve(cli)?;
    let records = worklist::load(&config.input)?;
    engine_info!(
        "{} record(s) from {}, writing to {}",
        records.len(),
        config.input.display(),
        config.pipeline.dest_dir.display()
    );

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let started = Utc::now();
    let report = runtime.block_on(execute(&config, records))?;
    let finished = Utc::now();

    let written = report::write(&config.report_path, &report, started, finished)?;
    engine_info!("wrote {}", written.display());
    engine_info!("PDF extraction finished: {}", report::summary(&report));
    Ok(())
}

async fn execute(
    config: &RunConfig,
    records: Vec<docfetch_core::Record>,
) -> anyhow::Result<PipelineReport> {
    let fetcher: Arc<dyn Fetcher> =
        Arc::new(ReqwestFetcher::new(config.fetch.clone()).context("building HTTP client")?);
    let pipeline = Pipeline::new(config.pipeline.clone(), fetcher.clone());

    let provider = StaticSessionProvider::new(fetcher);
    let sessions: Option<&dyn SessionProvider> = if config.render_fallback {
        Some(&provider)
    } else {
        None
    };
    Ok(pipeline.run(records, sessions).await)
}
