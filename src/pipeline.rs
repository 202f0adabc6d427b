//! One site's crawl run.
//!
//! A run moves through `Idle → Discovering → Fetching → Extracting →
//! Persisting → Done` without going back. Each stage consumes the whole batch
//! produced by the previous one. A failure while persisting leaves whatever
//! the store already committed in place; there is no partial-run recovery.

use crate::error::PipelineError;
use crate::models::RunSummary;
use crate::savers::Saver;
use crate::scrapers::{Getter, Parser};
use std::fmt;
use std::time::Instant;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Discovering,
    Fetching,
    Extracting,
    Persisting,
    Done,
}

impl Stage {
    /// The stage that follows this one; `Done` is terminal.
    pub fn next(self) -> Stage {
        match self {
            Stage::Idle => Stage::Discovering,
            Stage::Discovering => Stage::Fetching,
            Stage::Fetching => Stage::Extracting,
            Stage::Extracting => Stage::Persisting,
            Stage::Persisting | Stage::Done => Stage::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Discovering => "discovering",
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Persisting => "persisting",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

struct Run<'a> {
    site: &'a str,
    stage: Stage,
}

impl Run<'_> {
    fn advance(&mut self) {
        self.stage = self.stage.next();
        info!(site = self.site, stage = %self.stage, "Stage started");
    }
}

/// Run discovery, fetching, extraction and persistence for one site.
#[instrument(level = "info", skip(getter, parser, saver))]
pub async fn run<G, P, S>(
    site: &str,
    getter: &G,
    parser: &P,
    saver: &S,
) -> Result<RunSummary, PipelineError>
where
    G: Getter,
    P: Parser,
    S: Saver,
{
    let started = Instant::now();
    let mut run = Run {
        site,
        stage: Stage::Idle,
    };
    let mut summary = RunSummary {
        site: site.to_string(),
        ..RunSummary::default()
    };

    run.advance();
    let sources = getter.fetch_sources().await.inspect_err(|e| {
        error!(site, error = %e, "Discovery failed");
    })?;
    summary.discovered = sources.len();

    run.advance();
    let scrap = getter.fetch_scrap(sources).await;
    summary.fetched = parser.info_scrap(&scrap);

    run.advance();
    let parsed = parser.parse_scrap(scrap);
    summary.failed = parsed.iter().filter(|p| p.text.is_none()).count();
    summary.parsed = parsed.len() - summary.failed;
    parser.info_parsed_scrap(&parsed);

    run.advance();
    summary.insert = saver.save_parsed_scrap(&parsed).await.inspect_err(|e| {
        error!(site, error = %e, "Persisting failed");
    })?;

    run.advance();
    let elapsed = started.elapsed();
    info!(
        site,
        discovered = summary.discovered,
        fetched = summary.fetched,
        parsed = summary.parsed,
        failed = summary.failed,
        inserted = summary.insert.inserted,
        skipped = summary.insert.skipped,
        secs = elapsed.as_secs(),
        "Run complete"
    );
    Ok(summary)
}
