//! Local reports over a batch: ranked CSV export and a one-line summary.
//!
//! The server keeps its own CSV per session (see `ScreeningClient::download_results`);
//! this export works from whatever the store holds, including partial or failed batches.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::batch::store::{BatchResultStore, ResultFilter, SortSpec};
use crate::errors::ScreenerResult;
use crate::models::{ScreeningResult, Verdict, VerdictThresholds};

const HEADERS: [&str; 7] = [
    "Rank",
    "Filename",
    "Score",
    "Verdict",
    "Matching Skills",
    "Missing Skills",
    "Summary",
];

/// Field order must follow `HEADERS`.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Rank")]
    rank: usize,
    #[serde(rename = "Filename")]
    filename: &'a str,
    #[serde(rename = "Score")]
    score: u32,
    #[serde(rename = "Verdict")]
    verdict: &'static str,
    #[serde(rename = "Matching Skills")]
    matching_skills: String,
    #[serde(rename = "Missing Skills")]
    missing_skills: String,
    #[serde(rename = "Summary")]
    summary: &'a str,
}

/// Writes results ranked by score (highest first, ties in arrival order).
pub fn write_csv<W: Write>(
    writer: W,
    store: &BatchResultStore,
    thresholds: &VerdictThresholds,
) -> ScreenerResult<usize> {
    let ranked = store.snapshot(&ResultFilter::default(), SortSpec::score_desc());
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(HEADERS)?;
    for (i, result) in ranked.iter().enumerate() {
        csv.serialize(row(i + 1, result, thresholds))?;
    }
    csv.flush()?;
    Ok(ranked.len())
}

pub fn export_csv(
    path: &Path,
    store: &BatchResultStore,
    thresholds: &VerdictThresholds,
) -> ScreenerResult<usize> {
    let file = std::fs::File::create(path)?;
    write_csv(file, store, thresholds)
}

fn row<'a>(rank: usize, result: &'a ScreeningResult, thresholds: &VerdictThresholds) -> CsvRow<'a> {
    CsvRow {
        rank,
        filename: &result.filename,
        score: result.score,
        verdict: result.effective_verdict(thresholds).label(),
        matching_skills: result.matching_skills.join(", "),
        missing_skills: result.missing_skills.join(", "),
        summary: result.summary.as_deref().unwrap_or(""),
    }
}

/// Aggregate figures shown after a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: u32,
    pub processed: u32,
    pub shortlisted: usize,
    pub maybe: usize,
    pub rejected: usize,
    pub average_score: u32,
}

impl BatchSummary {
    pub fn from_store(store: &BatchResultStore, thresholds: &VerdictThresholds) -> Self {
        let count = |verdict: Verdict| {
            store
                .results()
                .iter()
                .filter(|r| r.effective_verdict(thresholds) == verdict)
                .count()
        };
        Self {
            total: store.total(),
            processed: store.processed_count(),
            shortlisted: count(Verdict::Shortlisted),
            maybe: count(Verdict::Maybe),
            rejected: count(Verdict::Rejected),
            average_score: store.average_score(),
        }
    }
}
