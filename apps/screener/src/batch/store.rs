//! Batch result store: the authoritative, queryable view of a running batch.
//!
//! State machine: `Idle -> Awaiting -> Accumulating -> Completed`, with `Failed`
//! reachable from any non-completed state. `apply` is a pure transition: when it
//! returns an error the store is left untouched and the caller decides whether to
//! `fail()` it. Results are never discarded except by `reset()`.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::batch::events::{Completion, ProgressEvent};
use crate::errors::{ErrorKind, ScreenerError, ScreenerResult};
use crate::models::{ScreeningResult, Verdict, VerdictThresholds};

// ────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum BatchPhase {
    Idle,
    Awaiting { total: u32 },
    Accumulating,
    Completed,
    Failed,
}

impl BatchPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Awaiting { .. } => "Waiting for results...",
            Self::Accumulating => "Screening...",
            Self::Completed => "Done",
            Self::Failed => "Failed",
        }
    }

    /// A submission is running; re-submitting must be refused.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Awaiting { .. } | Self::Accumulating)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Snapshot projection
// ────────────────────────────────────────────────────────────────────────────

/// Which results a snapshot keeps. The default keeps everything.
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub min_score: Option<u32>,
    /// Matched against the server verdict, or the score-derived fallback.
    pub verdict: Option<Verdict>,
    pub thresholds: VerdictThresholds,
}

impl ResultFilter {
    pub fn min_score(min_score: u32) -> Self {
        Self {
            min_score: Some(min_score),
            ..Self::default()
        }
    }

    fn matches(&self, result: &ScreeningResult) -> bool {
        self.min_score.map_or(true, |min| result.score >= min)
            && self
                .verdict
                .map_or(true, |v| result.effective_verdict(&self.thresholds) == v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Arrival order.
    #[default]
    Arrival,
    Score,
    Filename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub by: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn score_desc() -> Self {
        Self {
            by: SortKey::Score,
            direction: SortDirection::Desc,
        }
    }

    pub fn score_asc() -> Self {
        Self {
            by: SortKey::Score,
            direction: SortDirection::Asc,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BatchResultStore {
    phase: BatchPhase,
    /// Kept in index order; in-order delivery makes every insert an append.
    results: Vec<ScreeningResult>,
    total: u32,
    completion: Option<Completion>,
    started_at: DateTime<Utc>,
    error: Option<ErrorKind>,
    error_message: Option<String>,
}

impl Default for BatchResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchResultStore {
    pub fn new() -> Self {
        Self {
            phase: BatchPhase::Idle,
            results: Vec::new(),
            total: 0,
            completion: None,
            started_at: Utc::now(),
            error: None,
            error_message: None,
        }
    }

    pub fn apply(&mut self, event: ProgressEvent) -> ScreenerResult<()> {
        if self.phase.is_terminal() {
            debug!(event = event.name(), phase = ?self.phase, "Ignoring event after batch ended");
            return Ok(());
        }

        match event {
            ProgressEvent::Start { total } => {
                if self.phase != BatchPhase::Idle {
                    return Err(ScreenerError::Protocol(format!(
                        "received a second start event (total {total}) after the batch began"
                    )));
                }
                info!(total, "Batch started");
                self.total = total;
                self.started_at = Utc::now();
                self.phase = BatchPhase::Awaiting { total };
            }
            ProgressEvent::Result(result) => {
                if self.phase == BatchPhase::Idle {
                    return Err(ScreenerError::Protocol(format!(
                        "result for {} arrived before the start event",
                        result.filename
                    )));
                }
                // Indices are 1-based; with duplicates refused this also bounds the count.
                if !(1..=self.total).contains(&result.index) {
                    return Err(ScreenerError::Protocol(format!(
                        "result index {} is outside the announced total of {}",
                        result.index, self.total
                    )));
                }
                let position = self.results.partition_point(|r| r.index <= result.index);
                if position > 0 && self.results[position - 1].index == result.index {
                    return Err(ScreenerError::Protocol(format!(
                        "duplicate result for index {}",
                        result.index
                    )));
                }
                debug!(
                    index = result.index,
                    score = result.score,
                    filename = %result.filename,
                    "Result received"
                );
                self.results.insert(position, result);
                self.phase = BatchPhase::Accumulating;
            }
            ProgressEvent::Complete(completion) => {
                if self.phase == BatchPhase::Idle {
                    return Err(ScreenerError::Protocol(
                        "completion arrived before the start event".to_string(),
                    ));
                }
                info!(
                    session_id = %completion.session_id,
                    processed = completion.processed,
                    total = self.total,
                    "Batch completed"
                );
                self.completion = Some(completion);
                self.phase = BatchPhase::Completed;
            }
        }
        Ok(())
    }

    /// Marks the batch failed, keeping every result received so far.
    pub fn fail(&mut self, error: &ScreenerError) {
        if self.phase == BatchPhase::Completed {
            return;
        }
        self.error = Some(error.kind());
        self.error_message = Some(error.to_string());
        self.phase = BatchPhase::Failed;
    }

    /// Back to `Idle`, discarding everything.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn results(&self) -> &[ScreeningResult] {
        &self.results
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn processed_count(&self) -> u32 {
        self.results.len() as u32
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn error(&self) -> Option<ErrorKind> {
        self.error
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Filtered and sorted view of the results. Ties keep arrival order.
    pub fn snapshot(&self, filter: &ResultFilter, sort: SortSpec) -> Vec<&ScreeningResult> {
        let mut view: Vec<&ScreeningResult> =
            self.results.iter().filter(|r| filter.matches(r)).collect();

        let compare = |a: &&ScreeningResult, b: &&ScreeningResult| -> Ordering {
            match sort.by {
                SortKey::Arrival => Ordering::Equal,
                SortKey::Score => a.score.cmp(&b.score),
                SortKey::Filename => a.filename.to_lowercase().cmp(&b.filename.to_lowercase()),
            }
        };
        match sort.direction {
            SortDirection::Asc => view.sort_by(compare),
            SortDirection::Desc if sort.by == SortKey::Arrival => view.reverse(),
            SortDirection::Desc => view.sort_by(|a, b| compare(b, a)),
        }
        view
    }

    pub fn shortlisted_count(&self, threshold: u32) -> usize {
        self.results.iter().filter(|r| r.score >= threshold).count()
    }

    /// Rounded mean score; 0 when nothing has arrived.
    pub fn average_score(&self) -> u32 {
        if self.results.is_empty() {
            return 0;
        }
        let sum: u64 = self.results.iter().map(|r| u64::from(r.score)).sum();
        (sum as f64 / self.results.len() as f64).round() as u32
    }

    /// Linear extrapolation of the remaining time. `None` until the first result.
    pub fn estimated_remaining(&self, elapsed_secs: u64) -> Option<Duration> {
        let processed = self.processed_count();
        if processed == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(processed);
        let secs = elapsed_secs as f64 * f64::from(remaining) / f64::from(processed);
        Some(Duration::from_secs_f64(secs))
    }

    pub fn progress_percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.processed_count() * 100 / self.total).min(100)
    }

    /// Session id for the server-side CSV export. Only valid once completed.
    pub fn export_reference(&self) -> ScreenerResult<&str> {
        match (&self.phase, &self.completion) {
            (BatchPhase::Completed, Some(completion)) => Ok(&completion.session_id),
            _ => Err(ScreenerError::NotReady),
        }
    }
}
