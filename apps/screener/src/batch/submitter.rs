use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::events::ProgressEvent;
use crate::batch::frames::FrameDecoder;
use crate::batch::request::BatchRequest;
use crate::batch::store::{BatchPhase, BatchResultStore};
use crate::batch::ticker::ElapsedTicker;
use crate::client::{ByteStream, ScoringService};
use crate::errors::{ErrorKind, ScreenerError, ScreenerResult};

/// Summary of one `run`, whatever way it ended without an error.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    pub elapsed_secs: u64,
    pub dropped_frames: u64,
    pub cancelled: bool,
}

/// Packages a batch, opens the progress stream and feeds decoded events to a store.
#[derive(Clone)]
pub struct BatchSubmitter {
    service: Arc<dyn ScoringService>,
}

impl BatchSubmitter {
    pub fn new(service: Arc<dyn ScoringService>) -> Self {
        Self { service }
    }

    /// Validates the request and opens its event stream.
    /// Nothing goes over the network when validation fails.
    pub async fn submit(&self, request: &BatchRequest) -> ScreenerResult<BatchStream> {
        request.validate()?;
        info!(
            batch_id = %request.batch_id,
            mode = ?request.mode,
            candidates = request.candidates.len(),
            "Submitting batch"
        );
        let bytes = self.service.open_batch(request).await?;
        Ok(BatchStream::new(bytes))
    }

    /// Runs a whole submission against `store`, which is reset once the request validates.
    ///
    /// Stops on completion, on error, when the stream ends, or when `cancel` fires.
    /// Results already applied stay in the store on every path.
    pub async fn run(
        &self,
        request: &BatchRequest,
        store: &mut BatchResultStore,
        cancel: &CancellationToken,
    ) -> ScreenerResult<BatchOutcome> {
        self.run_with_progress(request, store, cancel, |_, _| {})
            .await
    }

    /// Like [`run`](Self::run), calling `progress` with the store and elapsed seconds
    /// after every applied event.
    pub async fn run_with_progress<F>(
        &self,
        request: &BatchRequest,
        store: &mut BatchResultStore,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> ScreenerResult<BatchOutcome>
    where
        F: FnMut(&BatchResultStore, u64),
    {
        if store.phase().is_in_flight() {
            return Err(ScreenerError::Validation(
                "A batch is already in progress.".to_string(),
            ));
        }
        request.validate()?;
        store.reset();

        let ticker = ElapsedTicker::start();
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self.submit(request) => Some(opened),
        };
        let mut stream = match opened {
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                if e.kind() == ErrorKind::Transport {
                    store.fail(&e);
                }
                return Err(e);
            }
            None => {
                info!(batch_id = %request.batch_id, "Batch cancelled before upload finished");
                store.fail(&ScreenerError::Cancelled);
                return Ok(BatchOutcome {
                    batch_id: request.batch_id,
                    dropped_frames: 0,
                    elapsed_secs: ticker.stop(),
                    cancelled: true,
                });
            }
        };

        let mut cancelled = false;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = stream.next_event() => next,
            };

            match next {
                Some(Ok(event)) => {
                    if let Err(e) = store.apply(event) {
                        warn!(batch_id = %request.batch_id, "Batch aborted: {e}");
                        store.fail(&e);
                        return Err(e);
                    }
                    progress(&*store, ticker.elapsed_secs());
                    if store.phase() == BatchPhase::Completed {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(
                        batch_id = %request.batch_id,
                        processed = store.processed_count(),
                        "Batch stream failed: {e}"
                    );
                    store.fail(&e);
                    return Err(e);
                }
                None => {
                    let e = ScreenerError::Transport(
                        "stream ended before the batch completed".to_string(),
                    );
                    warn!(
                        batch_id = %request.batch_id,
                        processed = store.processed_count(),
                        total = store.total(),
                        "{e}"
                    );
                    store.fail(&e);
                    return Err(e);
                }
            }
        }

        if cancelled {
            info!(
                batch_id = %request.batch_id,
                processed = store.processed_count(),
                "Batch cancelled"
            );
            store.fail(&ScreenerError::Cancelled);
        }

        Ok(BatchOutcome {
            batch_id: request.batch_id,
            dropped_frames: stream.dropped_frames(),
            elapsed_secs: ticker.stop(),
            cancelled,
        })
    }
}

/// Lazy, finite sequence of progress events for one submission. Not restartable.
pub struct BatchStream {
    bytes: ByteStream,
    decoder: FrameDecoder,
    pending: VecDeque<ProgressEvent>,
    exhausted: bool,
    completed: bool,
}

impl BatchStream {
    pub fn new(bytes: ByteStream) -> Self {
        Self {
            bytes,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            exhausted: false,
            completed: false,
        }
    }

    /// Next decoded event; `None` once the stream is over.
    /// Nothing is yielded after a `Complete` event.
    pub async fn next_event(&mut self) -> Option<ScreenerResult<ProgressEvent>> {
        loop {
            if self.completed {
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                if matches!(event, ProgressEvent::Complete(_)) {
                    self.completed = true;
                    self.pending.clear();
                }
                return Some(Ok(event));
            }
            if self.exhausted {
                return None;
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.decoder.push(&chunk)),
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                None => {
                    self.exhausted = true;
                    self.pending.extend(self.decoder.finish());
                }
            }
        }
    }

    pub fn dropped_frames(&self) -> u64 {
        self.decoder.dropped_frames()
    }
}
