//! Screening client: the single point of entry for all calls to the scoring service.
//!
//! Batch submissions reach the network only through the [`ScoringService`] trait,
//! so the submitter can be driven by an in-memory fake in tests.

use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::batch::request::{pdf_part, BatchRequest};
use crate::config::Config;
use crate::errors::{ScreenerError, ScreenerResult};
use crate::models::{Document, MatchAnalysis, TargetDocument};

const MAX_RETRIES: u32 = 3;

/// Raw body chunks of a streaming response.
pub type ByteStream = Pin<Box<dyn Stream<Item = ScreenerResult<Bytes>> + Send>>;

/// The scoring backend as seen by the batch submitter.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Uploads the batch and returns the body of the progress stream.
    /// Authorization failures surface here, before any event is read.
    async fn open_batch(&self, request: &BatchRequest) -> ScreenerResult<ByteStream>;
}

/// Error body shapes the service may return: FastAPI's `{"detail": ...}` or
/// `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    error: Option<ErrorBodyInner>,
}

#[derive(Debug, Deserialize)]
struct ErrorBodyInner {
    message: String,
}

#[derive(Clone)]
pub struct ScreeningClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ScreeningClient {
    pub fn new(config: &Config) -> ScreenerResult<Self> {
        // No overall timeout: a batch stream runs until it completes or the caller aborts.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Scores one resume against one job description.
    pub async fn analyze(
        &self,
        resume: &Document,
        target: &TargetDocument,
    ) -> ScreenerResult<MatchAnalysis> {
        resume.ensure_pdf("resume")?;
        let mut form = reqwest::multipart::Form::new().part("resume", pdf_part(resume)?);
        form = match target {
            TargetDocument::Text(text) => {
                if text.trim().is_empty() {
                    return Err(ScreenerError::Validation(
                        "Please enter a job description.".to_string(),
                    ));
                }
                form.text("job_description", text.clone())
            }
            TargetDocument::File(doc) => {
                doc.ensure_pdf("job description")?;
                form.part("job_description_file", pdf_part(doc)?)
            }
        };

        let response = self
            .authorize(self.client.post(self.url("/analyze")))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        let analysis: MatchAnalysis = response.json().await?;

        debug!(score = analysis.score, resume = %resume.filename, "Single analysis finished");
        Ok(analysis)
    }

    /// Fetches the CSV artifact of a completed batch.
    /// Retries on 429 and 5xx with exponential backoff.
    pub async fn download_results(&self, session_id: &str) -> ScreenerResult<Bytes> {
        let url = self.url(&format!("/download-results/{session_id}"));
        let mut last_error: Option<ScreenerError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Download attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.authorize(self.client.get(&url)).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ScreenerError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(ScreenerError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            let response = check_status(response).await?;
            return Ok(response.bytes().await?);
        }

        Err(last_error.unwrap_or_else(|| {
            ScreenerError::Transport(format!("download failed after {MAX_RETRIES} attempts"))
        }))
    }

    /// Downloads the CSV artifact and writes it to `path` verbatim.
    pub async fn save_results(&self, session_id: &str, path: &Path) -> ScreenerResult<u64> {
        let body = self.download_results(session_id).await?;
        tokio::fs::write(path, &body).await?;
        info!(session_id, path = %path.display(), bytes = body.len(), "Saved results CSV");
        Ok(body.len() as u64)
    }
}

#[async_trait]
impl ScoringService for ScreeningClient {
    async fn open_batch(&self, request: &BatchRequest) -> ScreenerResult<ByteStream> {
        let response = self
            .authorize(self.client.post(self.url(request.mode.endpoint())))
            .header("accept", "text/event-stream")
            .header("x-batch-id", request.batch_id.to_string())
            .multipart(request.to_form()?)
            .send()
            .await
            .map_err(|e| ScreenerError::Transport(format!("could not open batch stream: {e}")))?;

        let response = check_status(response).await?;
        info!(
            batch_id = %request.batch_id,
            mode = ?request.mode,
            candidates = request.candidates.len(),
            "Batch stream opened"
        );

        let stream = response
            .bytes_stream()
            .map_err(|e| ScreenerError::Transport(format!("stream interrupted: {e}")));
        Ok(stream.boxed())
    }
}

/// Maps non-success statuses onto the error taxonomy.
async fn check_status(response: Response) -> ScreenerResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::FORBIDDEN | StatusCode::PAYMENT_REQUIRED => {
            warn!("Scoring service refused the request: insufficient credits");
            Err(ScreenerError::InsufficientCredits)
        }
        StatusCode::UNAUTHORIZED => Err(ScreenerError::Unauthorized),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ScreenerError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
            })
        }
    }
}

fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(inner), ..
        }) => inner.message,
        Ok(ErrorBody {
            detail: Some(serde_json::Value::String(detail)),
            ..
        }) => detail,
        Ok(ErrorBody {
            detail: Some(detail),
            ..
        }) => detail.to_string(),
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_string() {
        assert_eq!(
            extract_error_message(r#"{"detail":"Only PDF resumes are supported."}"#),
            "Only PDF resumes are supported."
        );
    }

    #[test]
    fn test_extract_nested_error_message() {
        assert_eq!(
            extract_error_message(r#"{"error":{"code":"X","message":"boom"}}"#),
            "boom"
        );
    }

    #[test]
    fn test_extract_plain_text_body() {
        assert_eq!(extract_error_message("  Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = Config {
            api_url: "http://localhost:8000/".to_string(),
            auth_token: None,
            thresholds: Default::default(),
            connect_timeout_secs: 5,
            rust_log: "info".to_string(),
        };
        let client = ScreeningClient::new(&config).unwrap();
        assert_eq!(client.url("/analyze"), "http://localhost:8000/analyze");
    }
}
