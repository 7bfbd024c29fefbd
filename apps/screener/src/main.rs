use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use screener::batch::{BatchRequest, BatchResultStore, BatchSubmitter, ResultFilter, SortSpec};
use screener::client::ScreeningClient;
use screener::config::Config;
use screener::models::{Document, TargetDocument, VerdictThresholds};
use screener::report::{self, BatchSummary};
use screener::ScreenerError;

#[derive(Parser)]
#[command(name = "screener", version, about = "Match resumes against job descriptions")]
struct Cli {
    /// Base URL of the screening service
    #[arg(long, env = "SCREENER_API_URL")]
    api_url: Option<String>,

    /// Bearer token for the screening service
    #[arg(long, env = "SCREENER_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score one resume against one job description
    Analyze {
        resume: PathBuf,
        #[command(flatten)]
        jd: JdArgs,
    },
    /// Score many resumes against one job description
    Bulk {
        #[arg(required = true)]
        resumes: Vec<PathBuf>,
        #[command(flatten)]
        jd: JdArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Score one resume against many job descriptions
    Reverse {
        #[arg(long)]
        resume: PathBuf,
        #[arg(required = true)]
        job_descriptions: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct JdArgs {
    /// Job description text
    #[arg(long)]
    jd_text: Option<String>,
    /// Job description PDF
    #[arg(long)]
    jd_file: Option<PathBuf>,
}

#[derive(Args)]
struct OutputArgs {
    /// Only list results scoring at least this much
    #[arg(long)]
    min_score: Option<u32>,
    /// Write a ranked CSV of the received results
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Save the server's CSV export once the batch completes
    #[arg(long)]
    download: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    if cli.token.is_some() {
        config.auth_token = cli.token;
    }

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Screener client v{} ({})", env!("CARGO_PKG_VERSION"), config.api_url);

    let client = ScreeningClient::new(&config).context("Failed to build HTTP client")?;

    match cli.command {
        Command::Analyze { resume, jd } => {
            let resume = load(&resume).await?;
            let target = jd.into_target().await?;
            let analysis = client
                .analyze(&resume, &target)
                .await
                .map_err(user_error)?;

            println!("Score: {}%", analysis.score);
            println!("Summary: {}", analysis.summary);
            println!("Matching skills: {}", analysis.matching_skills.join(", "));
            println!("Missing skills: {}", analysis.missing_skills.join(", "));
            Ok(())
        }
        Command::Bulk {
            resumes,
            jd,
            output,
        } => {
            let target = jd.into_target().await?;
            let request = BatchRequest::bulk(target, load_all(&resumes).await?);
            run_batch(&client, &config, request, output).await
        }
        Command::Reverse {
            resume,
            job_descriptions,
            output,
        } => {
            let request =
                BatchRequest::reverse(load(&resume).await?, load_all(&job_descriptions).await?);
            run_batch(&client, &config, request, output).await
        }
    }
}

impl JdArgs {
    async fn into_target(self) -> Result<TargetDocument> {
        match (self.jd_text, self.jd_file) {
            (Some(text), _) => Ok(TargetDocument::Text(text)),
            (None, Some(path)) => Ok(TargetDocument::File(load(&path).await?)),
            (None, None) => anyhow::bail!("Provide --jd-text or --jd-file"),
        }
    }
}

async fn load(path: &Path) -> Result<Document> {
    Document::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn load_all(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        docs.push(load(path).await?);
    }
    Ok(docs)
}

async fn run_batch(
    client: &ScreeningClient,
    config: &Config,
    request: BatchRequest,
    output: OutputArgs,
) -> Result<()> {
    let submitter = BatchSubmitter::new(Arc::new(client.clone()));
    let mut store = BatchResultStore::new();

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping batch");
            ctrl_c.cancel();
        }
    });

    let outcome = submitter
        .run_with_progress(&request, &mut store, &cancel, |store, elapsed| {
            if store.processed_count() == 0 {
                return;
            }
            let eta = store
                .estimated_remaining(elapsed)
                .map(|d| format!("{}s", d.as_secs()))
                .unwrap_or_else(|| "unknown".to_string());
            info!(
                "Processed {}/{} ({}%), elapsed {}s, remaining {}",
                store.processed_count(),
                store.total(),
                store.progress_percent(),
                elapsed,
                eta
            );
        })
        .await;

    print_results(&store, &config.thresholds, output.min_score);

    if let Some(path) = &output.csv {
        let rows = report::export_csv(path, &store, &config.thresholds)
            .map_err(user_error)?;
        info!("Wrote {rows} results to {}", path.display());
    }

    let outcome = outcome.map_err(user_error)?;
    info!(
        "Batch {} finished in {}s ({} malformed frames skipped)",
        outcome.batch_id, outcome.elapsed_secs, outcome.dropped_frames
    );

    if let Some(path) = &output.download {
        let session_id = store
            .export_reference()
            .map_err(user_error)?;
        client
            .save_results(session_id, path)
            .await
            .map_err(user_error)?;
    }
    Ok(())
}

/// Logs service-side failures once, then hands the readable message to anyhow.
fn user_error(e: ScreenerError) -> anyhow::Error {
    if e.is_internal() {
        error!(code = e.code(), "{e}");
    }
    anyhow::anyhow!(e.user_message())
}

fn print_results(store: &BatchResultStore, thresholds: &VerdictThresholds, min_score: Option<u32>) {
    let filter = ResultFilter {
        min_score,
        thresholds: *thresholds,
        ..ResultFilter::default()
    };
    for (rank, result) in store
        .snapshot(&filter, SortSpec::score_desc())
        .iter()
        .enumerate()
    {
        println!(
            "{:>3}. {:<40} {:>3}%  {}",
            rank + 1,
            result.filename,
            result.score,
            result.effective_verdict(thresholds).label()
        );
    }

    let summary = BatchSummary::from_store(store, thresholds);
    println!(
        "{}/{} screened, {} shortlisted, {} maybe, {} rejected, average score {}%",
        summary.processed,
        summary.total,
        summary.shortlisted,
        summary.maybe,
        summary.rejected,
        summary.average_score
    );
}
