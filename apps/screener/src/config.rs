use anyhow::{bail, Context, Result};

use crate::models::VerdictThresholds;

const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    /// Bearer credential issued by the identity provider. Acquisition and refresh happen elsewhere.
    pub auth_token: Option<String>,
    pub thresholds: VerdictThresholds,
    pub connect_timeout_secs: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = VerdictThresholds::default();
        let thresholds = VerdictThresholds {
            shortlist: parse_env("SCREENER_SHORTLIST_THRESHOLD", defaults.shortlist)?,
            maybe: parse_env("SCREENER_MAYBE_THRESHOLD", defaults.maybe)?,
        };
        validate_thresholds(&thresholds)?;

        Ok(Config {
            api_url: std::env::var("SCREENER_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            auth_token: std::env::var("SCREENER_AUTH_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            thresholds,
            connect_timeout_secs: parse_env("SCREENER_CONNECT_TIMEOUT_SECS", 10)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .ok()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

fn validate_thresholds(thresholds: &VerdictThresholds) -> Result<()> {
    if thresholds.shortlist > 100 || thresholds.maybe > 100 {
        bail!("Verdict thresholds must be between 0 and 100");
    }
    if thresholds.maybe > thresholds.shortlist {
        bail!(
            "Maybe threshold ({}) cannot exceed shortlist threshold ({})",
            thresholds.maybe,
            thresholds.shortlist
        );
    }
    Ok(())
}
