use serde::Serialize;
use thiserror::Error;

/// Client-level error type.
/// Every variant is locally recoverable: callers map it to a user-facing message
/// with `user_message()` and, for batch runs, record its `kind()` in the result store.
#[derive(Debug, Error)]
pub enum ScreenerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Results are not ready for export")]
    NotReady,

    #[error("Batch cancelled")]
    Cancelled,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Coarse error classification kept in the result store after a failed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InsufficientCredits,
    Unauthorized,
    Transport,
    Protocol,
    NotReady,
    Cancelled,
    Api,
    Io,
}

impl ScreenerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScreenerError::Validation(_) => ErrorKind::Validation,
            ScreenerError::InsufficientCredits => ErrorKind::InsufficientCredits,
            ScreenerError::Unauthorized => ErrorKind::Unauthorized,
            // A reqwest failure surfaced after the request went out is a transport failure.
            ScreenerError::Transport(_) | ScreenerError::Http(_) => ErrorKind::Transport,
            ScreenerError::Protocol(_) => ErrorKind::Protocol,
            ScreenerError::NotReady => ErrorKind::NotReady,
            ScreenerError::Cancelled => ErrorKind::Cancelled,
            ScreenerError::Api { .. } => ErrorKind::Api,
            ScreenerError::Io(_) | ScreenerError::Csv(_) => ErrorKind::Io,
        }
    }

    /// Stable machine-readable code, mirroring the codes the API returns in error bodies.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::InsufficientCredits => "INSUFFICIENT_CREDITS",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Transport => "TRANSPORT_ERROR",
            ErrorKind::Protocol => "PROTOCOL_ERROR",
            ErrorKind::NotReady => "NOT_READY",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::Api => "API_ERROR",
            ErrorKind::Io => "IO_ERROR",
        }
    }

    /// Failures on the service side or the wire, as opposed to the user's input or account.
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::Protocol | ErrorKind::Api
        )
    }

    /// Message suitable for showing to the person running the screening.
    pub fn user_message(&self) -> String {
        match self {
            ScreenerError::Validation(msg) => msg.clone(),
            ScreenerError::InsufficientCredits => {
                "You have run out of screening credits. Upgrade your plan to continue.".to_string()
            }
            ScreenerError::Unauthorized => {
                "Your session is not authorized. Sign in again and retry.".to_string()
            }
            ScreenerError::Transport(_) | ScreenerError::Http(_) => {
                "Connection to the screening service was lost. Results received so far are kept."
                    .to_string()
            }
            ScreenerError::Protocol(_) => {
                "The screening service sent an unexpected response. Results received so far are kept."
                    .to_string()
            }
            ScreenerError::NotReady => {
                "Results can be exported once the screening has completed.".to_string()
            }
            ScreenerError::Cancelled => {
                "Screening was cancelled. Results received so far are kept.".to_string()
            }
            ScreenerError::Api { message, .. } => {
                format!("The screening service rejected the request: {message}")
            }
            ScreenerError::Io(e) => format!("File error: {e}"),
            ScreenerError::Csv(e) => format!("Could not write CSV report: {e}"),
        }
    }
}

pub type ScreenerResult<T> = Result<T, ScreenerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_code_for_transport() {
        let err = ScreenerError::Transport("connection reset".to_string());
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.code(), "TRANSPORT_ERROR");
    }

    #[test]
    fn test_validation_message_is_passed_through() {
        let err = ScreenerError::Validation("Please select a resume.".to_string());
        assert_eq!(err.user_message(), "Please select a resume.");
    }

    #[test]
    fn test_insufficient_credits_message_mentions_upgrade() {
        let msg = ScreenerError::InsufficientCredits.user_message();
        assert!(msg.contains("Upgrade"));
        assert_eq!(ScreenerError::InsufficientCredits.code(), "INSUFFICIENT_CREDITS");
    }

    #[test]
    fn test_internal_errors_are_flagged() {
        assert!(ScreenerError::Protocol("bad frame".to_string()).is_internal());
        assert!(ScreenerError::Api {
            status: 500,
            message: "boom".to_string()
        }
        .is_internal());
        assert!(!ScreenerError::InsufficientCredits.is_internal());
        assert!(!ScreenerError::Cancelled.is_internal());
    }

    #[test]
    fn test_api_error_display() {
        let err = ScreenerError::Api {
            status: 400,
            message: "Only PDF resumes are supported.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error (status 400): Only PDF resumes are supported."
        );
        assert_eq!(err.kind(), ErrorKind::Api);
    }
}
