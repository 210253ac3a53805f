//! Error taxonomy for a single run.
//!
//! Every stage returns [`PipelineError`]; the orchestrator stops at the first
//! one it sees. An undersized download is *not* an error: see
//! [`Artifact::low_confidence`](crate::models::Artifact::low_confidence).

use thiserror::Error;

/// Result alias used by every stage.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Top-level failure of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// One or more required inputs were absent before any network activity.
    #[error("configuration error: missing {}", missing.join(", "))]
    Configuration {
        /// Environment variable names that were unset or empty.
        missing: Vec<&'static str>,
    },

    /// Login form could not be driven.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// Neither direct probing nor the archive produced an issue URL.
    #[error("current issue not found (direct probe and archive scan exhausted)")]
    IssueNotFound,

    /// No locator strategy produced a usable download target.
    #[error("download link not found on {page}")]
    DownloadLinkNotFound {
        /// Issue page that was searched.
        page: String,
    },

    /// The artifact request returned a non-success status.
    #[error("transfer failed with HTTP {status} for {url}")]
    Transfer {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Browser automation failure not covered by a stage-specific variant.
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// HTTP client failure (connect, TLS, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mail composition or SMTP transmission failure.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Failures specific to the login form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// None of the selector alternatives for an input resolved in time.
    #[error("{field} field not found")]
    FieldNotFound {
        /// `"identifier"` or `"secret"`.
        field: &'static str,
    },

    /// None of the submit strategies matched.
    #[error("submit control not found")]
    SubmitControlNotFound,
}

/// Failures raised by a [`BrowserSession`](crate::browser::BrowserSession).
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("page script failed: {0}")]
    Script(String),

    #[error("capture failed: {0}")]
    Capture(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_lists_every_missing_name() {
        let err = PipelineError::Configuration {
            missing: vec!["RESPEKT_LOGIN", "KINDLE_EMAIL"],
        };
        assert_eq!(
            err.to_string(),
            "configuration error: missing RESPEKT_LOGIN, KINDLE_EMAIL"
        );
    }

    #[test]
    fn auth_error_converts_into_pipeline_error() {
        let err: PipelineError = AuthError::FieldNotFound { field: "secret" }.into();
        assert!(matches!(
            err,
            PipelineError::Authentication(AuthError::FieldNotFound { field: "secret" })
        ));
        assert_eq!(err.to_string(), "authentication failed: secret field not found");
    }
}
