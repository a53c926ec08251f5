//! Error taxonomy for the digest pipeline.
//!
//! Link and article failures stay local to the item that produced them and
//! never escalate. Summarizer failures are not represented here as errors the
//! orchestrator propagates: they are folded into
//! [`SummaryOutcome::Fatal`](crate::api::SummaryOutcome) and branched on.
//! [`PipelineError`] covers the process-ending cases.

use std::path::PathBuf;
use thiserror::Error;

/// A hyperlink that could not be turned into a canonical article URL.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("not a valid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("redirect target returned status {0}")]
    Status(reqwest::StatusCode),
}

/// An extractor failure that is not an ordinary fetch or parse miss.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector `{0}`")]
    Selector(String),
}

/// Transport or decode failure inside the summarizer adapter.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Failures that end the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error("failed to write report {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("failed to notify {recipient}: {reason}")]
    Notify { recipient: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_from_parse_error() {
        let err: ResolveError = url::Url::parse("not a url").unwrap_err().into();
        assert!(err.to_string().starts_with("not a valid URL"));
    }

    #[test]
    fn test_pipeline_error_messages_name_the_target() {
        let err = PipelineError::Notify {
            recipient: "ops@example.com".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to notify ops@example.com: connection refused"
        );

        let err = PipelineError::Persist {
            path: PathBuf::from("output/digest.xlsx"),
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("output/digest.xlsx"));
    }
}
