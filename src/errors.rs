// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Probe Error Types
 * Configuration, parse and transport error classification
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::Serialize;
use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abandon a unit of probe work without retrying it.
///
/// These never escape `CustomProbe::start()`: they are logged (and reported as
/// events) where they happen and the orchestrator moves on to the next unit.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Configuration errors (invalid command, conflicting options)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed request construction (bad method, bad URL)
    #[error("Invalid request for {target}: {reason}")]
    InvalidRequest {
        target: String,
        reason: String,
    },

    /// Request body file could not be read
    #[error("Body file {path:?} could not be read: {source}")]
    BodyFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// API spec payload recognized but malformed
    #[error("API spec parse error ({origin}): {reason}")]
    SpecParse {
        origin: String,
        reason: String,
    },

    /// Live API spec endpoint could not be fetched
    #[error("API spec fetch failed ({origin}): {reason}")]
    SpecFetch {
        origin: String,
        reason: String,
    },

    /// API spec payload is neither OpenAPI v3 nor Swagger v2
    #[error("Unsupported API spec type ({0})")]
    UnsupportedSpec(String),

    /// Transport client could not be constructed
    #[error("Client construction failed for {protocol}: {reason}")]
    Client {
        protocol: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type ProbeResult<T> = Result<T, ProbeError>;

/// Wait tier selected for a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffTier {
    /// Target accepted the connection but closed it before sending anything.
    NotReady,
    /// Reachable-but-erroring target (refused, reset, TLS, DNS, timeout).
    WebError,
    /// Anything that is not a network-level failure.
    Other,
}

/// Transport-level failure of a single probe call.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("connection to {target} closed before any data was received")]
    PrematureEof {
        target: String,
    },

    #[error("request to {target} failed: {reason}")]
    Web {
        target: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl CallError {
    pub fn tier(&self) -> BackoffTier {
        match self {
            CallError::PrematureEof { .. } => BackoffTier::NotReady,
            CallError::Web { .. } => BackoffTier::WebError,
            CallError::Other(_) => BackoffTier::Other,
        }
    }

    /// Classify an error returned by `reqwest` while sending a request.
    pub fn from_reqwest(target: &str, err: &reqwest::Error) -> Self {
        if is_premature_eof(err) {
            return CallError::PrematureEof {
                target: target.to_string(),
            };
        }

        CallError::Web {
            target: target.to_string(),
            reason: error_chain(err),
        }
    }

    /// Classify a socket-level error from a raw transport (FastCGI).
    pub fn from_io(target: &str, err: &io::Error) -> Self {
        if is_premature_eof(err) {
            return CallError::PrematureEof {
                target: target.to_string(),
            };
        }

        CallError::Web {
            target: target.to_string(),
            reason: err.to_string(),
        }
    }
}

/// True when any error in the source chain says the peer hung up before
/// sending a single byte of response.
pub fn is_premature_eof(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);

    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::UnexpectedEof {
                return true;
            }
        }

        let msg = e.to_string().to_lowercase();
        if msg.contains("connection closed before message completed")
            || msg.contains("unexpected eof")
            || msg.contains("unexpected end of file")
        {
            return true;
        }

        current = e.source();
    }

    false
}

/// Render an error with all of its sources, `outer: inner: root`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();

    while let Some(e) = current {
        let msg = e.to_string();
        if !parts.iter().any(|p| p == &msg) {
            parts.push(msg);
        }
        current = e.source();
    }

    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "error sending request")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_premature_eof_found_in_source_chain() {
        let err = Wrapper(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(is_premature_eof(&err));
    }

    #[test]
    fn test_connection_refused_is_not_eof() {
        let err = Wrapper(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(!is_premature_eof(&err));
        assert_eq!(CallError::from_io("x:1", &err.0).tier(), BackoffTier::WebError);
    }

    #[test]
    fn test_io_eof_maps_to_not_ready() {
        let err = io::Error::new(io::ErrorKind::UnexpectedEof, "early eof");
        assert_eq!(CallError::from_io("x:1", &err).tier(), BackoffTier::NotReady);
    }

    #[test]
    fn test_other_tier() {
        assert_eq!(CallError::Other("bad record".into()).tier(), BackoffTier::Other);
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let err = Wrapper(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"));
        assert_eq!(error_chain(&err), "error sending request: reset by peer");
    }
}
