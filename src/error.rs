//! Failure taxonomy for the solve operation
//!
//! A closed set of failure kinds, checked in priority order by the
//! controller: missing extension, engine failure, interruption, and a
//! single catch-all for everything else. Nothing propagates past the
//! `solve` boundary; every variant is translated into a diagnostic line
//! and a failed result.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolveError {
    /// The unpacked extension bundle is not where it must be. Fatal
    /// precondition failure: no browser resources exist yet.
    #[error(
        "extension directory not found at: {}. \
         Place the unpacked NopeCHA extension in the 'extension' folder.",
        .0.display()
    )]
    ExtensionNotFound(PathBuf),

    /// The browser engine failed to launch, navigate within its timeout,
    /// or close. If a context was opened, cleanup is still attempted.
    #[error("browser engine error: {0}")]
    Engine(String),

    /// Ctrl-C arrived during the dwell window. Treated as a request to
    /// tear down and exit, not as an error to report loudly.
    #[error("interrupted while waiting for the extension to act")]
    Interrupted,

    /// Anything the other variants did not anticipate.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<anyhow::Error> for SolveError {
    fn from(err: anyhow::Error) -> Self {
        SolveError::Unexpected(format!("{err:#}"))
    }
}

impl From<chromiumoxide::error::CdpError> for SolveError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        SolveError::Engine(err.to_string())
    }
}

pub type SolveResult<T> = Result<T, SolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_not_found_reports_attempted_path() {
        let err = SolveError::ExtensionNotFound(PathBuf::from("/opt/app/extension/nopecha-extensionC"));
        let msg = err.to_string();
        assert!(msg.contains("/opt/app/extension/nopecha-extensionC"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn anyhow_errors_collapse_into_unexpected() {
        let err: SolveError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, SolveError::Unexpected(ref m) if m.contains("boom")));
    }
}
