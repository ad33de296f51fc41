//! Automated reCAPTCHA v2 solving via the NopeCHA browser extension
//!
//! Launches Chromium with the extension pre-loaded, navigates to a target
//! page, and holds the session open long enough for the extension to act.
//! The crate never verifies that the challenge was solved; success means
//! the session lifecycle completed without error.

mod browser_setup;
mod error;
mod extension;
mod session;
mod solver;

pub use browser_setup::extension_args;
pub use error::{SolveError, SolveResult};
pub use extension::{EXTENSION_SUBDIR, locate as locate_extension};
pub use session::BrowserSession;
pub use solver::solve;

/// Default target: Google's public reCAPTCHA v2 demo page.
pub const DEFAULT_URL: &str = "https://www.google.com/recaptcha/api2/demo";

/// Default dwell window in seconds.
pub const DEFAULT_WAIT_SECS: u64 = 360;

/// Headless is off by default; headless Chromium is unreliable for
/// reCAPTCHA challenges.
pub const DEFAULT_HEADLESS: bool = false;

/// Default page-navigation timeout in milliseconds.
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 90_000;

/// Configuration for one solve invocation. Immutable once built; each
/// invocation owns its own copy.
#[derive(Debug, Clone)]
pub struct SolveConfig {
    /// Page to visit.
    pub url: String,

    /// Seconds to hold the session open after navigation so the
    /// extension can work on the challenge.
    pub wait_secs: u64,

    /// Run the browser without a visible window.
    pub headless: bool,

    /// Maximum wall-clock time allowed for the page load, in
    /// milliseconds.
    pub navigation_timeout_ms: u64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            wait_secs: DEFAULT_WAIT_SECS,
            headless: DEFAULT_HEADLESS,
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = SolveConfig::default();
        assert_eq!(config.url, "https://www.google.com/recaptcha/api2/demo");
        assert_eq!(config.wait_secs, 360);
        assert!(!config.headless);
        assert_eq!(config.navigation_timeout_ms, 90_000);
    }
}
