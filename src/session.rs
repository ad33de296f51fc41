//! Browser session lifecycle wrapper
//!
//! Owns the launched browser, its CDP event-handler task, and the
//! ephemeral user-data directory. A session is closed exactly once on
//! every exit path; the handler task is aborted on drop so a failed path
//! never leaves the event loop running behind a dead browser.

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::browser_setup;
use crate::error::{SolveError, SolveResult};

pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserSession {
    /// Launch a persistent context with the extension loaded. The
    /// navigation timeout sizes the CDP request deadline so long page
    /// loads are bounded by the configured value, not the transport.
    pub async fn launch(
        extension_path: &Path,
        headless: bool,
        navigation_timeout_ms: u64,
    ) -> SolveResult<Self> {
        let (browser, handler, user_data_dir) =
            browser_setup::launch_browser(extension_path, headless, navigation_timeout_ms)
                .await
                .map_err(|e| SolveError::Engine(format!("{e:#}")))?;

        Ok(Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        })
    }

    /// Open a fresh page in the context. Navigation happens separately so
    /// its timeout only covers the page load itself.
    pub async fn new_page(&self) -> SolveResult<Page> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(page)
    }

    /// Shut the session down: close the browser, reap the process, stop
    /// the handler task, remove the user-data directory.
    ///
    /// The directory is removed only after `wait()` returns, otherwise
    /// Chrome may still hold file handles into the profile.
    pub async fn close(mut self) -> SolveResult<()> {
        info!("Closing browser...");
        self.browser.close().await?;
        self.browser
            .wait()
            .await
            .map_err(|e| SolveError::Engine(format!("failed to reap browser process: {e}")))?;
        self.handler.abort();
        self.cleanup_user_data_dir();
        Ok(())
    }

    /// Best-effort close for failure and interruption paths: errors are
    /// logged and swallowed so they never mask the failure that got us
    /// here.
    pub async fn close_quietly(self) {
        if let Err(e) = self.close().await {
            warn!("Error while closing browser during cleanup: {}", e);
        }
    }

    fn cleanup_user_data_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take()
            && let Err(e) = std::fs::remove_dir_all(&path)
        {
            warn!(
                "Failed to remove user data directory {}: {}. Manual cleanup may be required.",
                path.display(),
                e
            );
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Browser::drop kills the Chrome process if close() never ran.
        self.handler.abort();
        if let Some(path) = &self.user_data_dir {
            warn!(
                "BrowserSession dropped without close(); user data directory orphaned: {}",
                path.display()
            );
        }
    }
}
