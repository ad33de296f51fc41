//! Session controller: drives the browser through the solve lifecycle
//!
//! Linear stage order: locate extension, launch, navigate, dwell, close.
//! Every failure is translated at the `solve` boundary into a boolean
//! result plus a logged diagnostic; a launched context is closed on every
//! exit path, including interruption during the dwell window.

use chromiumoxide::page::Page;
use std::future::Future;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

use crate::SolveConfig;
use crate::error::{SolveError, SolveResult};
use crate::extension;
use crate::session::BrowserSession;

/// Run the full solve lifecycle.
///
/// Returns `true` only when every stage completed; this does NOT mean the
/// challenge was solved, only that the session ran its course. All four
/// failure kinds are logged here and collapse to `false`.
pub async fn solve(config: &SolveConfig) -> bool {
    match run(config).await {
        Ok(()) => {
            info!("Session completed.");
            true
        }
        Err(SolveError::Interrupted) => {
            info!("Interrupted by user. Browser session closed.");
            false
        }
        Err(err) => {
            error!("{err}");
            false
        }
    }
}

async fn run(config: &SolveConfig) -> SolveResult<()> {
    let extension_path = extension::locate()?;
    info!("Using extension from: {}", extension_path.display());

    info!("Launching browser...");
    let session =
        BrowserSession::launch(&extension_path, config.headless, config.navigation_timeout_ms)
            .await?;

    // A context exists by now; it is released on every branch.
    let outcome = drive(&session, config).await;
    match close_mode(&outcome) {
        CloseMode::Strict => session.close().await?,
        CloseMode::BestEffort => session.close_quietly().await,
    }
    outcome
}

/// How to release the context for a given stage outcome. Every outcome
/// closes; failed and interrupted runs swallow close errors so they
/// cannot mask the original failure.
#[derive(Debug, PartialEq, Eq)]
enum CloseMode {
    Strict,
    BestEffort,
}

fn close_mode(outcome: &SolveResult<()>) -> CloseMode {
    match outcome {
        Ok(()) => CloseMode::Strict,
        Err(_) => CloseMode::BestEffort,
    }
}

/// Navigation and dwell stages, run inside a live session.
async fn drive(session: &BrowserSession, config: &SolveConfig) -> SolveResult<()> {
    let page = session.new_page().await?;

    info!("Navigating to: {}", config.url);
    let nav_timeout = Duration::from_millis(config.navigation_timeout_ms);
    time::timeout(nav_timeout, navigate(&page, &config.url))
        .await
        .map_err(|_| {
            SolveError::Engine(format!(
                "navigation timed out after {}ms for URL: {}",
                config.navigation_timeout_ms, config.url
            ))
        })??;

    let title = page.get_title().await?.unwrap_or_default();
    info!("Page loaded: {}", title);

    info!(
        "Waiting {} seconds for ReCAPTCHA solving...",
        config.wait_secs
    );
    info!("The NopeCHA extension will handle the ReCAPTCHA automatically.");
    dwell(
        Duration::from_secs(config.wait_secs),
        tokio::signal::ctrl_c(),
    )
    .await
}

async fn navigate(page: &Page, url: &str) -> SolveResult<()> {
    page.goto(url).await?;
    page.wait_for_navigation().await?;
    Ok(())
}

/// The fixed dwell window. Not a poll loop: the extension is trusted to
/// act on its own within the window. The interrupt future (Ctrl-C in
/// production) is the one cancellation point, mapped to `Interrupted`
/// so the caller still runs cleanup.
async fn dwell(
    window: Duration,
    interrupt: impl Future<Output = std::io::Result<()>>,
) -> SolveResult<()> {
    tokio::select! {
        _ = time::sleep(window) => Ok(()),
        res = interrupt => {
            res.map_err(|e| {
                SolveError::Unexpected(format!("failed to listen for ctrl-c: {e}"))
            })?;
            Err(SolveError::Interrupted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The test binary has no extension/ directory beside it, so the
    // locator must fail before anything touches a browser.
    #[tokio::test]
    async fn missing_extension_fails_before_any_launch() {
        let config = SolveConfig {
            url: "https://www.google.com/recaptcha/api2/demo".to_string(),
            wait_secs: 1,
            headless: true,
            navigation_timeout_ms: 1_000,
        };

        match run(&config).await {
            Err(SolveError::ExtensionNotFound(path)) => {
                assert!(path.ends_with("nopecha-extensionC"));
            }
            other => panic!("expected ExtensionNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dwell_elapses_when_no_interrupt_arrives() {
        let never = std::future::pending::<std::io::Result<()>>();
        assert!(dwell(Duration::from_millis(10), never).await.is_ok());
    }

    #[tokio::test]
    async fn zero_dwell_window_completes_immediately() {
        let never = std::future::pending::<std::io::Result<()>>();
        assert!(dwell(Duration::ZERO, never).await.is_ok());
    }

    #[tokio::test]
    async fn interruption_during_wait_maps_to_interrupted() {
        let result = dwell(Duration::from_secs(60), async { Ok(()) }).await;
        assert!(matches!(result, Err(SolveError::Interrupted)));
    }

    #[tokio::test]
    async fn failed_interrupt_listener_is_unexpected() {
        let broken = async { Err(std::io::Error::other("no signal handler")) };
        let result = dwell(Duration::from_secs(60), broken).await;
        assert!(matches!(result, Err(SolveError::Unexpected(_))));
    }

    #[test]
    fn failed_stages_still_release_the_context() {
        let nav_failed: SolveResult<()> = Err(SolveError::Engine("navigation timed out".into()));
        assert_eq!(close_mode(&nav_failed), CloseMode::BestEffort);
        assert_eq!(
            close_mode(&Err(SolveError::Interrupted)),
            CloseMode::BestEffort
        );
    }

    #[test]
    fn clean_runs_close_strictly() {
        assert_eq!(close_mode(&Ok(())), CloseMode::Strict);
    }
}
