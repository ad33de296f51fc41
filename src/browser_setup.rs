//! Chromium discovery and persistent-context launch
//!
//! Finds a usable Chromium, falls back to downloading a managed build,
//! and launches it with the solving extension loaded and automation
//! signaling disabled.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

/// RAII guard for the user-data directory.
///
/// Removes the directory on drop unless consumed by `into_path()`, so a
/// launch failure never leaves a stale profile behind.
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create user data directory")?;
        Ok(Self { path, keep: false })
    }

    /// Consume the guard and hand the path to the session, which now owns
    /// cleanup.
    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to clean up temp dir {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Find a Chromium executable on the system.
///
/// `CHROMIUM_PATH` overrides everything. On Linux, Chromium candidates come
/// before branded Chrome: Google Chrome refuses `--load-extension`
/// (chrome/browser/extensions/extension_service.cc), and loading the
/// unpacked solver extension is the whole point here.
pub async fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    let candidates: Vec<PathBuf> = if cfg!(target_os = "windows") {
        let mut paths = vec![
            PathBuf::from(r"C:\Program Files\Chromium\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ];
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            paths.push(PathBuf::from(format!(
                r"{local}\Google\Chrome\Application\chrome.exe"
            )));
        }
        paths
    } else if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
            PathBuf::from("/opt/homebrew/bin/chromium"),
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/snap/bin/chromium"),
            PathBuf::from("/usr/local/bin/chromium"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/google-chrome-stable"),
        ]
    };

    for path in candidates {
        if path.exists() {
            info!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            let output = Command::new("which").arg(cmd).output();
            if let Ok(output) = output
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    let path = PathBuf::from(path_str);
                    info!("Found browser using 'which': {}", path.display());
                    return Ok(path);
                }
            }
        }
    }

    Err(anyhow::anyhow!("Chromium executable not found"))
}

/// Download a managed Chromium build into the cache directory and return
/// the executable path. Used when no system browser is found.
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("No system browser found, downloading managed Chromium...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("recaptcha-solver/chromium");
    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!(
        "Downloaded Chromium to: {}",
        revision_info.folder_path.display()
    );
    Ok(revision_info.executable_path)
}

/// Launch flags for a context that must run the solving extension and look
/// like a regular browser. Both extension flags reference the same
/// resolved path; Chromium ignores `--load-extension` for paths outside
/// the `--disable-extensions-except` allowlist.
pub fn extension_args(extension_path: &Path) -> Vec<String> {
    vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-dev-shm-usage".to_string(),
        format!("--disable-extensions-except={}", extension_path.display()),
        format!("--load-extension={}", extension_path.display()),
    ]
}

/// Launch a persistent browser context with the extension loaded.
///
/// The context uses an ephemeral per-pid user-data directory, so repeated
/// runs never contend on a profile lock. Returns the browser, its CDP
/// event-handler task, and the user-data directory the caller must remove
/// after the browser has shut down.
pub async fn launch_browser(
    extension_path: &Path,
    headless: bool,
    navigation_timeout_ms: u64,
) -> Result<(Browser, JoinHandle<()>, PathBuf)> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    let user_data_dir =
        std::env::temp_dir().join(format!("recaptcha_solver_{}", std::process::id()));
    let temp_guard = TempDirGuard::new(user_data_dir)?;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(request_timeout(navigation_timeout_ms))
        .user_data_dir(temp_guard.path.clone())
        .chrome_executable(chrome_path)
        .args(extension_args(extension_path))
        .arg("--no-first-run")
        .arg("--no-default-browser-check");

    if headless {
        // Extensions only work in the new headless implementation.
        config_builder = config_builder.headless_mode(HeadlessMode::New);
    } else {
        config_builder = config_builder.with_head();
    }

    // setuid sandboxing does not work inside containers
    if should_disable_sandbox() {
        info!("Detected containerized environment, disabling sandbox");
        config_builder = config_builder
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");
    }

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                let error_msg = e.to_string();
                // Chrome emits CDP events chromiumoxide does not model;
                // those deserialization failures are harmless.
                // https://github.com/mattsse/chromiumoxide/issues/167
                let is_benign_serialization_error = error_msg
                    .contains("data did not match any variant of untagged enum Message")
                    || error_msg.contains("Failed to deserialize WS response");

                if !is_benign_serialization_error {
                    error!("Browser handler error: {:?}", e);
                } else {
                    trace!("Suppressed benign CDP serialization error: {}", error_msg);
                }
            }
        }
        trace!("Browser handler task completed");
    });

    let user_data_dir = temp_guard.into_path();
    Ok((browser, handler_task, user_data_dir))
}

/// Floor for the CDP request timeout.
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Headroom on top of the navigation window so the transport deadline
/// never fires before the navigation timeout does.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// CDP request timeout sized to the configured navigation window.
///
/// chromiumoxide enforces this per CDP command; if it were smaller than
/// the navigation timeout, a long `goto` would be cut short by the
/// transport deadline instead of the configured bound.
pub fn request_timeout(navigation_timeout_ms: u64) -> Duration {
    MIN_REQUEST_TIMEOUT.max(Duration::from_millis(navigation_timeout_ms) + REQUEST_TIMEOUT_MARGIN)
}

fn should_disable_sandbox() -> bool {
    std::path::Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_extension_flags_reference_the_same_path() {
        let args = extension_args(Path::new("/opt/app/extension/nopecha-extensionC"));

        let except = args
            .iter()
            .find_map(|a| a.strip_prefix("--disable-extensions-except="))
            .expect("allowlist flag present");
        let load = args
            .iter()
            .find_map(|a| a.strip_prefix("--load-extension="))
            .expect("load flag present");
        assert_eq!(except, load);
        assert_eq!(except, "/opt/app/extension/nopecha-extensionC");
    }

    #[test]
    fn anti_detection_flags_are_present() {
        let args = extension_args(Path::new("/tmp/ext"));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&"--disable-dev-shm-usage".to_string()));
    }

    #[test]
    fn extensions_are_not_globally_disabled() {
        let args = extension_args(Path::new("/tmp/ext"));
        assert!(!args.iter().any(|a| a == "--disable-extensions"));
    }

    #[test]
    fn request_timeout_covers_long_navigation_windows() {
        // a 300s navigation timeout must not be capped by the transport
        assert_eq!(request_timeout(300_000), Duration::from_secs(310));
    }

    #[test]
    fn request_timeout_never_drops_below_the_floor() {
        assert_eq!(request_timeout(0), Duration::from_secs(120));
        assert_eq!(request_timeout(90_000), Duration::from_secs(120));
    }
}
