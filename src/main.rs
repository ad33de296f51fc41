//! Command-line entry point for the reCAPTCHA v2 solver.

use clap::Parser;
use recaptcha_solver::{
    DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_URL, DEFAULT_WAIT_SECS, SolveConfig, solve,
};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Solve reCAPTCHA v2 using the NopeCHA extension.
///
/// Expects the unpacked extension at `extension/nopecha-extensionC` next
/// to this binary.
#[derive(Parser, Debug)]
#[command(name = "recaptcha-solver", version, about)]
struct Cli {
    /// URL to visit
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Time to wait in seconds for the extension to solve the challenge
    #[arg(long = "wait-time", default_value_t = DEFAULT_WAIT_SECS)]
    wait_time: u64,

    /// Run the browser in headless mode (not recommended for reCAPTCHA)
    #[arg(long)]
    headless: bool,

    /// Page navigation timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_NAVIGATION_TIMEOUT_MS)]
    timeout: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        // warnings and errors to stderr, progress lines to stdout
        .with_writer(std::io::stderr.with_max_level(Level::WARN).or_else(std::io::stdout))
        .init();

    let cli = Cli::parse();
    let config = SolveConfig {
        url: cli.url,
        wait_secs: cli.wait_time,
        headless: cli.headless,
        navigation_timeout_ms: cli.timeout,
    };

    let success = solve(&config).await;
    std::process::exit(if success { 0 } else { 1 });
}
