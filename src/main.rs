//! # Respekt to Kindle
//!
//! Downloads the current issue of the Respekt weekly as EPUB and mails it to a
//! Kindle address.
//!
//! ## Usage
//!
//! ```sh
//! RESPEKT_LOGIN=... RESPEKT_PASSWORD=... GMAIL_EMAIL=... \
//! GMAIL_APP_PASSWORD=... KINDLE_EMAIL=... respekt_kindle -o ./out -d ./debug
//! ```
//!
//! ## Architecture
//!
//! One run is a fixed sequence of stages sharing a single headless browser:
//! 1. **Authentication**: log in through the site's form
//! 2. **Issue resolution**: probe issue URLs near the current week, then fall back to the archive
//! 3. **Download link**: find the EPUB control on the issue page
//! 4. **Transfer**: fetch the file over HTTP with the browser's cookies
//! 5. **Delivery**: send it by SMTP, then remove the local copy

use clap::Parser;
use std::fs::OpenOptions;
use std::future::Future;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod config;
mod delivery;
mod diagnostics;
mod error;
mod models;
mod pipeline;
mod site;
mod stages;
mod utils;

use browser::BrowserSession;
use browser::chrome::{ChromeSession, LaunchOptions};
use cli::Cli;
use config::Settings;
use delivery::SmtpDelivery;
use error::{BrowserError, PipelineError, Result};
use utils::ensure_writable_dir;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();
    init_tracing(&args.log_file);

    let start_time = std::time::Instant::now();
    info!("respekt_kindle starting up");
    debug!(output_dir = %args.output_dir.display(), debug_dir = %args.debug_dir.display(), "Parsed CLI arguments");

    let outcome = run(&args).await;
    let elapsed = start_time.elapsed();
    match outcome {
        Ok(()) => {
            info!(elapsed_secs = elapsed.as_secs_f64(), "EPUB delivered");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, elapsed_secs = elapsed.as_secs_f64(), "Run failed");
            ExitCode::FAILURE
        }
    }
}

/// Console output plus an append-only log file. A log file that cannot be
/// opened is reported on stderr and skipped.
fn init_tracing(log_file: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tfmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339());

    let file_layer = match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => Some(
            tfmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(Mutex::new(file)),
        ),
        Err(e) => {
            eprintln!("cannot open log file {}: {e}", log_file.display());
            None
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
}

async fn run(args: &Cli) -> Result<()> {
    run_with(args, |options| async move { ChromeSession::launch(&options).await }).await
}

/// Validate, prepare directories, then start a browser through `launch` and
/// drive the pipeline with it.
///
/// # Arguments
///
/// * `args` - Parsed command line
/// * `launch` - Starts the browser session; only called once configuration
///   and output directories have been validated
///
/// # Returns
///
/// `Ok(())` once the EPUB has been delivered, otherwise the first failure.
#[instrument(level = "info", skip_all)]
async fn run_with<S, L, F>(args: &Cli, launch: L) -> Result<()>
where
    S: BrowserSession,
    L: FnOnce(LaunchOptions) -> F,
    F: Future<Output = std::result::Result<S, BrowserError>>,
{
    let settings = Settings::from_cli(args)?;

    for dir in [&settings.output_dir, &settings.debug_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Directory is not writable (fix perms or choose a different path)"
            );
            return Err(PipelineError::Io(std::io::Error::other(e.to_string())));
        }
    }

    let session = launch(LaunchOptions {
        chrome_path: settings.chrome_path.clone(),
        headless: settings.headless,
        ..LaunchOptions::default()
    })
    .await?;

    let sink = SmtpDelivery::new(&settings.mail);
    let report = pipeline::execute(&settings, session, &sink).await?;
    info!(
        issue = %report.issue.url,
        source = ?report.issue.source,
        link = %report.link.url(),
        bytes = report.artifact.bytes,
        content_type = ?report.artifact.content_type,
        low_confidence = report.artifact.low_confidence,
        auth = ?report.auth,
        "Run summary"
    );
    Ok(())
}
