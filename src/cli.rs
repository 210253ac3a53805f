//! Command-line interface definitions for the Respekt downloader.
//!
//! Every argument can also come from the environment (or a `.env` file loaded
//! at startup). The five account values are optional at this layer so that
//! [`Settings::from_cli`](crate::config::Settings::from_cli) can report all of
//! the missing ones together.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Respekt downloader.
///
/// # Examples
///
/// ```sh
/// # Everything from the environment
/// respekt_kindle
///
/// # Pin the probe baseline and keep the EPUB after sending
/// respekt_kindle --baseline-issue 35 --keep-artifact -o ./downloads
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Respekt account login (e-mail)
    #[arg(long, env = "RESPEKT_LOGIN", hide_env_values = true)]
    pub respekt_login: Option<String>,

    /// Respekt account password
    #[arg(long, env = "RESPEKT_PASSWORD", hide_env_values = true)]
    pub respekt_password: Option<String>,

    /// Sending Gmail address
    #[arg(long, env = "GMAIL_EMAIL", hide_env_values = true)]
    pub gmail_email: Option<String>,

    /// Gmail app password
    #[arg(long, env = "GMAIL_APP_PASSWORD", hide_env_values = true)]
    pub gmail_app_password: Option<String>,

    /// Kindle delivery address
    #[arg(long, env = "KINDLE_EMAIL", hide_env_values = true)]
    pub kindle_email: Option<String>,

    /// Site origin
    #[arg(long, env = "RESPEKT_SITE_URL", default_value = "https://www.respekt.cz")]
    pub site_url: String,

    /// Issue number the direct probe starts from (defaults to the ISO week)
    #[arg(long, env = "RESPEKT_BASELINE_ISSUE")]
    pub baseline_issue: Option<u32>,

    /// Number of issue numbers the direct probe tries
    #[arg(long, default_value_t = 10)]
    pub probe_count: usize,

    /// Directory the EPUB is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Directory for debug screenshots and page dumps
    #[arg(short, long, default_value = ".")]
    pub debug_dir: PathBuf,

    /// Log file written alongside console output
    #[arg(long, default_value = "respekt.log")]
    pub log_file: PathBuf,

    /// Bounded wait for a single element, in seconds
    #[arg(long, default_value_t = 10)]
    pub element_timeout_secs: u64,

    /// Pause after each navigation, in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub settle_ms: u64,

    /// Pause after submitting the login form, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub login_settle_ms: u64,

    /// SMTP relay (STARTTLS on 587)
    #[arg(long, env = "SMTP_HOST", default_value = "smtp.gmail.com")]
    pub smtp_host: String,

    /// Chrome/Chromium executable
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Keep the EPUB on disk after delivery
    #[arg(long)]
    pub keep_artifact: bool,
}
