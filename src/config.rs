//! Run context built once from the CLI and threaded through every stage.

use crate::cli::Cli;
use crate::error::{PipelineError, Result};
use crate::models::Credentials;
use crate::site::SiteProfile;
use chrono::{Datelike, Local, NaiveDate};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Outbound mail account and destination.
pub struct MailSettings {
    pub account: String,
    pub secret: SecretString,
    pub destination: String,
    pub smtp_host: String,
}

impl std::fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSettings")
            .field("account", &self.account)
            .field("destination", &self.destination)
            .field("smtp_host", &self.smtp_host)
            .finish_non_exhaustive()
    }
}

/// Waits used by the browser-driven stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Bound for one element wait.
    pub element_timeout: Duration,
    /// Interval between element polls inside a wait.
    pub poll_interval: Duration,
    /// Pause after each navigation for client-side rendering.
    pub settle: Duration,
    /// Pause after submitting the login form.
    pub login_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            settle: Duration::from_secs(3),
            login_settle: Duration::from_secs(5),
        }
    }
}

/// Direct-probe parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub year: i32,
    pub baseline: u32,
    pub count: usize,
}

/// Guesses made by the direct probe unless overridden.
pub const DEFAULT_PROBE_COUNT: usize = 10;

/// Probe parameters for a run on `today`.
///
/// The baseline is the ISO week number, kept in the same year as the issue
/// URL. Late-December days that fall in week 1 of the next ISO year use the
/// last week of the current year instead, and early-January days still in the
/// previous ISO year use week 1.
///
/// # Arguments
///
/// * `today` - Local calendar date of the run
///
/// # Returns
///
/// Year, baseline and [`DEFAULT_PROBE_COUNT`].
pub fn default_probe(today: NaiveDate) -> ProbeSettings {
    let year = today.year();
    let week = today.iso_week();
    let baseline = match week.year().cmp(&year) {
        std::cmp::Ordering::Equal => week.week(),
        std::cmp::Ordering::Greater => NaiveDate::from_ymd_opt(year, 12, 28)
            .map_or(52, |last| last.iso_week().week()),
        std::cmp::Ordering::Less => 1,
    };
    ProbeSettings {
        year,
        baseline,
        count: DEFAULT_PROBE_COUNT,
    }
}

/// Everything one run needs.
pub struct Settings {
    pub credentials: Credentials,
    pub mail: MailSettings,
    pub site: SiteProfile,
    pub probe: ProbeSettings,
    pub timings: Timings,
    pub output_dir: PathBuf,
    pub debug_dir: PathBuf,
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub keep_artifact: bool,
}

/// Names of the required environment values, in reporting order.
pub const REQUIRED_VARS: [&str; 5] = [
    "RESPEKT_LOGIN",
    "RESPEKT_PASSWORD",
    "GMAIL_EMAIL",
    "GMAIL_APP_PASSWORD",
    "KINDLE_EMAIL",
];

fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

impl Settings {
    /// Validate required inputs and build the run context.
    ///
    /// Fails with [`PipelineError::Configuration`] naming every missing value;
    /// nothing touches the network before this succeeds.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let values = [
            present(&cli.respekt_login),
            present(&cli.respekt_password),
            present(&cli.gmail_email),
            present(&cli.gmail_app_password),
            present(&cli.kindle_email),
        ];
        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .zip(values.iter())
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            error!(missing = %missing.join(", "), "Missing required environment values");
            return Err(PipelineError::Configuration { missing });
        }
        let [Some(login), Some(password), Some(account), Some(app_password), Some(destination)] =
            values
        else {
            return Err(PipelineError::Configuration {
                missing: REQUIRED_VARS.to_vec(),
            });
        };

        let defaults = default_probe(Local::now().date_naive());
        let probe = ProbeSettings {
            baseline: cli.baseline_issue.unwrap_or(defaults.baseline),
            count: cli.probe_count.max(1),
            ..defaults
        };
        let timings = Timings {
            element_timeout: Duration::from_secs(cli.element_timeout_secs),
            settle: Duration::from_millis(cli.settle_ms),
            login_settle: Duration::from_millis(cli.login_settle_ms),
            ..Timings::default()
        };

        info!(
            site = %cli.site_url,
            year = probe.year,
            baseline = probe.baseline,
            probe_count = probe.count,
            "All required environment values are set"
        );

        Ok(Self {
            credentials: Credentials {
                login,
                secret: SecretString::from(password),
            },
            mail: MailSettings {
                account,
                secret: SecretString::from(app_password),
                destination,
                smtp_host: cli.smtp_host.clone(),
            },
            site: SiteProfile::with_base_url(&cli.site_url),
            probe,
            timings,
            output_dir: cli.output_dir.clone(),
            debug_dir: cli.debug_dir.clone(),
            chrome_path: cli.chrome_path.clone(),
            headless: !cli.headful,
            keep_artifact: cli.keep_artifact,
        })
    }

    /// Settings for stage tests: short waits and temp directories.
    #[cfg(test)]
    pub fn for_tests(base_url: &str, dir: &std::path::Path) -> Self {
        Self {
            credentials: Credentials {
                login: "reader@example.com".into(),
                secret: SecretString::from("secret".to_string()),
            },
            mail: MailSettings {
                account: "sender@example.com".into(),
                secret: SecretString::from("app-password".to_string()),
                destination: "reader@kindle.com".into(),
                smtp_host: "localhost".into(),
            },
            site: SiteProfile::with_base_url(base_url),
            probe: ProbeSettings {
                year: 2025,
                baseline: 35,
                count: 10,
            },
            timings: Timings {
                element_timeout: Duration::from_millis(20),
                poll_interval: Duration::from_millis(5),
                settle: Duration::ZERO,
                login_settle: Duration::ZERO,
            },
            output_dir: dir.to_path_buf(),
            debug_dir: dir.to_path_buf(),
            chrome_path: None,
            headless: true,
            keep_artifact: false,
        }
    }
}
