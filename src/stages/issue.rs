//! Current-issue resolution.
//!
//! The direct probe guesses `{site}/tydenik/{year}/{number}` for numbers
//! fanning out from a baseline and takes the first page whose title looks like
//! a real issue. It is a nearest-to-baseline search, not an exhaustive one.
//! When every guess fails, the year's archive page is scanned once and its first
//! issue link in document order is taken as the most recent issue.

use super::navigate;
use crate::browser::{BrowserSession, Locator};
use crate::config::Settings;
use crate::diagnostics::DiagnosticCapture;
use crate::error::{PipelineError, Result};
use crate::models::{IssueCandidate, IssueSource, ResolvedIssue};
use crate::site::SiteProfile;
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Numbers to probe: the baseline, then +1, -1, +2, -2, ... until `count`.
///
/// Numbers below 1 are skipped; the sequence is filled from above instead.
pub fn probe_sequence(baseline: u32, count: usize) -> Vec<u32> {
    let mut sequence = Vec::with_capacity(count);
    if count == 0 {
        return sequence;
    }
    if baseline >= 1 {
        sequence.push(baseline);
    }
    let mut step = 1u32;
    while sequence.len() < count {
        let Some(above) = baseline.checked_add(step) else {
            break;
        };
        sequence.push(above);
        if sequence.len() < count && baseline > step {
            sequence.push(baseline - step);
        }
        step += 1;
    }
    sequence
}

/// A title denotes a real issue when it carries the brand token, has no error
/// marker and is not the bare brand token of an empty placeholder page.
pub fn is_valid_issue_title(title: &str, site: &SiteProfile) -> bool {
    let title = title.trim();
    title.contains(site.brand_token)
        && !title.contains(site.error_marker)
        && title != site.brand_token
}

/// Find the current issue URL.
///
/// # Arguments
///
/// * `session` - Logged-in browser session
/// * `settings` - Run context; supplies year, baseline and probe count
/// * `diagnostics` - Where page snapshots go on failure
///
/// # Returns
///
/// The issue URL and whether the probe or the archive found it. Fails with
/// [`PipelineError::IssueNotFound`] after both strategies are exhausted;
/// diagnostics are captured first.
#[instrument(level = "info", skip_all, fields(year = settings.probe.year, baseline = settings.probe.baseline))]
pub async fn resolve_issue<S: BrowserSession>(
    session: &S,
    settings: &Settings,
    diagnostics: &DiagnosticCapture,
) -> Result<ResolvedIssue> {
    info!("Looking for the current issue");

    if let Some(candidate) = direct_probe(session, settings).await {
        info!(number = candidate.number, url = %candidate.url, "Issue found by direct probe");
        return Ok(ResolvedIssue {
            url: candidate.url.clone(),
            source: IssueSource::DirectProbe(candidate),
        });
    }

    warn!("No direct probe matched, trying the archive");
    if let Some(url) = archive_scan(session, settings).await {
        info!(%url, "Issue found in archive");
        return Ok(ResolvedIssue {
            url,
            source: IssueSource::Archive,
        });
    }

    error!("Neither direct probe nor archive found an issue");
    diagnostics.capture(session, "find_issue_error").await;
    Err(PipelineError::IssueNotFound)
}

/// Probe candidates in order and stop at the first valid one.
async fn direct_probe<S: BrowserSession>(session: &S, settings: &Settings) -> Option<IssueCandidate> {
    let probe = settings.probe;
    let site = &settings.site;

    for number in probe_sequence(probe.baseline, probe.count) {
        let url = site.issue_url(probe.year, number);
        info!(number, %url, "Probing issue");

        if let Err(e) = navigate(session, &url, settings.timings.settle).await {
            warn!(number, error = %e, "Probe navigation failed");
            continue;
        }
        let title = match session.title().await {
            Ok(title) => title,
            Err(e) => {
                warn!(number, error = %e, "Could not read probe title");
                continue;
            }
        };
        let candidate = IssueCandidate {
            year: probe.year,
            number,
            valid: is_valid_issue_title(&title, site),
            url,
        };
        info!(number, %title, valid = candidate.valid, "Probe result");
        if candidate.valid {
            return Some(candidate);
        }
    }
    None
}

/// First issue link on the year's archive page, year-scoped links first.
async fn archive_scan<S: BrowserSession>(session: &S, settings: &Settings) -> Option<String> {
    let site = &settings.site;
    let year = settings.probe.year;
    let archive_url = site.archive_url(year);

    if let Err(e) = navigate(session, &archive_url, settings.timings.settle).await {
        error!(url = %archive_url, error = %e, "Archive navigation failed");
        return None;
    }
    if let Ok(title) = session.title().await {
        info!(%title, "Archive loaded");
    }
    let base = session
        .current_url()
        .await
        .ok()
        .and_then(|u| Url::parse(&u).ok())
        .or_else(|| Url::parse(&archive_url).ok());

    for scope in [Some(year), None] {
        let locator = Locator::css(format!("a[href*='{}']", site.issue_path_fragment(scope)));
        let Some(pattern) = issue_link_pattern(site, scope) else {
            continue;
        };
        let elements = match session.find_all(&locator).await {
            Ok(elements) => elements,
            Err(e) => {
                debug!(%locator, error = %e, "Archive locator failed");
                continue;
            }
        };
        let href = elements
            .into_iter()
            .filter_map(|el| el.href)
            .find(|href| pattern.is_match(href));
        if let Some(href) = href {
            return Some(absolutize(base.as_ref(), &href));
        }
        debug!(%locator, "No issue link in archive");
    }
    None
}

/// `/{section}/{year}/{number}` for a given year, or any four-digit year.
fn issue_link_pattern(site: &SiteProfile, year: Option<i32>) -> Option<Regex> {
    let year = year.map_or_else(|| r"\d{4}".to_string(), |y| y.to_string());
    Regex::new(&format!(r"/{}/{}/\d+", regex::escape(site.issue_section), year)).ok()
}

fn absolutize(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(String::from)
        .unwrap_or_else(|| href.to_string())
}
