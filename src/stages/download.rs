//! Download-link extraction from the issue page.
//!
//! Strategies, in order: API-path anchors/buttons, download label text, generic
//! `.epub` hrefs. The first element of the first matching strategy is used.
//! That element yields the link through its `href`, else through an issue id
//! parsed out of its `onclick`, else by clicking it and accepting the new page
//! URL if it points at the download API.

use super::{Strategy, first_hit, navigate};
use crate::browser::{BrowserSession, ElementInfo, Locator};
use crate::config::Settings;
use crate::diagnostics::DiagnosticCapture;
use crate::error::{PipelineError, Result};
use crate::models::{DownloadLink, ResolvedIssue};
use crate::site::SiteProfile;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use url::Url;

/// `[/api/]<endpoint>?issueId=<token>` inside an inline action.
static ACTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:/api/)?(?P<endpoint>[A-Za-z][A-Za-z0-9_]*)\?issueId=(?P<token>[A-Za-z0-9-]+)")
        .expect("action pattern is a valid regex")
});

/// Button/link labels, Czech and English, in the casings the site has used.
const LABELS: [&str; 5] = [
    "Stáhnout epub",
    "Stáhnout EPUB",
    "Download epub",
    "Download EPUB",
    "EPUB",
];

/// The download cascade for `site`, in precedence order.
pub fn download_strategies(site: &SiteProfile) -> Vec<Strategy> {
    let api_path = site.download_api_path();
    let endpoint = site.download_endpoint;
    let labels = LABELS
        .iter()
        .flat_map(|label| [Locator::text("button", *label), Locator::text("a", *label)])
        .collect();
    vec![
        Strategy::new(
            "api-path",
            vec![
                Locator::css(format!("a[href*='{api_path}']")),
                Locator::css(format!("button[onclick*='{api_path}']")),
                Locator::css(format!("[onclick*='{endpoint}']")),
            ],
        ),
        Strategy::new("label-text", labels),
        Strategy::new(
            "epub-suffix",
            vec![
                Locator::css("a[href$='.epub']"),
                Locator::css("a[href$='.EPUB']"),
            ],
        ),
    ]
}

/// Rebuild an absolute download URL from an inline action attribute.
///
/// `downloadEPub?issueId=abc123` becomes `{site}/api/downloadEPub?issueId=abc123`.
pub fn parse_action(action: &str, site: &SiteProfile) -> Option<String> {
    let caps = ACTION_PATTERN.captures(action)?;
    Some(site.api_url(&caps["endpoint"], &caps["token"]))
}

/// `href` values that do not point anywhere.
fn usable_href(element: &ElementInfo) -> Option<&str> {
    element
        .href
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty() && *h != "#" && !h.starts_with("javascript:"))
}

/// Find the download target on the issue page.
///
/// # Arguments
///
/// * `session` - Logged-in browser session
/// * `settings` - Run context; supplies the site profile and settle delay
/// * `diagnostics` - Where page snapshots go on failure
/// * `issue` - The resolved issue whose page is searched
///
/// # Returns
///
/// The first [`DownloadLink`] the cascade yields. Fails with
/// [`PipelineError::DownloadLinkNotFound`] after listing the page's links, or
/// with [`PipelineError::Browser`] when the page cannot be driven. A snapshot
/// is captured on both paths before returning.
#[instrument(level = "info", skip_all, fields(issue = %issue.url))]
pub async fn extract_download_link<S: BrowserSession>(
    session: &S,
    settings: &Settings,
    diagnostics: &DiagnosticCapture,
    issue: &ResolvedIssue,
) -> Result<DownloadLink> {
    match locate_link(session, settings, diagnostics, issue).await {
        Err(e @ PipelineError::Browser(_)) => {
            error!(error = %e, "Issue page could not be driven");
            diagnostics.capture(session, "epub_download_error").await;
            Err(e)
        }
        other => other,
    }
}

async fn locate_link<S: BrowserSession>(
    session: &S,
    settings: &Settings,
    diagnostics: &DiagnosticCapture,
    issue: &ResolvedIssue,
) -> Result<DownloadLink> {
    let site = &settings.site;
    info!("Opening issue page");
    navigate(session, &issue.url, settings.timings.settle).await?;
    info!(title = %session.title().await?, "Issue page loaded");

    let Some(hit) = first_hit(session, &download_strategies(site)).await else {
        error!("No download element on issue page");
        return not_found(session, diagnostics, issue, "issue_no_epub_link").await;
    };
    info!(strategy = hit.strategy, text = %hit.element.text, "Download element found");

    if let Some(href) = usable_href(&hit.element) {
        let page_url = session.current_url().await?;
        let url = Url::parse(&page_url)
            .and_then(|base| base.join(href))
            .map(String::from)
            .unwrap_or_else(|_| href.to_string());
        info!(%url, "Download URL from href");
        return Ok(DownloadLink::Href(url));
    }

    if let Some(url) = hit
        .element
        .onclick
        .as_deref()
        .and_then(|action| parse_action(action, site))
    {
        info!(%url, "Download URL rebuilt from onclick");
        return Ok(DownloadLink::Reconstructed(url));
    }

    warn!("No href or issue id on download element, activating it");
    let before = session.current_url().await?;
    session.click(&hit.locator, 0).await?;
    if !settings.timings.settle.is_zero() {
        sleep(settings.timings.settle).await;
    }
    let after = session.current_url().await?;
    if after != before && after.contains(&site.download_api_path()) {
        info!(url = %after, "Download URL from activation");
        return Ok(DownloadLink::Activated(after));
    }

    error!(%before, %after, "Activation did not lead to the download API");
    not_found(session, diagnostics, issue, "issue_epub_activation").await
}

async fn not_found<S: BrowserSession, T>(
    session: &S,
    diagnostics: &DiagnosticCapture,
    issue: &ResolvedIssue,
    name: &str,
) -> Result<T> {
    diagnostics.list_links(session).await;
    diagnostics.capture(session, name).await;
    Err(PipelineError::DownloadLinkNotFound {
        page: issue.url.clone(),
    })
}
