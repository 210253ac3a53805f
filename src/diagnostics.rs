//! Best-effort page snapshots taken on failure.
//!
//! One [`DiagnosticCapture`] is built per run and handed to every stage. Capture
//! never fails the caller: problems are logged and swallowed so the original
//! error is what propagates.

use crate::browser::BrowserSession;
use crate::utils::truncate_for_log;
use itertools::Itertools;
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Characters of markup echoed to the log.
const MARKUP_PREVIEW: usize = 1500;

/// Maximum outbound links listed when a download link is missing.
const MAX_LISTED_LINKS: usize = 50;

/// Writes `debug_<name>.png` and `debug_<name>.html` into a directory.
#[derive(Debug, Clone)]
pub struct DiagnosticCapture {
    dir: PathBuf,
}

impl DiagnosticCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Screenshot plus markup dump of the current page.
    #[instrument(level = "info", skip_all, fields(%name))]
    pub async fn capture<S: BrowserSession>(&self, session: &S, name: &str) {
        let png = self.dir.join(format!("debug_{name}.png"));
        match session.screenshot().await {
            Ok(bytes) => match fs::write(&png, bytes).await {
                Ok(()) => info!(path = %png.display(), "Screenshot saved"),
                Err(e) => error!(path = %png.display(), error = %e, "Failed to write screenshot"),
            },
            Err(e) => error!(error = %e, "Failed to take screenshot"),
        }

        let html_path = self.dir.join(format!("debug_{name}.html"));
        match session.page_source().await {
            Ok(html) => {
                if let Err(e) = fs::write(&html_path, &html).await {
                    error!(path = %html_path.display(), error = %e, "Failed to write page source");
                } else {
                    info!(path = %html_path.display(), "Page source saved");
                }
                info!(preview = %truncate_for_log(&html, MARKUP_PREVIEW), "Page source preview");
            }
            Err(e) => error!(error = %e, "Failed to read page source"),
        }
    }

    /// Log the distinct link targets of the current page.
    pub async fn list_links<S: BrowserSession>(&self, session: &S) -> Vec<String> {
        match session.page_source().await {
            Ok(html) => {
                let links = outbound_links(&html);
                info!(count = links.len(), "Links on page");
                for link in links.iter().take(MAX_LISTED_LINKS) {
                    info!(%link, "Page link");
                }
                links
            }
            Err(e) => {
                error!(error = %e, "Failed to enumerate page links");
                Vec::new()
            }
        }
    }
}

/// Distinct non-empty `href` values in document order.
pub fn outbound_links(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    Html::parse_document(html)
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .unique()
        .map(str::to_string)
        .collect()
}
