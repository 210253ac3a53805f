//! Authenticated binary transfer outside the browser.
//!
//! The HTTP client is built from a [`CookieSnapshot`] taken once from the
//! browser; it holds no reference back to the session.

use crate::error::{PipelineError, Result};
use crate::models::{Artifact, CookieSnapshot};
use crate::site::{ACCEPT, MIN_ARTIFACT_BYTES, USER_AGENT};
use crate::utils::truncate_for_log;
use chrono::Local;
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, instrument, warn};

/// Bytes of an undersized or failed response echoed to the log.
const BODY_PREVIEW: usize = 500;

/// HTTP client seeded with the browser's cookies for one download.
#[derive(Debug)]
pub struct ArtifactFetcher {
    client: Client,
    min_bytes: u64,
}

impl ArtifactFetcher {
    /// Build a client for `download_url` carrying `cookies`, the browser user
    /// agent, and `referer`.
    ///
    /// # Arguments
    ///
    /// * `cookies` - Snapshot taken from the browser; consumed
    /// * `download_url` - Absolute URL the cookies are bound to
    /// * `referer` - The issue page
    ///
    /// # Returns
    ///
    /// The fetcher, or [`PipelineError::DownloadLinkNotFound`] when
    /// `download_url` is not absolute.
    pub fn new(cookies: CookieSnapshot, download_url: &str, referer: &str) -> Result<Self> {
        let target = Url::parse(download_url).map_err(|e| {
            error!(url = %download_url, error = %e, "Download URL is not absolute");
            PipelineError::DownloadLinkNotFound {
                page: referer.to_string(),
            }
        })?;

        let jar = Jar::default();
        for cookie in cookies.iter() {
            let pair = format!("{}={}", cookie.name, cookie.value);
            jar.add_cookie_str(&pair, &target);
            if let Some((header, origin)) = scoped_cookie(&pair, &cookie.domain, &cookie.path) {
                jar.add_cookie_str(&header, &origin);
            }
        }
        info!(count = cookies.len(), "Seeded HTTP client with browser cookies");

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        match HeaderValue::from_str(referer) {
            Ok(value) => {
                headers.insert(header::REFERER, value);
            }
            Err(e) => warn!(%referer, error = %e, "Referer not usable as header, omitting"),
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_provider(Arc::new(jar))
            .build()?;

        Ok(Self {
            client,
            min_bytes: MIN_ARTIFACT_BYTES,
        })
    }

    /// Download `url` into `dest`.
    ///
    /// Non-success status fails with [`PipelineError::Transfer`] and writes
    /// nothing. A body under the floor is still written and returned, with
    /// [`Artifact::low_confidence`] set.
    #[instrument(level = "info", skip_all, fields(%url, dest = %dest.display()))]
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<Artifact> {
        info!("Downloading EPUB");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                status = status.as_u16(),
                body = %truncate_for_log(&body, BODY_PREVIEW),
                "Download failed"
            );
            return Err(PipelineError::Transfer {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        let bytes = body.len() as u64;
        info!(bytes, content_type = ?content_type, "Downloaded");

        let low_confidence = bytes < self.min_bytes;
        if low_confidence {
            warn!(
                bytes,
                min = self.min_bytes,
                body = %truncate_for_log(&String::from_utf8_lossy(&body), BODY_PREVIEW),
                "Suspiciously small artifact, delivering anyway"
            );
        }

        fs::write(dest, &body).await?;
        info!(bytes, "EPUB saved");

        Ok(Artifact {
            path: dest.to_path_buf(),
            bytes,
            content_type,
            created_at: Local::now(),
            low_confidence,
        })
    }
}

/// The cookie bound to the domain the browser recorded for it, so redirects
/// off the download host stay authenticated.
///
/// A leading dot marks a domain cookie, which also covers subdomains; anything
/// else is host-only.
fn scoped_cookie(pair: &str, domain: &str, path: &str) -> Option<(String, Url)> {
    let host = domain.trim_start_matches('.');
    if host.is_empty() {
        return None;
    }
    let path = if path.starts_with('/') { path } else { "/" };
    let origin = Url::parse(&format!("https://{host}{path}")).ok()?;
    let header = if domain.starts_with('.') {
        format!("{pair}; Domain={host}; Path={path}")
    } else {
        format!("{pair}; Path={path}")
    };
    Some((header, origin))
}
