//! Data carried between pipeline stages.
//!
//! - [`Credentials`]: site login, owned by the authentication stage for one run
//! - [`IssueCandidate`] / [`ResolvedIssue`]: output of issue resolution
//! - [`DownloadLink`]: the retrieval target found on the issue page
//! - [`CookieSnapshot`]: one-way copy of the browser cookies for the HTTP client
//! - [`Artifact`]: the downloaded EPUB on disk

use chrono::{DateTime, Local};
use secrecy::SecretString;
use std::fmt;
use std::path::PathBuf;

/// Site login identifier and secret.
///
/// Only presence is validated; the secret never appears in `Debug` output.
pub struct Credentials {
    pub login: String,
    pub secret: SecretString,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("secret", &"[redacted]")
            .finish()
    }
}

/// One speculative guess made by the direct probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCandidate {
    pub year: i32,
    pub number: u32,
    pub url: String,
    /// Whether the page title passed the validity check.
    pub valid: bool,
}

/// How the current issue was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueSource {
    DirectProbe(IssueCandidate),
    Archive,
}

/// Canonical URL of the current issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIssue {
    pub url: String,
    pub source: IssueSource,
}

/// Resolved retrieval target. Exactly one per successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadLink {
    /// The matched element carried an `href`.
    Href(String),
    /// Rebuilt from an identifier parsed out of an inline `onclick`.
    Reconstructed(String),
    /// URL the page moved to after activating the element.
    Activated(String),
}

impl DownloadLink {
    pub fn url(&self) -> &str {
        match self {
            DownloadLink::Href(url)
            | DownloadLink::Reconstructed(url)
            | DownloadLink::Activated(url) => url,
        }
    }
}

/// A single browser cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

/// Immutable copy of the browser's cookie set taken after link extraction.
///
/// Handed by value to the artifact client; nothing refers back to the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSnapshot {
    cookies: Vec<SessionCookie>,
}

impl CookieSnapshot {
    pub fn new(cookies: Vec<SessionCookie>) -> Self {
        Self { cookies }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionCookie> {
        self.cookies.iter()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// The retrieved EPUB persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Body length in bytes.
    pub bytes: u64,
    /// `Content-Type` as declared by the server.
    pub content_type: Option<String>,
    pub created_at: DateTime<Local>,
    /// Set when `bytes` is below the plausibility floor.
    pub low_confidence: bool,
}

impl Artifact {
    /// File name component of [`Artifact::path`].
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
