//! Browser session abstraction used by every resolution stage.
//!
//! Stages only talk to [`BrowserSession`]. The live implementation is
//! [`chrome::ChromeSession`]; tests drive the stages through
//! `fake::ScriptedBrowser`.
//!
//! Elements are addressed by a [`Locator`] plus the index of the match, never by
//! a retained handle, so a snapshot taken with [`BrowserSession::find_all`] and a
//! later [`BrowserSession::click`] agree as long as the page has not changed.

pub mod chrome;
#[cfg(test)]
pub mod fake;

use crate::error::BrowserError;
use crate::models::SessionCookie;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// How to find elements on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// Standard CSS selector.
    Css { selector: String },
    /// Elements with tag `tag` whose text content contains `needle`.
    Text { tag: String, needle: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    pub fn text(tag: impl Into<String>, needle: impl Into<String>) -> Self {
        Locator::Text {
            tag: tag.into(),
            needle: needle.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css { selector } => write!(f, "{selector}"),
            Locator::Text { tag, needle } => write!(f, "{tag}:text({needle:?})"),
        }
    }
}

/// Snapshot of a matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementInfo {
    /// Trimmed text content.
    pub text: String,
    /// Raw `href` attribute (may be relative).
    pub href: Option<String>,
    /// Raw `onclick` attribute.
    pub onclick: Option<String>,
}

/// Exclusive handle on a live page and its cookie state.
///
/// Acquired once per run and released exactly once through
/// [`BrowserSession::shutdown`].
#[allow(async_fn_in_trait)]
pub trait BrowserSession {
    /// Navigate and wait for the load to finish.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Document title, empty if none.
    async fn title(&self) -> Result<String, BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Serialized markup of the current document.
    async fn page_source(&self) -> Result<String, BrowserError>;

    /// All elements matching `locator`, in document order.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementInfo>, BrowserError>;

    /// Replace the value of the `index`-th match with `value`.
    async fn fill(&self, locator: &Locator, index: usize, value: &str) -> Result<(), BrowserError>;

    /// Activate the `index`-th match.
    async fn click(&self, locator: &Locator, index: usize) -> Result<(), BrowserError>;

    async fn cookies(&self) -> Result<Vec<SessionCookie>, BrowserError>;

    /// PNG screenshot of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    /// Release the browser. Called once at the end of every run.
    async fn shutdown(self) -> Result<(), BrowserError>
    where
        Self: Sized;

    /// Poll `find_all` until it yields a match or `timeout` elapses.
    ///
    /// Script errors during polling are treated as "no match yet".
    async fn wait_for(
        &self,
        locator: &Locator,
        timeout: Duration,
        poll: Duration,
    ) -> Vec<ElementInfo> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.find_all(locator).await {
                Ok(found) if !found.is_empty() => return found,
                Ok(_) => {}
                Err(e) => debug!(%locator, error = %e, "Locator poll failed"),
            }
            if Instant::now() >= deadline {
                return Vec::new();
            }
            sleep(poll).await;
        }
    }
}
