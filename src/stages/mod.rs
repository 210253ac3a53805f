//! Resolution stages, run in order by [`crate::pipeline`].
//!
//! | Stage | Module | Fallback cascade |
//! |-------|--------|------------------|
//! | Authentication | [`auth`] | field selector alternatives, submit strategies, login signals |
//! | Issue resolution | [`issue`] | direct probe around a baseline, then archive scan |
//! | Download link | [`download`] | API path, label text, `.epub` suffix; then onclick parse, then click |
//! | Transfer | [`fetch`] | none |
//!
//! Cascades are plain ordered data ([`Strategy`] lists) walked left to right by
//! [`first_hit`]; the first strategy with a match wins.

pub mod auth;
pub mod download;
pub mod fetch;
pub mod issue;

use crate::browser::{BrowserSession, ElementInfo, Locator};
use crate::error::BrowserError;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// A named step of a cascade: its locators are tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub name: &'static str,
    pub locators: Vec<Locator>,
}

impl Strategy {
    pub fn new(name: &'static str, locators: Vec<Locator>) -> Self {
        Self { name, locators }
    }
}

/// First element found by a cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub strategy: &'static str,
    pub locator: Locator,
    pub element: ElementInfo,
}

/// Walk `strategies` in order and return the first element of the first
/// locator that matches anything. Query errors count as "no match".
pub async fn first_hit<S: BrowserSession>(session: &S, strategies: &[Strategy]) -> Option<Hit> {
    for strategy in strategies {
        for locator in &strategy.locators {
            match session.find_all(locator).await {
                Ok(found) => {
                    if let Some(element) = found.into_iter().next() {
                        info!(strategy = strategy.name, %locator, "Locator matched");
                        return Some(Hit {
                            strategy: strategy.name,
                            locator: locator.clone(),
                            element,
                        });
                    }
                    debug!(strategy = strategy.name, %locator, "No match");
                }
                Err(e) => debug!(strategy = strategy.name, %locator, error = %e, "Locator failed"),
            }
        }
    }
    None
}

/// Navigate, then give client-side rendering `settle` to finish.
pub async fn navigate<S: BrowserSession>(
    session: &S,
    url: &str,
    settle: Duration,
) -> Result<(), BrowserError> {
    session.goto(url).await?;
    if !settle.is_zero() {
        sleep(settle).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakePage, ScriptedBrowser};

    #[tokio::test]
    async fn first_hit_prefers_earlier_strategy_and_first_element() {
        let browser = ScriptedBrowser::new().page(
            "https://x/",
            FakePage::new(
                "X",
                r#"<a class="late" href="/1">one</a><a class="late" href="/2">two</a><b class="early">b</b>"#,
            ),
        );
        browser.goto("https://x/").await.unwrap();

        let strategies = vec![
            Strategy::new("missing", vec![Locator::css("#nope")]),
            Strategy::new("links", vec![Locator::css("a.late"), Locator::css("b.early")]),
            Strategy::new("bold", vec![Locator::css("b.early")]),
        ];
        let hit = first_hit(&browser, &strategies).await.unwrap();

        assert_eq!(hit.strategy, "links");
        assert_eq!(hit.element.href.as_deref(), Some("/1"));
        let queried = browser.probe().with(|log| log.queried.clone());
        assert_eq!(queried, vec![Locator::css("#nope"), Locator::css("a.late")]);
    }

    #[tokio::test]
    async fn first_hit_skips_broken_locators() {
        let browser = ScriptedBrowser::new().page("https://x/", FakePage::new("X", "<p>x</p>"));
        browser.goto("https://x/").await.unwrap();

        let strategies = vec![Strategy::new(
            "broken",
            vec![Locator::css("p[[["), Locator::css("p")],
        )];
        let hit = first_hit(&browser, &strategies).await.unwrap();
        assert_eq!(hit.locator, Locator::css("p"));
    }
}
