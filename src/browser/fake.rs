//! Scripted in-memory browser for stage tests.
//!
//! Pages are keyed by URL. Locators are evaluated with `scraper` against the
//! page's fixture markup, and every call is recorded so tests can assert
//! ordering.

use super::{BrowserSession, ElementInfo, Locator};
use crate::error::BrowserError;
use crate::models::SessionCookie;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One fixture page.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub title: String,
    pub html: String,
    /// Where clicking any element on this page leads.
    pub click_target: Option<String>,
}

impl FakePage {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            html: format!("<html><head><title>{title}</title></head><body>{body}</body></html>"),
            click_target: None,
        }
    }

    pub fn on_click(mut self, target: &str) -> Self {
        self.click_target = Some(target.to_string());
        self
    }
}

/// Everything the fake observed.
#[derive(Debug, Default)]
pub struct CallLog {
    pub visited: Vec<String>,
    pub queried: Vec<Locator>,
    pub filled: Vec<(Locator, String)>,
    pub clicked: Vec<Locator>,
    pub screenshots: usize,
    pub shutdowns: usize,
}

#[derive(Debug, Default)]
struct State {
    current: String,
    log: CallLog,
}

#[derive(Debug, Default)]
pub struct ScriptedBrowser {
    pages: HashMap<String, FakePage>,
    failing: Vec<String>,
    cookies: Vec<SessionCookie>,
    state: Arc<Mutex<State>>,
}

/// Handle that outlives the browser, for post-shutdown assertions.
#[derive(Debug, Clone)]
pub struct Probe(Arc<Mutex<State>>);

impl Probe {
    pub fn with<R>(&self, f: impl FnOnce(&CallLog) -> R) -> R {
        f(&self.0.lock().unwrap().log)
    }
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Navigation to `url` returns an error.
    pub fn failing(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(SessionCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: "www.respekt.cz".to_string(),
            path: "/".to_string(),
        });
        self
    }

    pub fn probe(&self) -> Probe {
        Probe(Arc::clone(&self.state))
    }

    fn current_page(&self) -> FakePage {
        let state = self.state.lock().unwrap();
        self.pages
            .get(&state.current)
            .cloned()
            .unwrap_or_else(|| FakePage::new("404 | RESPEKT", "<h1>Not found</h1>"))
    }

    fn navigate(&self, url: &str) {
        let mut state = self.state.lock().unwrap();
        state.current = url.to_string();
        state.log.visited.push(url.to_string());
    }

    fn evaluate(&self, locator: &Locator) -> Result<Vec<ElementInfo>, BrowserError> {
        let page = self.current_page();
        let doc = Html::parse_document(&page.html);
        let (css, needle) = match locator {
            Locator::Css { selector } => (selector.as_str(), None),
            Locator::Text { tag, needle } => (tag.as_str(), Some(needle.as_str())),
        };
        let selector = Selector::parse(css).map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(doc
            .select(&selector)
            .filter_map(|el| {
                let text = el.text().collect::<String>();
                if needle.is_some_and(|n| !text.contains(n)) {
                    return None;
                }
                Some(ElementInfo {
                    text: text.trim().to_string(),
                    href: el.value().attr("href").map(str::to_string),
                    onclick: el.value().attr("onclick").map(str::to_string),
                })
            })
            .collect())
    }
}

impl BrowserSession for ScriptedBrowser {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        if self.failing.iter().any(|f| f == url) {
            self.state.lock().unwrap().log.visited.push(url.to_string());
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".into(),
            });
        }
        self.navigate(url);
        Ok(())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.current_page().title)
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().unwrap().current.clone())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        Ok(self.current_page().html)
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementInfo>, BrowserError> {
        self.state.lock().unwrap().log.queried.push(locator.clone());
        self.evaluate(locator)
    }

    async fn fill(&self, locator: &Locator, index: usize, value: &str) -> Result<(), BrowserError> {
        if self.evaluate(locator)?.len() <= index {
            return Err(BrowserError::Script(format!("no element {index} for {locator}")));
        }
        self.state
            .lock()
            .unwrap()
            .log
            .filled
            .push((locator.clone(), value.to_string()));
        Ok(())
    }

    async fn click(&self, locator: &Locator, index: usize) -> Result<(), BrowserError> {
        if self.evaluate(locator)?.len() <= index {
            return Err(BrowserError::Script(format!("no element {index} for {locator}")));
        }
        self.state.lock().unwrap().log.clicked.push(locator.clone());
        if let Some(target) = self.current_page().click_target {
            self.navigate(&target);
        }
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>, BrowserError> {
        Ok(self.cookies.clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.state.lock().unwrap().log.screenshots += 1;
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn shutdown(self) -> Result<(), BrowserError> {
        self.state.lock().unwrap().log.shutdowns += 1;
        Ok(())
    }
}
