//! Headless Chrome session over CDP.
//!
//! Locators are resolved by page-side JavaScript so that CSS and text matching
//! behave the same for lookups and for interaction.

use super::{BrowserSession, ElementInfo, Locator};
use crate::error::BrowserError;
use crate::models::SessionCookie;
use crate::site::USER_AGENT;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Shared element resolver injected into every page script.
const LOCATE_JS: &str = r#"
function __locate(loc) {
  if (loc.kind === 'css') {
    return Array.from(document.querySelectorAll(loc.selector));
  }
  return Array.from(document.querySelectorAll(loc.tag))
    .filter(el => (el.textContent || '').includes(loc.needle));
}
"#;

/// How to start the browser.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    /// Upper bound for a single CDP request, including navigations.
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(default)]
    text: String,
    href: Option<String>,
    onclick: Option<String>,
}

/// Live browser with a single page.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

impl ChromeSession {
    /// Launch Chrome and open a blank page.
    #[instrument(level = "info", skip_all, fields(headless = options.headless))]
    pub async fn launch(options: &LaunchOptions) -> Result<Self, BrowserError> {
        let chrome_path = match &options.chrome_path {
            Some(path) => path.clone(),
            None => find_chrome().ok_or_else(|| {
                BrowserError::Launch(
                    "Chrome/Chromium not found; install it or pass --chrome-path".into(),
                )
            })?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .no_sandbox()
            .window_size(1920, 1080)
            .request_timeout(options.request_timeout)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-plugins")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-renderer-backgrounding")
            .arg("--disable-features=TranslateUI")
            .arg("--disable-popup-blocking")
            .arg("--disable-default-apps")
            .arg("--no-first-run")
            .arg("--password-store=basic")
            .arg("--use-mock-keychain")
            .arg(format!("--user-agent={USER_AGENT}"));
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        info!(path = %chrome_path.display(), "Browser initialized");
        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, js: String) -> Result<T, BrowserError> {
        self.page
            .evaluate(js)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }
}

fn script_args(locator: &Locator) -> Result<String, BrowserError> {
    serde_json::to_string(locator).map_err(|e| BrowserError::Script(e.to_string()))
}

impl BrowserSession for ChromeSession {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(title.unwrap_or_default())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Capture(e.to_string()))
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementInfo>, BrowserError> {
        let js = format!(
            r#"(function(loc) {{
{LOCATE_JS}
  return __locate(loc).map(el => ({{
    text: String(el.innerText || el.textContent || '').trim(),
    href: el.getAttribute('href'),
    onclick: el.getAttribute('onclick')
  }}));
}})({})"#,
            script_args(locator)?
        );
        let raw: Vec<RawElement> = self.eval(js).await?;
        Ok(raw
            .into_iter()
            .map(|r| ElementInfo {
                text: r.text,
                href: r.href,
                onclick: r.onclick,
            })
            .collect())
    }

    async fn fill(&self, locator: &Locator, index: usize, value: &str) -> Result<(), BrowserError> {
        let value = serde_json::to_string(value).map_err(|e| BrowserError::Script(e.to_string()))?;
        let js = format!(
            r#"(function(loc, index, value) {{
{LOCATE_JS}
  const el = __locate(loc)[index];
  if (!el) return false;
  el.focus();
  const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
  if (desc && desc.set) {{ desc.set.call(el, value); }} else {{ el.value = value; }}
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})({}, {index}, {value})"#,
            script_args(locator)?
        );
        if self.eval::<bool>(js).await? {
            Ok(())
        } else {
            Err(BrowserError::Script(format!("no element {index} for {locator}")))
        }
    }

    async fn click(&self, locator: &Locator, index: usize) -> Result<(), BrowserError> {
        let js = format!(
            r#"(function(loc, index) {{
{LOCATE_JS}
  const el = __locate(loc)[index];
  if (!el) return false;
  el.click();
  return true;
}})({}, {index})"#,
            script_args(locator)?
        );
        if self.eval::<bool>(js).await? {
            Ok(())
        } else {
            Err(BrowserError::Script(format!("no element {index} for {locator}")))
        }
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>, BrowserError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
            })
            .collect())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.page
            .screenshot(ScreenshotParams::builder().build())
            .await
            .map_err(|e| BrowserError::Capture(e.to_string()))
    }

    async fn shutdown(mut self) -> Result<(), BrowserError> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Waiting for browser process failed");
        }
        self.handler_task.abort();
        closed.map_err(|e| BrowserError::Launch(e.to_string()))?;
        info!("Browser closed");
        Ok(())
    }
}

/// Locate a Chrome/Chromium executable on `PATH` or in well-known locations.
pub fn find_chrome() -> Option<PathBuf> {
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(PathBuf::from(path));
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    candidates
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}
