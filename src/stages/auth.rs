//! Login against the site's session-based form.
//!
//! Field lookup walks selector alternatives with a bounded wait each. After
//! submission the outcome is judged by, in order: a post-login-only element on
//! the page, then the URL having left the login path. When neither can be
//! confirmed the stage still succeeds with a warning; the site's logged-in
//! markers are unreliable and a hard failure there produces false negatives.

use super::{Strategy, first_hit, navigate};
use crate::browser::{BrowserSession, Locator};
use crate::config::Settings;
use crate::diagnostics::DiagnosticCapture;
use crate::error::{AuthError, PipelineError, Result};
use secrecy::ExposeSecret;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// How a login was judged after submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A post-login-only element was found.
    Confirmed { indicator: &'static str },
    /// No indicator, but the URL no longer contains the login marker.
    LeftLoginPage { url: String },
    /// Neither signal; continuing optimistically.
    Unconfirmed { url: String },
}

pub fn identifier_locators() -> Vec<Locator> {
    ["input[name='email']", "input[type='email']", "#email", ".email"]
        .into_iter()
        .map(Locator::css)
        .collect()
}

pub fn secret_locators() -> Vec<Locator> {
    [
        "input[name='password']",
        "input[type='password']",
        "#password",
        ".password",
    ]
    .into_iter()
    .map(Locator::css)
    .collect()
}

/// Typed buttons, then class-named buttons, then button text.
pub fn submit_strategies() -> Vec<Strategy> {
    vec![
        Strategy::new(
            "typed-button",
            vec![
                Locator::css("button[type='submit']"),
                Locator::css("input[type='submit']"),
            ],
        ),
        Strategy::new(
            "class-button",
            vec![Locator::css(".submit-button"), Locator::css(".login-button")],
        ),
        Strategy::new(
            "button-text",
            vec![
                Locator::text("button", "Přihlásit"),
                Locator::text("button", "Login"),
            ],
        ),
    ]
}

/// Elements only rendered for a logged-in user.
pub fn login_indicators() -> Vec<Strategy> {
    vec![
        Strategy::new(
            "account-link",
            vec![Locator::css("a[href*='muj-ucet']"), Locator::text("a", "Můj účet")],
        ),
        Strategy::new(
            "archive-link",
            vec![Locator::css("a[href*='archiv']"), Locator::text("a", "Archiv")],
        ),
        Strategy::new(
            "logout-link",
            vec![Locator::css("a[href*='odhlaseni']"), Locator::text("a", "Odhlásit")],
        ),
        Strategy::new(
            "user-container",
            vec![Locator::css("div[class*='user'], div[class*='profile']")],
        ),
    ]
}

/// Log in with the run's credentials.
///
/// # Arguments
///
/// * `session` - Browser session to drive
/// * `settings` - Run context; supplies credentials, site profile and waits
/// * `diagnostics` - Where page snapshots go on failure
///
/// # Returns
///
/// How the login was judged. Fails with [`AuthError::FieldNotFound`] or
/// [`AuthError::SubmitControlNotFound`] when the form cannot be driven;
/// navigation errors propagate as [`PipelineError::Browser`]. Diagnostics are
/// captured on every hard failure.
#[instrument(level = "info", skip_all, fields(login = %settings.credentials.login))]
pub async fn authenticate<S: BrowserSession>(
    session: &S,
    settings: &Settings,
    diagnostics: &DiagnosticCapture,
) -> Result<AuthOutcome> {
    match submit_login(session, settings, diagnostics).await {
        Err(e @ PipelineError::Browser(_)) => {
            error!(error = %e, "Login failed");
            diagnostics.capture(session, "login_error").await;
            Err(e)
        }
        other => other,
    }
}

async fn submit_login<S: BrowserSession>(
    session: &S,
    settings: &Settings,
    diagnostics: &DiagnosticCapture,
) -> Result<AuthOutcome> {
    let site = &settings.site;
    let timings = &settings.timings;
    info!("Logging in");

    navigate(session, &site.home_url(), timings.settle).await?;
    info!(title = %session.title().await?, "Home page loaded");
    navigate(session, &site.login_url(), timings.settle).await?;
    info!(title = %session.title().await?, "Login page loaded");

    let Some(identifier) = locate_field(session, settings, identifier_locators()).await else {
        error!("Identifier field not found");
        diagnostics.capture(session, "login_page_no_email").await;
        return Err(AuthError::FieldNotFound { field: "identifier" }.into());
    };
    let Some(secret) = locate_field(session, settings, secret_locators()).await else {
        error!("Secret field not found");
        diagnostics.capture(session, "login_page_no_password").await;
        return Err(AuthError::FieldNotFound { field: "secret" }.into());
    };

    info!("Filling in credentials");
    session
        .fill(&identifier, 0, &settings.credentials.login)
        .await?;
    session
        .fill(&secret, 0, settings.credentials.secret.expose_secret())
        .await?;

    let Some(submit) = first_hit(session, &submit_strategies()).await else {
        error!("Submit control not found");
        diagnostics.capture(session, "login_no_submit").await;
        return Err(AuthError::SubmitControlNotFound.into());
    };
    info!(strategy = submit.strategy, locator = %submit.locator, "Submitting login form");
    session.click(&submit.locator, 0).await?;
    if !timings.login_settle.is_zero() {
        sleep(timings.login_settle).await;
    }

    let url = session.current_url().await?;
    info!(%url, "URL after login");

    if let Some(hit) = first_hit(session, &login_indicators()).await {
        info!(indicator = hit.strategy, text = %hit.element.text, "Login confirmed");
        return Ok(AuthOutcome::Confirmed {
            indicator: hit.strategy,
        });
    }
    if !url.contains(site.login_marker) {
        info!("Login assumed: no longer on the login page");
        return Ok(AuthOutcome::LeftLoginPage { url });
    }
    warn!(%url, "Cannot confirm login, continuing anyway");
    Ok(AuthOutcome::Unconfirmed { url })
}

/// First selector alternative that resolves within the element wait.
async fn locate_field<S: BrowserSession>(
    session: &S,
    settings: &Settings,
    alternatives: Vec<Locator>,
) -> Option<Locator> {
    let timings = &settings.timings;
    for locator in alternatives {
        let found = session
            .wait_for(&locator, timings.element_timeout, timings.poll_interval)
            .await;
        if !found.is_empty() {
            info!(%locator, "Field found");
            return Some(locator);
        }
        info!(%locator, "Field not found");
    }
    None
}
