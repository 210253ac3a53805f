//! Sequential orchestration of one download-and-deliver run.
//!
//! Stages run strictly in order and the first failure aborts the run. The
//! browser session is always shut down, whether the stages succeed or not.

use crate::browser::BrowserSession;
use crate::config::Settings;
use crate::delivery::ArtifactSink;
use crate::diagnostics::DiagnosticCapture;
use crate::error::Result;
use crate::models::{Artifact, CookieSnapshot, DownloadLink, ResolvedIssue};
use crate::stages::auth::{AuthOutcome, authenticate};
use crate::stages::download::extract_download_link;
use crate::stages::fetch::ArtifactFetcher;
use crate::stages::issue::resolve_issue;
use crate::utils::{artifact_path, remove_artifact};
use chrono::Local;
use tracing::{error, info, instrument, warn};

/// What a successful run produced.
#[derive(Debug)]
pub struct RunReport {
    pub auth: AuthOutcome,
    pub issue: ResolvedIssue,
    pub link: DownloadLink,
    pub artifact: Artifact,
}

/// Run every stage against `session` and hand the artifact to `sink`.
///
/// # Arguments
///
/// * `settings` - Run context
/// * `session` - Browser session; owned and always shut down before returning
/// * `sink` - Receives the artifact once it is on disk
///
/// # Returns
///
/// A [`RunReport`] of what each stage produced, or the first stage failure.
/// A shutdown failure is logged and does not mask the run's outcome.
#[instrument(level = "info", skip_all)]
pub async fn execute<S, D>(settings: &Settings, session: S, sink: &D) -> Result<RunReport>
where
    S: BrowserSession,
    D: ArtifactSink,
{
    let diagnostics = DiagnosticCapture::new(&settings.debug_dir);
    info!(debug_dir = %diagnostics.dir().display(), "Run started");

    let outcome = run_stages(settings, &session, &diagnostics, sink).await;
    if let Err(e) = &outcome {
        error!(error = %e, "Run failed");
    }

    info!("Closing browser");
    if let Err(e) = session.shutdown().await {
        warn!(error = %e, "Browser did not shut down cleanly");
    }
    outcome
}

async fn run_stages<S, D>(
    settings: &Settings,
    session: &S,
    diagnostics: &DiagnosticCapture,
    sink: &D,
) -> Result<RunReport>
where
    S: BrowserSession,
    D: ArtifactSink,
{
    let auth = authenticate(session, settings, diagnostics).await?;
    let issue = resolve_issue(session, settings, diagnostics).await?;
    let link = extract_download_link(session, settings, diagnostics, &issue).await?;

    let artifact = match transfer(settings, session, &issue, &link).await {
        Ok(artifact) => artifact,
        Err(e) => {
            error!(error = %e, "Transfer failed");
            diagnostics.capture(session, "epub_download_error").await;
            return Err(e);
        }
    };

    sink.deliver(&artifact).await?;
    if settings.keep_artifact {
        info!(path = %artifact.path.display(), "Keeping local artifact");
    } else {
        remove_artifact(&artifact.path).await;
    }

    info!(issue = %issue.url, bytes = artifact.bytes, "Run finished");
    Ok(RunReport {
        auth,
        issue,
        link,
        artifact,
    })
}

/// Snapshot the browser cookies and download `link` with them.
async fn transfer<S: BrowserSession>(
    settings: &Settings,
    session: &S,
    issue: &ResolvedIssue,
    link: &DownloadLink,
) -> Result<Artifact> {
    let snapshot = CookieSnapshot::new(session.cookies().await?);
    let fetcher = ArtifactFetcher::new(snapshot, link.url(), &issue.url)?;
    let dest = artifact_path(&settings.output_dir, Local::now().date_naive());
    fetcher.fetch(link.url(), &dest).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakePage, ScriptedBrowser};
    use crate::error::PipelineError;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Sink that records what it saw instead of mailing it.
    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<(String, u64, bool)>>,
    }

    impl ArtifactSink for RecordingSink {
        async fn deliver(&self, artifact: &Artifact) -> Result<()> {
            self.delivered.lock().unwrap().push((
                artifact.file_name(),
                artifact.bytes,
                artifact.path.exists(),
            ));
            Ok(())
        }
    }

    struct FailingSink;

    impl ArtifactSink for FailingSink {
        async fn deliver(&self, _artifact: &Artifact) -> Result<()> {
            Err(PipelineError::Delivery("relay refused".into()))
        }
    }

    const FORM: &str = r#"<form>
        <input name="email"><input type="password">
        <button type="submit">Přihlásit</button>
    </form>"#;

    fn site_browser(base: &str) -> ScriptedBrowser {
        ScriptedBrowser::new()
            .page(base, FakePage::new("RESPEKT", "<p>home</p>"))
            .page(
                &format!("{base}/uzivatel/prihlaseni"),
                FakePage::new("Přihlášení | RESPEKT", FORM).on_click(&format!("{base}/")),
            )
            .page(
                &format!("{base}/"),
                FakePage::new("RESPEKT", r#"<a href="/odhlaseni">Odhlásit</a>"#),
            )
            .page(
                &format!("{base}/tydenik/2025/35"),
                FakePage::new(
                    "Číslo 35/2025 | RESPEKT",
                    r#"<a href="/api/downloadEPub?issueId=abc123">Stáhnout epub</a>"#,
                ),
            )
            .cookie("sid", "abc")
    }

    async fn epub_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/downloadEPub"))
            .and(query_param("issueId", "abc123"))
            .and(header("cookie", "sid=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'E'; 2048]))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn full_run_delivers_and_removes_artifact() {
        let dir = TempDir::new().unwrap();
        let server = epub_server().await;
        let base = server.uri();
        let settings = Settings::for_tests(&base, dir.path());
        let browser = site_browser(&base);
        let probe = browser.probe();
        let sink = RecordingSink::default();

        let report = execute(&settings, browser, &sink).await.unwrap();

        assert_eq!(report.auth, AuthOutcome::Confirmed { indicator: "logout-link" });
        assert_eq!(report.issue.url, format!("{base}/tydenik/2025/35"));
        assert_eq!(
            report.link,
            DownloadLink::Href(format!("{base}/api/downloadEPub?issueId=abc123"))
        );
        assert_eq!(report.artifact.bytes, 2048);

        let delivered = sink.delivered.lock().unwrap().clone();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1, 2048);
        assert!(delivered[0].2, "artifact must exist while being delivered");
        assert!(!report.artifact.path.exists());
        assert_eq!(probe.with(|log| log.shutdowns), 1);
    }

    #[tokio::test]
    async fn keep_artifact_leaves_file_in_place() {
        let dir = TempDir::new().unwrap();
        let server = epub_server().await;
        let mut settings = Settings::for_tests(&server.uri(), dir.path());
        settings.keep_artifact = true;

        let report = execute(&settings, site_browser(&server.uri()), &RecordingSink::default())
            .await
            .unwrap();

        assert!(report.artifact.path.exists());
    }

    #[tokio::test]
    async fn missing_issue_aborts_before_transfer_and_still_shuts_down() {
        let dir = TempDir::new().unwrap();
        let base = "https://www.respekt.cz";
        let settings = Settings::for_tests(base, dir.path());
        let browser = ScriptedBrowser::new()
            .page(base, FakePage::new("RESPEKT", ""))
            .page(
                &format!("{base}/uzivatel/prihlaseni"),
                FakePage::new("Přihlášení | RESPEKT", FORM).on_click(&format!("{base}/")),
            );
        let probe = browser.probe();
        let sink = RecordingSink::default();

        let err = execute(&settings, browser, &sink).await.unwrap_err();

        assert!(matches!(err, PipelineError::IssueNotFound));
        assert!(sink.delivered.lock().unwrap().is_empty());
        assert_eq!(probe.with(|log| log.shutdowns), 1);
    }

    #[tokio::test]
    async fn rejected_transfer_captures_page_and_skips_delivery() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/downloadEPub"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nenalezeno"))
            .mount(&server)
            .await;
        let settings = Settings::for_tests(&server.uri(), dir.path());
        let browser = site_browser(&server.uri());
        let probe = browser.probe();
        let sink = RecordingSink::default();

        let err = execute(&settings, browser, &sink).await.unwrap_err();

        assert!(matches!(err, PipelineError::Transfer { status: 404, .. }));
        assert!(dir.path().join("debug_epub_download_error.html").exists());
        assert!(dir.path().join("debug_epub_download_error.png").exists());
        assert!(sink.delivered.lock().unwrap().is_empty());
        assert_eq!(probe.with(|log| log.shutdowns), 1);
    }

    #[tokio::test]
    async fn delivery_failure_keeps_artifact_for_retry() {
        let dir = TempDir::new().unwrap();
        let server = epub_server().await;
        let settings = Settings::for_tests(&server.uri(), dir.path());
        let browser = site_browser(&server.uri());
        let probe = browser.probe();

        let err = execute(&settings, browser, &FailingSink).await.unwrap_err();

        assert!(matches!(err, PipelineError::Delivery(_)));
        let kept = artifact_path(dir.path(), Local::now().date_naive());
        assert!(kept.exists());
        assert_eq!(probe.with(|log| log.shutdowns), 1);
    }
}
