//! E-mail delivery of the downloaded EPUB to the reader's address.

use crate::config::MailSettings;
use crate::error::{PipelineError, Result};
use crate::models::Artifact;
use chrono::{DateTime, Local};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use tokio::fs;
use tracing::{info, instrument};

/// MIME type of the attachment.
pub const EPUB_MIME: &str = "application/epub+zip";

/// Consumer of a finished artifact. The orchestrator removes the local file
/// once `deliver` returns `Ok`.
#[allow(async_fn_in_trait)]
pub trait ArtifactSink {
    async fn deliver(&self, artifact: &Artifact) -> Result<()>;
}

/// Sends the artifact as an attachment over SMTP with STARTTLS.
#[derive(Debug)]
pub struct SmtpDelivery<'a> {
    mail: &'a MailSettings,
}

impl<'a> SmtpDelivery<'a> {
    pub fn new(mail: &'a MailSettings) -> Self {
        Self { mail }
    }
}

/// `Respekt - DD.MM.YYYY`
pub fn subject_for(date: DateTime<Local>) -> String {
    format!("Respekt - {}", date.format("%d.%m.%Y"))
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| PipelineError::Delivery(format!("invalid address {address:?}: {e}")))
}

/// Build the message carrying `body` as the artifact attachment.
pub fn compose(mail: &MailSettings, artifact: &Artifact, body: Vec<u8>) -> Result<Message> {
    let content_type =
        ContentType::parse(EPUB_MIME).map_err(|e| PipelineError::Delivery(e.to_string()))?;
    let attachment = Attachment::new(artifact.file_name()).body(body, content_type);

    Message::builder()
        .from(mailbox(&mail.account)?)
        .to(mailbox(&mail.destination)?)
        .subject(subject_for(artifact.created_at))
        .multipart(MultiPart::mixed().singlepart(attachment))
        .map_err(|e| PipelineError::Delivery(e.to_string()))
}

impl ArtifactSink for SmtpDelivery<'_> {
    #[instrument(level = "info", skip_all, fields(to = %self.mail.destination, file = %artifact.file_name()))]
    async fn deliver(&self, artifact: &Artifact) -> Result<()> {
        info!("Sending EPUB");
        let body = fs::read(&artifact.path).await?;
        let message = compose(self.mail, artifact, body)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.mail.smtp_host)
            .map_err(|e| PipelineError::Delivery(e.to_string()))?
            .credentials(Credentials::new(
                self.mail.account.clone(),
                self.mail.secret.expose_secret().to_string(),
            ))
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| PipelineError::Delivery(e.to_string()))?;
        info!("E-mail sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use secrecy::SecretString;
    use std::path::PathBuf;

    fn mail(destination: &str) -> MailSettings {
        MailSettings {
            account: "sender@gmail.com".into(),
            secret: SecretString::from("app".to_string()),
            destination: destination.into(),
            smtp_host: "smtp.gmail.com".into(),
        }
    }

    fn artifact() -> Artifact {
        Artifact {
            path: PathBuf::from("/tmp/respekt_2025-08-25.epub"),
            bytes: 4,
            content_type: Some(EPUB_MIME.into()),
            created_at: Local.with_ymd_and_hms(2025, 8, 25, 7, 0, 0).unwrap(),
            low_confidence: false,
        }
    }

    #[test]
    fn subject_uses_czech_date_format() {
        assert_eq!(subject_for(artifact().created_at), "Respekt - 25.08.2025");
    }

    #[test]
    fn composed_message_carries_epub_attachment() {
        let message = compose(&mail("reader@kindle.com"), &artifact(), b"EPUB".to_vec()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Respekt - 25.08.2025"));
        assert!(raw.contains("To: reader@kindle.com"));
        assert!(raw.contains("Content-Type: application/epub+zip"));
        assert!(raw.contains("respekt_2025-08-25.epub"));
    }

    #[test]
    fn invalid_destination_is_a_delivery_error() {
        let err = compose(&mail("not an address"), &artifact(), Vec::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Delivery(_)));
    }

    #[test]
    fn mail_settings_debug_hides_secret() {
        let dbg = format!("{:?}", mail("reader@kindle.com"));
        assert!(!dbg.contains("app\""));
        assert!(dbg.contains("reader@kindle.com"));
    }
}
