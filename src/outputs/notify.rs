//! Email notification with the report attached.
//!
//! Each configured recipient gets its own message. The subject and body
//! depend on whether the run completed or stopped early.

use crate::config::NotifyConfig;
use crate::error::PipelineError;
use crate::models::RunOutcome;
use chrono::Local;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use tracing::{info, instrument};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Tells the operators how the run ended.
pub trait Notify {
    async fn notify(&self, outcome: RunOutcome, report: &Path) -> Result<(), PipelineError>;
}

/// Subject and body for one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub subject: String,
    pub body: String,
}

/// Build the subject line and body text for `outcome`, stamped with `date`.
pub fn envelope_for(config: &NotifyConfig, outcome: RunOutcome, date: &str) -> Envelope {
    let (subject, body) = match outcome {
        RunOutcome::Completed => (&config.complete_subject, &config.complete_body),
        RunOutcome::Partial => (&config.partial_subject, &config.partial_body),
    };
    Envelope {
        subject: format!("{subject} ({date})"),
        body: body.clone(),
    }
}

/// Sends through an authenticated SMTP relay.
pub struct SmtpNotifier {
    config: NotifyConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("smtp_host", &self.config.smtp_host)
            .field("recipients", &self.config.recipients)
            .finish()
    }
}

impl SmtpNotifier {
    /// Build a STARTTLS notifier for `config.smtp_host`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Invalid`] if the settings cannot send mail (see
    /// [`NotifyConfig::validate`]), or [`PipelineError::Notify`] if the relay
    /// host is rejected.
    pub fn new(config: NotifyConfig, password: String) -> Result<Self, PipelineError> {
        config.validate(&password)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| PipelineError::Notify {
                recipient: config.smtp_host.clone(),
                reason: e.to_string(),
            })?
            .credentials(Credentials::new(config.smtp_user.clone(), password))
            .build();
        Ok(Self { config, transport })
    }

    fn message(
        &self,
        to: &str,
        envelope: &Envelope,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Message, String> {
        let from: Mailbox = self.config.from.parse().map_err(|e| format!("from: {e}"))?;
        let to: Mailbox = to.parse().map_err(|e| format!("to: {e}"))?;
        let content_type = ContentType::parse(XLSX_MIME).map_err(|e| e.to_string())?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(envelope.subject.clone())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(envelope.body.clone()))
                    .singlepart(Attachment::new(file_name.to_string()).body(bytes, content_type)),
            )
            .map_err(|e| e.to_string())
    }
}

impl Notify for SmtpNotifier {
    #[instrument(level = "info", skip_all, fields(%outcome, report = %report.display()))]
    async fn notify(&self, outcome: RunOutcome, report: &Path) -> Result<(), PipelineError> {
        let date = Local::now().date_naive().to_string();
        let envelope = envelope_for(&self.config, outcome, &date);
        let bytes = std::fs::read(report).map_err(|e| PipelineError::Notify {
            recipient: self.config.recipients.join(", "),
            reason: format!("cannot read attachment: {e}"),
        })?;
        let file_name = report
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.xlsx".to_string());

        for recipient in &self.config.recipients {
            let fail = |reason: String| PipelineError::Notify {
                recipient: recipient.clone(),
                reason,
            };
            let message = self
                .message(recipient, &envelope, &file_name, bytes.clone())
                .map_err(fail)?;
            self.transport
                .send(message)
                .await
                .map_err(|e| fail(e.to_string()))?;
            info!(%recipient, subject = %envelope.subject, "Sent notification");
        }
        Ok(())
    }
}

/// The notifier a run is wired with.
#[derive(Debug)]
pub enum Notifier {
    Smtp(SmtpNotifier),
    /// Used with `--no-notify`: logs what would have been sent.
    Disabled,
}

impl Notify for Notifier {
    async fn notify(&self, outcome: RunOutcome, report: &Path) -> Result<(), PipelineError> {
        match self {
            Notifier::Smtp(smtp) => smtp.notify(outcome, report).await,
            Notifier::Disabled => {
                info!(%outcome, report = %report.display(), "Notification disabled; not sending mail");
                Ok(())
            }
        }
    }
}
