//! Outbound mail.
//!
//! Without an SMTP host, mails are written to the log instead of sent.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailSettings;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// A plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub body: String,
    pub from: String,
    pub to: Vec<String>,
}

impl Email {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            from: from.into(),
            to: vec![to.into()],
        }
    }
}

/// Mail sender collaborator.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> AppResult<()>;
}

/// Pick the SMTP transport when a host is configured, else log only.
pub fn build_mailer(settings: &MailSettings) -> AppResult<Arc<dyn Mailer>> {
    match &settings.smtp_host {
        Some(_) => Ok(Arc::new(SmtpMailer::new(settings)?)),
        None => {
            tracing::warn!("SMTP not configured - mails will be logged instead of sent");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Development mailer that only logs.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> AppResult<()> {
        tracing::info!(
            "=== EMAIL (not sent) ===\n\
             From: {}\n\
             To: {}\n\
             Subject: {}\n\
             Body:\n{}\n\
             ========================",
            email.from,
            email.to.join(", "),
            email.subject,
            email.body
        );
        Ok(())
    }
}

/// SMTP relay transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> AppResult<Self> {
        let host = settings
            .smtp_host
            .as_deref()
            .ok_or_else(|| AppError::internal("SMTP_HOST is not set"))?;

        let mut builder = if settings.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| AppError::internal(format!("Invalid SMTP relay: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        builder = builder.port(settings.smtp_port);

        if let (Some(user), Some(pass)) = (&settings.smtp_user, settings.smtp_password()) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn mailbox(address: &str) -> AppResult<Mailbox> {
    address
        .parse()
        .map_err(|e| AppError::mail(format!("Invalid address {}: {}", address, e)))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> AppResult<()> {
        let mut builder = Message::builder()
            .from(mailbox(&email.from)?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for to in &email.to {
            builder = builder.to(mailbox(to)?);
        }

        let message = builder
            .body(email.body.clone())
            .map_err(|e| AppError::mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::mail(e.to_string()))?;

        tracing::info!(to = %email.to.join(", "), subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Records mails instead of sending them; can be told to fail.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MemoryMailer {
    outbox: std::sync::Mutex<Vec<Email>>,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `send` fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Email> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> AppResult<()> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::mail("mailer configured to fail"));
        }
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(email.clone());
        }
        Ok(())
    }
}
