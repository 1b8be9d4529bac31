use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

/// Outbound email collaborator.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} missing"))
}

impl SmtpMailer {
    /// Reads `SMTP_HOST`, `SMTP_USER`, `SMTP_PASS` and `SMTP_FROM`.
    pub fn from_env() -> Result<Self> {
        let host = env_var("SMTP_HOST")?;
        let creds = Credentials::new(env_var("SMTP_USER")?, env_var("SMTP_PASS")?);
        let from = env_var("SMTP_FROM")?
            .parse()
            .context("invalid SMTP_FROM")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let to: Mailbox = to.parse().with_context(|| format!("invalid recipient {to:?}"))?;
        let msg = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}

/// Logs instead of sending; used when SMTP is not configured.
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(target: "notify", %to, %subject, body_len = body.len(), "email (not sent, SMTP not configured)");
        Ok(())
    }
}
