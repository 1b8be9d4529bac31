pub mod digest;
pub mod email;

pub use digest::{DigestFrequency, DigestOutcome, DigestTrigger, EmailDigestScheduler, EmailSettings, NoopDigest};
pub use email::{LogMailer, MailSender, SmtpMailer};
