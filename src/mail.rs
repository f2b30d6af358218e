use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("failed to write outbox message: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound mail transport. Delivery failures must propagate: the signup
/// request as a whole fails if the confirmation code cannot be sent.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// File-based transport: each message becomes one RFC822-ish file in the
/// outbox directory. Stands in for SMTP, which is out of scope.
pub struct OutboxMailer {
    from: String,
    dir: PathBuf,
}

impl OutboxMailer {
    #[must_use]
    pub fn new(from: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            from: from.into(),
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let message = format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\n\r\n{}\r\n",
            self.from, to, subject, body
        );

        let path = self.dir.join(format!("{}.eml", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, message).await?;

        info!("Queued mail to {} at {}", to, path.display());
        Ok(())
    }
}
