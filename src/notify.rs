//! Outbound mail. Delivery is best-effort: callers hand a message to
//! [`Notifier::send`] after their transaction commits and never see the
//! outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::MailConfig;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Mail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> AppResult<()>;
}

/// Writes mail to the log instead of delivering it. Used when no mail API is
/// configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &Mail) -> AppResult<()> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "mail delivery disabled; message logged");
        Ok(())
    }
}

/// Posts mail as JSON to an HTTP mail API with a bearer key.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailConfig,
}

#[derive(Serialize)]
struct OutboundMail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| AppError::configuration(format!("failed to build mail client: {err}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &Mail) -> AppResult<()> {
        let payload = OutboundMail {
            from: &self.config.from,
            to: [&mail.to],
            subject: &mail.subject,
            text: &mail.body,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AppError::dependency(format!("mail request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::dependency(format!("mail API returned {}", response.status())));
        }
        Ok(())
    }
}

/// Fire-and-forget front for a [`Mailer`].
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    pub fn from_config(config: Option<&MailConfig>) -> AppResult<Self> {
        let mailer: Arc<dyn Mailer> = match config {
            Some(config) => Arc::new(HttpMailer::new(config.clone())?),
            None => Arc::new(LogMailer),
        };
        Ok(Self::new(mailer))
    }

    /// Delivers in the background; failures are logged and dropped.
    pub fn send(&self, mail: Mail) {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            if let Err(err) = mailer.send(&mail).await {
                tracing::warn!(to = %mail.to, subject = %mail.subject, error = %err, "notification not delivered");
            }
        });
    }

    pub fn send_all(&self, recipients: impl IntoIterator<Item = String>, subject: &str, body: &str) {
        for to in recipients {
            self.send(Mail::new(to, subject, body));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;

    struct FailingMailer {
        attempts: Mutex<Vec<Mail>>,
        done: Notify,
    }

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, mail: &Mail) -> AppResult<()> {
            self.attempts.lock().unwrap().push(mail.clone());
            self.done.notify_one();
            Err(AppError::dependency("smtp down"))
        }
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let mailer = Arc::new(FailingMailer {
            attempts: Mutex::new(Vec::new()),
            done: Notify::new(),
        });
        let notifier = Notifier::new(mailer.clone());

        notifier.send(Mail::new("owner@example.com", "Payment confirmed", "body"));
        mailer.done.notified().await;

        let attempts = mailer.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].to, "owner@example.com");
    }
}
