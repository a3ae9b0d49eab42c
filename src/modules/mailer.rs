use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{MailConfig, SmtpConfig};
use crate::error::{ApiError, ApiResult};

/// 邮件发送抽象
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, content: &str, recipient: &str) -> ApiResult<()>;
}

pub type SharedMailer = Arc<dyn Mailer>;

/// SMTP（隐式 TLS）
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> ApiResult<Self> {
        let from_address = config.from.as_deref().unwrap_or(&config.username);
        let from: Mailbox = from_address
            .parse()
            .map_err(|e| ApiError::config_error(format!("invalid sender {from_address}: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
            .map_err(|e| ApiError::config_error(format!("invalid SMTP server: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, subject: &str, content: &str, recipient: &str) -> ApiResult<()> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| ApiError::invalid_input("recipient", format!("{e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(content.to_string())
            .map_err(|e| ApiError::mail_error(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ApiError::mail_error(e.to_string()))?;

        info!("Email sent to {}: {}", recipient, subject);
        Ok(())
    }
}

/// 未配置 SMTP 时使用
pub struct NoopMailer;

#[async_trait::async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, subject: &str, _content: &str, recipient: &str) -> ApiResult<()> {
        warn!("SMTP is not configured, dropping email to {}: {}", recipient, subject);
        Err(ApiError::config_error("SMTP is not configured"))
    }
}

pub fn create_mailer(config: &MailConfig) -> SharedMailer {
    match &config.smtp {
        Some(smtp) => match SmtpMailer::new(smtp) {
            Ok(mailer) => {
                info!("SMTP mailer initialized for {}:{}", smtp.server, smtp.port);
                Arc::new(mailer)
            }
            Err(e) => {
                warn!("Failed to initialize SMTP mailer: {}", e);
                Arc::new(NoopMailer)
            }
        },
        None => Arc::new(NoopMailer),
    }
}
