use crate::{
    config::Config,
    error::{AppError, Result},
    models::notification::{NotificationEvent, Recipient},
};
use async_trait::async_trait;
use handlebars::Handlebars;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::json;
use tracing::debug;

/// 出站邮件的边界。扇出引擎只依赖这个契约，
/// 投递结果不被消费，失败由调用方记录后丢弃。
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text: &str, html: &str) -> Result<()>;
}

/// SMTP 投递实现
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| AppError::Email(format!("Invalid SMTP relay: {}", e)))?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        let from = format!("{} <{}>", config.smtp_from_name, config.smtp_from_email)
            .parse()
            .map_err(|e| AppError::Email(format!("Invalid from address: {}", e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailDispatcher for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, text: &str, html: &str) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::Email(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )
            .map_err(|e| AppError::Email(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(format!("SMTP send failed: {}", e)))?;

        debug!("Email dispatched: {}", subject);
        Ok(())
    }
}

const NOTIFICATION_TEMPLATE: &str = r#"
<div style="font-family: 'Helvetica Neue', Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #272727;">{{title}}</h2>
  <p>Hi {{name}},</p>
  <p>{{message}}</p>
  <p>
    <a href="{{url}}" style="background: #5cb85c; color: #fff; padding: 10px 18px; border-radius: 4px; text-decoration: none;">
      View on Authors Haven
    </a>
  </p>
  <p style="color: #999; font-size: 12px;">
    You are receiving this because of your notification settings on Authors Haven.
  </p>
</div>
"#;

/// 通知邮件的渲染器
pub struct EmailTemplates {
    registry: Handlebars<'static>,
}

impl EmailTemplates {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry
            .register_template_string("notification", NOTIFICATION_TEMPLATE)
            .map_err(|e| AppError::Internal(format!("Failed to register email template: {}", e)))?;

        Ok(Self { registry })
    }

    /// 渲染 (subject, plain text, html)
    pub fn render_notification(
        &self,
        event: &NotificationEvent,
        recipient: &Recipient,
    ) -> Result<(String, String, String)> {
        let html = self
            .registry
            .render(
                "notification",
                &json!({
                    "title": event.title,
                    "name": recipient.username,
                    "message": event.message,
                    "url": event.url,
                }),
            )
            .map_err(|e| AppError::Internal(format!("Failed to render email template: {}", e)))?;

        let text = format!("{}\n\n{}", event.message, event.url);

        Ok((event.title.clone(), text, html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationEvent;

    fn recipient() -> Recipient {
        Recipient {
            user_id: "u1".to_string(),
            username: "jane".to_string(),
            email: "jane@example.com".to_string(),
            email_notification: true,
            in_app_notification: true,
        }
    }

    #[test]
    fn renders_notification_email() {
        let templates = EmailTemplates::new().unwrap();
        let event = NotificationEvent::comment_created(
            "u2",
            "john",
            "a1",
            "Rust at the Edge",
            "http://localhost:3001/articles/rust-at-the-edge",
        );

        let (subject, text, html) = templates.render_notification(&event, &recipient()).unwrap();

        assert_eq!(subject, "New comment");
        assert!(text.contains("john commented on \"Rust at the Edge\""));
        assert!(html.contains("Hi jane"));
        assert!(html.contains("http://localhost:3001/articles/rust-at-the-edge"));
    }
}
