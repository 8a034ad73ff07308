use lettre::message::header::ContentType;
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::domain::errors::DomainError;
use crate::domain::payment::Notification;
use crate::domain::ports::Notifier;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

/// Sends over STARTTLS SMTP. Called from blocking worker threads.
pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from_address: String,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, DomainError> {
        let credentials = Credentials::new(
            settings.username.clone(),
            settings.password.expose_secret().to_string(),
        );
        let mailer = SmtpTransport::starttls_relay(&settings.host)
            .map_err(|e| DomainError::Notification(e.to_string()))?
            .credentials(credentials)
            .build();
        Ok(Self {
            mailer,
            from_address: settings.from_address.clone(),
        })
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, notification: &Notification) -> Result<(), DomainError> {
        let mut builder = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| DomainError::Notification(format!("from address: {e}")))?,
            )
            .to(notification
                .to
                .parse()
                .map_err(|e| DomainError::Notification(format!("to address: {e}")))?)
            .subject(notification.subject.clone());
        if let Some(reply_to) = &notification.reply_to {
            builder = builder.reply_to(
                reply_to
                    .parse()
                    .map_err(|e| DomainError::Notification(format!("reply-to address: {e}")))?,
            );
        }
        let email = builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(notification.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(notification.html_body.clone()),
                    ),
            )
            .map_err(|e| DomainError::Notification(e.to_string()))?;

        self.mailer
            .send(&email)
            .map_err(|e| DomainError::Notification(e.to_string()))?;
        log::info!("Sent \"{}\" to {}", notification.subject, notification.to);
        Ok(())
    }
}

/// Used when no SMTP relay is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification) -> Result<(), DomainError> {
        log::info!(
            "Email delivery disabled; would send \"{}\" to {}",
            notification.subject,
            notification.to
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_recipient_is_a_notification_error() {
        let notifier = SmtpNotifier::new(&SmtpSettings {
            host: "smtp.example.com".to_string(),
            username: "user".to_string(),
            password: SecretString::from("pw".to_string()),
            from_address: "Cases <orders@example.com>".to_string(),
        })
        .expect("transport builds");
        let err = notifier
            .send(&Notification {
                to: "not an address".to_string(),
                subject: "s".to_string(),
                text_body: "b".to_string(),
                html_body: "<p>b</p>".to_string(),
                reply_to: None,
            })
            .expect_err("address rejected before sending");
        assert!(matches!(err, DomainError::Notification(_)));
    }

    #[test]
    fn invalid_reply_to_is_a_notification_error() {
        let notifier = SmtpNotifier::new(&SmtpSettings {
            host: "smtp.example.com".to_string(),
            username: "user".to_string(),
            password: SecretString::from("pw".to_string()),
            from_address: "Cases <orders@example.com>".to_string(),
        })
        .expect("transport builds");
        let err = notifier
            .send(&Notification {
                to: "shop@example.com".to_string(),
                subject: "s".to_string(),
                text_body: "b".to_string(),
                html_body: "<p>b</p>".to_string(),
                reply_to: Some("nope".to_string()),
            })
            .expect_err("reply-to rejected before sending");
        assert!(matches!(err, DomainError::Notification(_)));
    }
}
