//! Storefront contact form, forwarded to the merchant's inbox with the
//! shopper as reply-to.

use askama::Template;
use lettre::Address;
use serde::Deserialize;
use utoipa::ToSchema;

use super::confirmation::render_error;
use crate::domain::cart::normalize_text;
use crate::domain::errors::{DomainError, ValidationError};
use crate::domain::payment::Notification;
use crate::domain::ports::Notifier;

pub const MAX_COMMENT_CHARS: usize = 5000;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub comment: String,
}

#[derive(Template)]
#[template(path = "email/contact_message.html")]
struct ContactHtml<'a> {
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    comment: &'a str,
}

#[derive(Template)]
#[template(path = "email/contact_message.txt")]
struct ContactText<'a> {
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    comment: &'a str,
}

pub struct ContactService<N> {
    notifier: N,
    inbox: String,
}

impl<N: Notifier> ContactService<N> {
    pub fn new(notifier: N, inbox: String) -> Self {
        Self { notifier, inbox }
    }

    /// Unlike order confirmations, a failed delivery is reported to the
    /// caller: the message exists nowhere else.
    pub fn send(&self, form: &ContactForm) -> Result<(), DomainError> {
        let name = form.name.trim();
        let email = form.email.trim();
        let comment = form.comment.trim();
        if name.is_empty() || email.is_empty() || comment.is_empty() {
            return Err(ValidationError::MissingFields.into());
        }
        if email.parse::<Address>().is_err() {
            return Err(ValidationError::InvalidEmail.into());
        }
        if comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(ValidationError::MessageTooLong.into());
        }
        let phone = normalize_text(form.phone.as_deref()).unwrap_or_else(|| "-".to_string());

        let notification = Notification {
            to: self.inbox.clone(),
            subject: format!("New message from {name}"),
            text_body: ContactText {
                name,
                email,
                phone: &phone,
                comment,
            }
            .render()
            .map_err(render_error)?,
            html_body: ContactHtml {
                name,
                email,
                phone: &phone,
                comment,
            }
            .render()
            .map_err(render_error)?,
            reply_to: Some(email.to_string()),
        };

        if let Err(e) = self.notifier.send(&notification) {
            log::error!("Contact message from {email} was not delivered: {e}");
            return Err(e);
        }
        log::info!("Forwarded contact message from {email}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<Notification>>,
        down: bool,
    }

    impl Notifier for Outbox {
        fn send(&self, notification: &Notification) -> Result<(), DomainError> {
            if self.down {
                return Err(DomainError::Notification("relay refused".to_string()));
            }
            self.sent.lock().expect("lock").push(notification.clone());
            Ok(())
        }
    }

    fn form() -> ContactForm {
        ContactForm {
            name: "Grace".to_string(),
            email: " grace@example.com ".to_string(),
            phone: None,
            comment: "Can you do a <b>bold</b> Pixel 8 case?".to_string(),
        }
    }

    #[test]
    fn message_goes_to_the_inbox_with_reply_to() {
        let service = ContactService::new(Outbox::default(), "shop@example.com".to_string());
        service.send(&form()).expect("sent");

        let sent = service.notifier.sent.lock().expect("lock");
        let mail = &sent[0];
        assert_eq!(mail.to, "shop@example.com");
        assert_eq!(mail.subject, "New message from Grace");
        assert_eq!(mail.reply_to.as_deref(), Some("grace@example.com"));
        assert!(mail.html_body.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(mail.html_body.contains("<strong>Phone:</strong> -"));
        assert!(mail.text_body.contains("<b>bold</b>"));
    }

    #[test]
    fn incomplete_or_malformed_forms_send_nothing() {
        let service = ContactService::new(Outbox::default(), "shop@example.com".to_string());
        let cases = [
            (
                ContactForm {
                    comment: "   ".to_string(),
                    ..form()
                },
                ValidationError::MissingFields,
            ),
            (
                ContactForm {
                    email: "grace at example".to_string(),
                    ..form()
                },
                ValidationError::InvalidEmail,
            ),
            (
                ContactForm {
                    comment: "x".repeat(MAX_COMMENT_CHARS + 1),
                    ..form()
                },
                ValidationError::MessageTooLong,
            ),
        ];
        for (form, expected) in cases {
            let err = service.send(&form).expect_err("rejected");
            assert!(matches!(err, DomainError::Validation(v) if v == expected));
        }
        assert!(service.notifier.sent.lock().expect("lock").is_empty());
    }

    #[test]
    fn relay_failure_is_reported() {
        let service = ContactService::new(
            Outbox {
                down: true,
                ..Outbox::default()
            },
            "shop@example.com".to_string(),
        );
        let err = service.send(&form()).expect_err("not delivered");
        assert!(matches!(err, DomainError::Notification(_)));
    }
}
