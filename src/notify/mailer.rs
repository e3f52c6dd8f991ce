use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use crate::database::models::{ElementLabel, Response};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outgoing e-mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Writes e-mails to the log instead of delivering them.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if !email.to.contains('@') {
            return Err(MailError::InvalidRecipient(email.to.clone()));
        }
        info!(from = %self.from, to = %email.to, subject = %email.subject, "mail queued for delivery");
        Ok(())
    }
}

/// Keeps every e-mail in memory; used by tests to assert on outgoing mail.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|e| MailError::Delivery(e.to_string()))?
            .push(email.clone());
        Ok(())
    }
}

pub fn team_invitation(to: &str, team_name: &str, inviter: &str, accept_link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("You have been invited to join {}", team_name),
        body: format!(
            "{} invited you to collaborate in the team \"{}\".\n\nAccept the invitation: {}\n",
            inviter, team_name, accept_link
        ),
    }
}

pub fn form_invitation(to: &str, form_title: &str, inviter: &str, form_link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("{} shared the form \"{}\" with you", inviter, form_title),
        body: format!("You can now view and edit \"{}\".\n\nOpen the form: {}\n", form_title, form_link),
    }
}

pub fn password_reset(to: &str, reset_link: &str, expiry_hours: u64) -> Email {
    Email {
        to: to.to_string(),
        subject: "Reset your FormMaker password".to_string(),
        body: format!(
            "Someone asked to reset the password for this account.\n\nChoose a new password: {}\n\n\
             The link expires in {} hour(s). If you did not ask for it, ignore this e-mail.\n",
            reset_link, expiry_hours
        ),
    }
}

/// Summary of a new submission, one line per labelled element.
pub fn response_notification(
    to: &str,
    form_title: &str,
    responses_link: &str,
    response: &Response,
    labels: &[ElementLabel],
) -> Email {
    let mut body = format!("Your form \"{}\" received a new response (#{}).\n\n", form_title, response.index);
    for label in labels {
        let answer = response
            .form_answers
            .iter()
            .find(|element| element.element_id.matches(&label.element_id))
            .map(|element| {
                element
                    .answers
                    .iter()
                    .map(|answer| answer.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        body.push_str(&format!("{}: {}\n", label.element_name, answer));
    }
    body.push_str(&format!("\nSee all responses: {}\n", responses_link));

    Email {
        to: to.to_string(),
        subject: format!("New response for \"{}\"", form_title),
        body,
    }
}
