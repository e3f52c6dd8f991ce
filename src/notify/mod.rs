//! Best-effort side effects: e-mail and real-time events.
//!
//! Services enqueue [`Notification`]s after their transaction commits; a
//! background worker drains the queue. Nothing here can fail a request.

pub mod mailer;
pub mod realtime;

use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

pub use mailer::{Email, LogMailer, MailError, Mailer, RecordingMailer};
pub use realtime::{EventHub, RealtimeEvent};

const OUTBOX_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum Notification {
    TeamMembersChanged { team_id: Uuid },
    FormMembersChanged { form_id: Uuid },
    ResponseSubmitted { form_id: Uuid, response_id: Uuid },
    Mail(Email),
}

impl Notification {
    fn into_event(self) -> Result<RealtimeEvent, Email> {
        match self {
            Notification::TeamMembersChanged { team_id } => Ok(RealtimeEvent {
                room: team_id.to_string(),
                event: "teamMemberUpdate".to_string(),
                payload: json!({ "teamId": team_id }),
            }),
            Notification::FormMembersChanged { form_id } => Ok(RealtimeEvent {
                room: form_id.to_string(),
                event: "formMemberUpdate".to_string(),
                payload: json!({ "formId": form_id }),
            }),
            Notification::ResponseSubmitted { form_id, response_id } => Ok(RealtimeEvent {
                room: form_id.to_string(),
                event: "responseCreated".to_string(),
                payload: json!({ "formId": form_id, "responseId": response_id }),
            }),
            Notification::Mail(email) => Err(email),
        }
    }
}

/// Sending half of the outbox.
#[derive(Clone)]
pub struct Notifier {
    sender: mpsc::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(OUTBOX_CAPACITY);
        (Self { sender }, receiver)
    }

    /// Never fails the caller; a full or closed outbox is logged and the
    /// notification dropped.
    pub fn notify(&self, notification: Notification) {
        if let Err(e) = self.sender.try_send(notification) {
            warn!("dropping notification: {}", e);
        }
    }
}

/// Drains the outbox until every `Notifier` is dropped.
pub async fn run_worker(mut receiver: mpsc::Receiver<Notification>, mailer: Arc<dyn Mailer>, hub: EventHub) {
    while let Some(notification) = receiver.recv().await {
        match notification.into_event() {
            Ok(event) => {
                hub.publish(event);
            }
            Err(email) => match mailer.send(&email).await {
                Ok(()) => debug!(to = %email.to, "mail delivered"),
                Err(e) => warn!(to = %email.to, "mail delivery failed: {}", e),
            },
        }
    }
    debug!("notification worker stopped");
}
