//! Test utilities: an application wired to the in-memory store, with the
//! outbox captured instead of drained by a worker.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::app::AppState;
use crate::config::AppConfig;
use crate::database::models::{Folder, Form, FormDraft, NewResponse, TeamDetails, User};
use crate::database::MemoryStore;
use crate::notify::{EventHub, Notification, Notifier};
use crate::services::teams_service::NewTeam;

pub const TEST_PASSWORD: &str = "correct horse battery";

pub struct TestContext {
    pub state: AppState,
    pub store: MemoryStore,
    pub hub: EventHub,
    outbox: Mutex<mpsc::Receiver<Notification>>,
}

impl TestContext {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let hub = EventHub::new();
        let (notifier, outbox) = Notifier::new();
        let state = AppState::new(
            Arc::new(AppConfig::for_tests()),
            Arc::new(store.clone()),
            notifier,
            hub.clone(),
        );
        Self {
            state,
            store,
            hub,
            outbox: Mutex::new(outbox),
        }
    }

    /// Everything enqueued since the last call
    pub fn notifications(&self) -> Vec<Notification> {
        let mut drained = Vec::new();
        let mut outbox = self.outbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while let Ok(notification) = outbox.try_recv() {
            drained.push(notification);
        }
        drained
    }

    /// Create a user whose password is [`TEST_PASSWORD`]
    pub async fn user(&self, email: &str) -> User {
        let username = email.split('@').next().unwrap_or(email);
        self.state
            .users()
            .create_user(email, username, TEST_PASSWORD)
            .await
            .expect("create test user")
    }

    /// Session token for a user created by [`TestContext::user`]
    pub fn token(&self, user: &User) -> String {
        let security = &self.state.config.security;
        let claims = crate::auth::Claims::new(user.id, user.email.clone(), security.jwt_expiry_hours);
        crate::auth::generate_jwt(security, &claims).expect("sign test token")
    }

    pub async fn team(&self, creator_id: Uuid, name: &str) -> TeamDetails {
        self.state
            .teams()
            .create(creator_id, NewTeam { name: name.to_string(), logo_url: None })
            .await
            .expect("create test team")
    }

    pub async fn team_folder(&self, user_id: Uuid, team_id: Uuid, name: &str) -> Folder {
        self.state
            .folders()
            .create_in_team(user_id, team_id, name, None)
            .await
            .expect("create test team folder")
    }

    pub async fn personal_form(&self, user_id: Uuid, title: &str) -> Form {
        self.state
            .forms()
            .create_personal(user_id, draft(title))
            .await
            .expect("create test form")
    }

    pub async fn team_form(&self, user_id: Uuid, team_id: Uuid, title: &str) -> Form {
        self.state
            .forms()
            .create_in_team(user_id, team_id, draft(title))
            .await
            .expect("create test team form")
    }

    pub async fn folder_form(&self, user_id: Uuid, folder_id: Uuid, title: &str) -> Form {
        self.state
            .forms()
            .create_in_folder(user_id, folder_id, draft(title))
            .await
            .expect("create test folder form")
    }

    /// Submit `count` empty responses
    pub async fn submit(&self, form_id: Uuid, count: usize) {
        for _ in 0..count {
            self.state
                .responses()
                .submit(form_id, NewResponse { form_answers: Vec::new() })
                .await
                .expect("submit test response");
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

fn draft(title: &str) -> FormDraft {
    FormDraft {
        title: title.to_string(),
        ..Default::default()
    }
}
