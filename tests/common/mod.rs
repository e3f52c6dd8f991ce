#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use formmaker_api::config::AppConfig;
use formmaker_api::database::MemoryStore;
use formmaker_api::notify::{EventHub, Notification, Notifier};
use formmaker_api::{router, AppState};

/// The full router over a fresh in-memory store.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryStore,
    outbox: mpsc::Receiver<Notification>,
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let (notifier, outbox) = Notifier::new();
        let store = MemoryStore::new();
        let state = AppState::new(
            Arc::new(AppConfig::for_tests()),
            Arc::new(store.clone()),
            notifier,
            EventHub::new(),
        );
        Self {
            router: router(state.clone()),
            state,
            store,
            outbox,
        }
    }

    /// Notifications enqueued so far
    pub fn drain_outbox(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.outbox.try_recv() {
            out.push(n);
        }
        out
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await.context("router call failed")?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        self.request(Method::PATCH, uri, Some(token), body).await
    }

    pub async fn delete(&self, uri: &str, token: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        self.request(Method::DELETE, uri, Some(token), body).await
    }

    /// Register through the public endpoint and return the session
    pub async fn signup(&self, email: &str) -> Result<TestUser> {
        let username = email.split('@').next().unwrap_or(email);
        let (status, body) = self
            .request(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({"email": email, "username": username, "password": "correct horse battery"})),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "signup failed: {} {}", status, body);

        Ok(TestUser {
            id: body["data"]["user"]["id"].as_str().context("user id")?.to_string(),
            email: email.to_string(),
            token: body["data"]["token"].as_str().context("token")?.to_string(),
        })
    }

    /// Create a team and return its id
    pub async fn team(&self, owner: &TestUser, name: &str) -> Result<String> {
        let (status, body) = self.post("/api/teams", &owner.token, json!({"name": name})).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "team create failed: {} {}", status, body);
        Ok(body["data"]["id"].as_str().context("team id")?.to_string())
    }

    /// Create a form at `uri` and return its id
    pub async fn form(&self, owner: &TestUser, uri: &str, title: &str, elements: Value) -> Result<String> {
        let (status, body) = self.post(uri, &owner.token, json!({"title": title, "elements": elements})).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "form create failed: {} {}", status, body);
        Ok(body["data"]["id"].as_str().context("form id")?.to_string())
    }
}
