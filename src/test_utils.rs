//! Shared test utilities for the portal.
//!
//! This module provides helpers for setting up test databases, creating test
//! entities with sensible defaults, and faking the MyJKKN HTTP transport and the
//! cache clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::{
    cache::Clock,
    config::{ApiConfig, ApiConfigStore},
    core::{services, users},
    entities,
    errors::Result,
    myjkkn::{HttpRequest, HttpResponse, MyJkknClient, Transport},
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Key that passes `validate_api_key`.
pub const VALID_TEST_KEY: &str = "jk_test123_secret456";

/// Installs a test-writer tracing subscriber. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("trace"))
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all database tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates an active profile.
///
/// # Defaults
/// * `email`: `{id}@jkkn.ac.in`
/// * `department`: None
pub async fn create_test_profile(
    db: &DatabaseConnection,
    id: &str,
    full_name: &str,
) -> Result<entities::profile::Model> {
    users::create_profile(db, id, &format!("{id}@jkkn.ac.in"), full_name, None).await
}

/// Creates a service in a fresh category with one approval level per role.
///
/// # Arguments
/// * `db` - Database connection
/// * `name` - Service name (also used for the category name)
/// * `roles` - Approver role for each level, first level first
pub async fn create_test_service(
    db: &DatabaseConnection,
    name: &str,
    roles: &[&str],
) -> Result<entities::service::Model> {
    let category = services::create_category(db, &format!("{name} category"), None).await?;
    services::create_service(
        db,
        services::NewService {
            category_id: category.id,
            name: name.to_string(),
            description: None,
            approver_roles: roles.iter().map(ToString::to_string).collect(),
        },
    )
    .await
}

/// Creates a pending request with empty request data.
pub async fn create_test_request(
    db: &DatabaseConnection,
    service_id: i64,
    requester_id: &str,
) -> Result<entities::service_request::Model> {
    services::create_service_request(db, service_id, requester_id, &json!({})).await
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Instant::now()),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

/// Transport returning canned responses and recording every request.
///
/// Queued responses are served first, in order. Once the queue is empty the
/// fallback (if any) is returned for every call.
#[derive(Debug, Default)]
pub struct StubTransport {
    queue: Mutex<VecDeque<std::result::Result<HttpResponse, String>>>,
    fallback: Option<HttpResponse>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every request with `status` and `body`.
    pub fn always(status: u16, body: Value) -> Self {
        Self {
            fallback: Some(HttpResponse {
                status,
                body: body.to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push_raw(status, &body.to_string());
    }

    pub fn push_raw(&self, status: u16, body: &str) {
        self.queue.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    /// Queues a transport failure (no response at all).
    pub fn push_error(&self, message: &str) {
        self.queue.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, String> {
        self.requests.lock().unwrap().push(request);
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            return next;
        }
        self.fallback
            .clone()
            .ok_or_else(|| "no stubbed response left".to_string())
    }
}

/// Valid, non-mock config with distinct upstream and proxy hosts.
pub fn test_api_config() -> ApiConfig {
    ApiConfig {
        api_key: VALID_TEST_KEY.to_string(),
        mock_mode: false,
        proxy_mode: false,
        base_url: "https://myjkkn.test/api".to_string(),
        proxy_url: "http://localhost:8080/api/myjkkn".to_string(),
    }
}

/// Client over an in-memory config store and the given stub.
pub fn stub_client(transport: &Arc<StubTransport>, config: ApiConfig) -> MyJkknClient {
    let store = Arc::new(ApiConfigStore::in_memory(config));
    MyJkknClient::new(store, Arc::clone(transport) as Arc<dyn Transport>)
}
