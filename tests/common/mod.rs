//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metabee::auth::{AuthManager, Clock, CredentialVerifier, SessionAuthority, SigningSecret};
use metabee::config::PasswordHashConfig;
use metabee::database::SqliteDatabase;
use metabee::server::AppState;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Wall clock that can be pushed forward
#[derive(Debug, Default)]
pub struct AdjustableClock {
    offset_secs: AtomicI64,
}

impl AdjustableClock {
    pub fn advance(&self, by: Duration) {
        self.offset_secs
            .fetch_add(by.as_secs() as i64, Ordering::SeqCst);
    }
}

impl Clock for AdjustableClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::seconds(self.offset_secs.load(Ordering::SeqCst))
    }
}

/// Everything a test needs to drive the API
pub struct TestApp {
    pub state: AppState<SqliteDatabase>,
    pub clock: Arc<AdjustableClock>,
}

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::in_memory()
            .await
            .expect("Failed to create test database"),
    )
}

/// Argon2 parameters small enough for tests
pub fn light_hash_config() -> PasswordHashConfig {
    PasswordHashConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

/// Create a test authentication manager whose tokens are judged by `clock`
pub fn create_test_auth_manager(
    store: Arc<SqliteDatabase>,
    clock: Arc<AdjustableClock>,
) -> Arc<AuthManager<SqliteDatabase>> {
    let verifier = CredentialVerifier::new(&light_hash_config()).expect("verifier");
    let authority = SessionAuthority::new(
        &SigningSecret::new(TEST_SECRET),
        Duration::from_secs(24 * 60 * 60),
    )
    .expect("authority")
    .with_clock(clock);

    Arc::new(AuthManager::new(
        store,
        verifier,
        Arc::new(authority),
        Duration::from_secs(2),
    ))
}

/// Create a test application backed by a fresh database
pub async fn create_test_app() -> TestApp {
    let database = create_test_database().await;
    let clock = Arc::new(AdjustableClock::default());
    let auth_manager = create_test_auth_manager(database, Arc::clone(&clock));

    TestApp {
        state: AppState::new(auth_manager),
        clock,
    }
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    state: AppState<SqliteDatabase>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let app = metabee::server::build_router(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    (addr, shutdown_tx)
}

/// POST a JSON body and return the response
pub async fn post_json(
    client: &reqwest::Client,
    addr: SocketAddr,
    path: &str,
    body: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("http://{}{}", addr, path))
        .json(&body)
        .send()
        .await
        .expect("request failed")
}

/// Register an account through the API and return its session token
pub async fn register(
    client: &reqwest::Client,
    addr: SocketAddr,
    name: &str,
    email: &str,
    password: &str,
) -> String {
    let response = post_json(
        client,
        addr,
        "/register",
        serde_json::json!({ "name": name, "email": email, "password": password }),
    )
    .await;
    assert_eq!(response.status(), 200, "registration should succeed");

    let body: serde_json::Value = response.json().await.expect("grant body");
    body["token"].as_str().expect("token field").to_string()
}
