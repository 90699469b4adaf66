//! HTTP router for metabee
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Registration and login (public)
//! - Token validation and the user profile (behind the auth gate)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::middleware::{auth_middleware, AuthenticatedAccount};
use crate::auth::AuthManager;
use crate::database::AccountStore;
use crate::error::{AuthError, DbError};
use crate::models::{
    Identity, LoginRequest, Profile, ProfileUpdate, RegisterRequest, SessionGrant,
};

/// Shared application state
pub struct AppState<S: AccountStore> {
    /// Authentication manager
    pub auth_manager: Arc<AuthManager<S>>,

    /// Account store
    pub store: Arc<S>,
}

impl<S: AccountStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            auth_manager: Arc::clone(&self.auth_manager),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: AccountStore + 'static> AppState<S> {
    pub fn new(auth_manager: Arc<AuthManager<S>>) -> Self {
        let store = Arc::clone(auth_manager.store());
        Self {
            auth_manager,
            store,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Token validation response
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub message: String,
    pub user_id: String,
    pub email: String,
}

/// Build the main application router
///
/// # Arguments
///
/// * `state` - Application state containing the auth manager and account store
///
/// # Returns
///
/// An axum Router configured with all endpoints
pub fn build_router<S: AccountStore + 'static>(state: AppState<S>) -> Router {
    let protected = Router::new()
        .route("/user/auth/validate", get(validate_handler))
        .route(
            "/user/profile",
            get(get_profile_handler).put(update_profile_handler::<S>),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth_manager),
            auth_middleware::<S>,
        ));

    Router::new()
        // Public endpoints
        .route("/health", get(health_handler))
        .route("/register", post(register_handler::<S>))
        .route("/login", post(login_handler::<S>))
        .merge(protected)
        .with_state(state)
}

// =============================================================================
// Error mapping
// =============================================================================

/// Client-facing API error
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 400 with a message safe to show the client
    BadRequest(String),

    /// 404
    NotFound(String),

    /// 409
    Conflict(String),

    /// 500; details stay in the logs
    Internal,
}

impl ApiError {
    /// Map a registration failure
    fn from_register(err: AuthError) -> Self {
        match err {
            AuthError::InvalidInput(msg) => ApiError::BadRequest(msg),
            AuthError::DuplicateAccount => {
                ApiError::Conflict("an account with this email already exists".to_string())
            }
            other => {
                tracing::error!(error = %other, "Registration failed");
                ApiError::Internal
            }
        }
    }

    /// Map a login failure; bad input and bad credentials look the same
    fn from_login(err: AuthError) -> Self {
        match err {
            AuthError::InvalidInput(_) | AuthError::Unauthenticated => {
                ApiError::BadRequest("invalid email or password".to_string())
            }
            other => {
                tracing::error!(error = %other, "Login failed");
                ApiError::Internal
            }
        }
    }

    fn from_store(err: DbError) -> Self {
        match err {
            DbError::NotFound => ApiError::NotFound("account not found".to_string()),
            other => {
                tracing::error!(error = %other, "Account store error");
                ApiError::Internal
            }
        }
    }

    fn invalid_body(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        ApiError::BadRequest("invalid request body".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// =============================================================================
// Public handlers
// =============================================================================

/// Health check endpoint handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Registration handler
async fn register_handler<S: AccountStore + 'static>(
    State(state): State<AppState<S>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<SessionGrant>, ApiError> {
    let Json(request) = body.map_err(ApiError::invalid_body)?;

    state
        .auth_manager
        .register(request)
        .await
        .map(Json)
        .map_err(ApiError::from_register)
}

/// Login handler
async fn login_handler<S: AccountStore + 'static>(
    State(state): State<AppState<S>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SessionGrant>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected login body");
        ApiError::BadRequest("invalid email or password".to_string())
    })?;

    state
        .auth_manager
        .login(request)
        .await
        .map(Json)
        .map_err(ApiError::from_login)
}

// =============================================================================
// Protected handlers
// =============================================================================

/// Token validation handler
async fn validate_handler(
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
) -> Json<ValidateResponse> {
    let identity = Identity::from(&account);
    Json(ValidateResponse {
        message: "Token is valid".to_string(),
        user_id: identity.id,
        email: identity.email,
    })
}

/// Profile read handler
///
/// Serves the account the gate just loaded; no second store read.
async fn get_profile_handler(
    Extension(AuthenticatedAccount(account)): Extension<AuthenticatedAccount>,
) -> Json<Profile> {
    Json(Profile::from(&account))
}

/// Profile update handler
async fn update_profile_handler<S: AccountStore + 'static>(
    State(state): State<AppState<S>>,
    Extension(AuthenticatedAccount(current)): Extension<AuthenticatedAccount>,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(update) = body.map_err(ApiError::invalid_body)?;
    let update = update.normalized();

    if update.is_empty() {
        return Err(ApiError::BadRequest("no fields to update".to_string()));
    }

    let account = tokio::time::timeout(
        state.auth_manager.lookup_timeout(),
        state.store.update_profile(&current.id, &update),
    )
    .await
    .map_err(|_| {
        tracing::warn!(account_id = %current.id, "Profile update timed out");
        ApiError::Internal
    })?
    .map_err(ApiError::from_store)?;

    tracing::info!(account_id = %account.id, "Profile updated");
    Ok(Json(Profile::from(&account)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialVerifier, SessionAuthority, SigningSecret, DEFAULT_TOKEN_TTL};
    use crate::config::PasswordHashConfig;
    use crate::database::MockAccountStore;
    use crate::models::Account;
    use axum::http::{header, HeaderValue};
    use axum_test::TestServer;
    use std::time::Duration;

    fn create_test_state(store: MockAccountStore) -> AppState<MockAccountStore> {
        let verifier = CredentialVerifier::new(&PasswordHashConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        let authority =
            SessionAuthority::new(&SigningSecret::new("router-test"), DEFAULT_TOKEN_TTL).unwrap();

        AppState::new(Arc::new(AuthManager::new(
            Arc::new(store),
            verifier,
            Arc::new(authority),
            Duration::from_secs(1),
        )))
    }

    fn bearer(state: &AppState<MockAccountStore>, account_id: &str) -> HeaderValue {
        let token = state.auth_manager.authority().issue(account_id).unwrap();
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    fn ana() -> Account {
        Account::new("acct-1", "Ana", "ana@x.com", "hash").with_bio("Pilot")
    }

    // Test 1: Health endpoint returns OK
    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let app = build_router(create_test_state(MockAccountStore::new()));
        let server = TestServer::new(app).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "ok");
        assert!(!body.version.is_empty());
    }

    // Test 2: Register returns a token
    #[tokio::test]
    async fn test_register_endpoint() {
        let mut store = MockAccountStore::new();
        store.expect_find_by_email().returning(|_| Ok(None));
        store.expect_create_account().returning(|_| Ok(()));
        let server = TestServer::new(build_router(create_test_state(store))).unwrap();

        let response = server
            .post("/register")
            .json(&serde_json::json!({"name": "A", "email": "a@x.com", "secret": "pw123456"}))
            .await;

        response.assert_status_ok();
        let grant: SessionGrant = response.json();
        assert!(!grant.token.is_empty());
        assert_eq!(grant.token_type, "Bearer");
    }

    // Test 3: Register with a taken email is a conflict
    #[tokio::test]
    async fn test_register_duplicate_is_conflict() {
        let mut store = MockAccountStore::new();
        store.expect_find_by_email().returning(|_| Ok(Some(ana())));
        let server = TestServer::new(build_router(create_test_state(store))).unwrap();

        let response = server
            .post("/register")
            .json(&serde_json::json!({"name": "A", "email": "ana@x.com", "password": "pw"}))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    // Test 4: Register with missing fields is a bad request
    #[tokio::test]
    async fn test_register_missing_fields() {
        let server =
            TestServer::new(build_router(create_test_state(MockAccountStore::new()))).unwrap();

        let response = server
            .post("/register")
            .json(&serde_json::json!({"email": "a@x.com"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // Test 5: Register storage failure is a 500 without details
    #[tokio::test]
    async fn test_register_storage_failure() {
        let mut store = MockAccountStore::new();
        store
            .expect_find_by_email()
            .returning(|_| Err(DbError::Connection("db down".to_string())));
        let server = TestServer::new(build_router(create_test_state(store))).unwrap();

        let response = server
            .post("/register")
            .json(&serde_json::json!({"name": "A", "email": "a@x.com", "password": "pw"}))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.text().contains("db down"));
    }

    // Test 6: Login with unknown email is a bad request
    #[tokio::test]
    async fn test_login_unknown_email() {
        let mut store = MockAccountStore::new();
        store.expect_find_by_email().returning(|_| Ok(None));
        let server = TestServer::new(build_router(create_test_state(store))).unwrap();

        let response = server
            .post("/login")
            .json(&serde_json::json!({"email": "bob@x.com", "password": "pw"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid email or password");
    }

    // Test 7: Login with a malformed body is a bad request
    #[tokio::test]
    async fn test_login_malformed_body() {
        let server =
            TestServer::new(build_router(create_test_state(MockAccountStore::new()))).unwrap();

        let response = server.post("/login").text("not json").await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // Test 8: Protected route without a token is 401
    #[tokio::test]
    async fn test_validate_requires_token() {
        let server =
            TestServer::new(build_router(create_test_state(MockAccountStore::new()))).unwrap();

        let response = server.get("/user/auth/validate").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Unauthorized");
    }

    // Test 9: Validate echoes the resolved identity
    #[tokio::test]
    async fn test_validate_with_token() {
        let mut store = MockAccountStore::new();
        store.expect_find_by_id().returning(|_| Ok(Some(ana())));
        let state = create_test_state(store);
        let auth = bearer(&state, "acct-1");
        let server = TestServer::new(build_router(state)).unwrap();

        let response = server
            .get("/user/auth/validate")
            .add_header(header::AUTHORIZATION, auth)
            .await;

        response.assert_status_ok();
        let body: ValidateResponse = response.json();
        assert_eq!(body.user_id, "acct-1");
        assert_eq!(body.email, "ana@x.com");
    }

    // Test 10: Profile read never includes the password hash
    #[tokio::test]
    async fn test_get_profile() {
        let mut store = MockAccountStore::new();
        // Only the gate reads the store
        store
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(Some(ana())));
        let state = create_test_state(store);
        let auth = bearer(&state, "acct-1");
        let server = TestServer::new(build_router(state)).unwrap();

        let response = server
            .get("/user/profile")
            .add_header(header::AUTHORIZATION, auth)
            .await;

        response.assert_status_ok();
        assert!(!response.text().contains("password"));
        let profile: Profile = response.json();
        assert_eq!(profile.bio.as_deref(), Some("Pilot"));
    }

    // Test 11: Empty profile update is a bad request
    #[tokio::test]
    async fn test_update_profile_empty() {
        let mut store = MockAccountStore::new();
        store.expect_find_by_id().returning(|_| Ok(Some(ana())));
        store.expect_update_profile().never();
        let state = create_test_state(store);
        let auth = bearer(&state, "acct-1");
        let server = TestServer::new(build_router(state)).unwrap();

        let response = server
            .put("/user/profile")
            .add_header(header::AUTHORIZATION, auth)
            .json(&serde_json::json!({"name": "  "}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // Test 12: Profile update returns the stored profile
    #[tokio::test]
    async fn test_update_profile() {
        let mut store = MockAccountStore::new();
        store.expect_find_by_id().returning(|_| Ok(Some(ana())));
        store
            .expect_update_profile()
            .withf(|id, update| id == "acct-1" && update.location.as_deref() == Some("Recife"))
            .returning(|_, update| {
                let mut account = ana();
                account.location = update.location.clone();
                Ok(account)
            });
        let state = create_test_state(store);
        let auth = bearer(&state, "acct-1");
        let server = TestServer::new(build_router(state)).unwrap();

        let response = server
            .put("/user/profile")
            .add_header(header::AUTHORIZATION, auth)
            .json(&serde_json::json!({"location": " Recife "}))
            .await;

        response.assert_status_ok();
        let profile: Profile = response.json();
        assert_eq!(profile.location.as_deref(), Some("Recife"));
    }

    // Test 13: ApiError mapping
    #[test]
    fn test_api_error_mapping() {
        assert_eq!(
            ApiError::from_login(AuthError::Unauthenticated),
            ApiError::from_login(AuthError::InvalidInput("x".to_string()))
        );
        assert_eq!(
            ApiError::from_login(AuthError::Timeout),
            ApiError::Internal
        );
        assert!(matches!(
            ApiError::from_register(AuthError::DuplicateAccount),
            ApiError::Conflict(_)
        ));
        assert_eq!(
            ApiError::from_register(AuthError::Hashing("oom".to_string())),
            ApiError::Internal
        );
        assert!(matches!(
            ApiError::from_store(DbError::NotFound),
            ApiError::NotFound(_)
        ));
    }

    struct StalledUpdates;

    #[async_trait::async_trait]
    impl AccountStore for StalledUpdates {
        async fn find_by_id(&self, _id: &str) -> Result<Option<Account>, DbError> {
            Ok(Some(ana()))
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<Account>, DbError> {
            Ok(None)
        }

        async fn create_account(&self, _account: &Account) -> Result<(), DbError> {
            Ok(())
        }

        async fn update_profile(
            &self,
            _id: &str,
            _update: &ProfileUpdate,
        ) -> Result<Account, DbError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ana())
        }

        async fn update_password_hash(&self, _email: &str, _hash: &str) -> Result<(), DbError> {
            Ok(())
        }
    }

    // Test 14: a stalled profile write is cut off by the lookup timeout
    #[tokio::test]
    async fn test_update_profile_times_out() {
        let verifier = CredentialVerifier::new(&PasswordHashConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        let authority =
            SessionAuthority::new(&SigningSecret::new("router-test"), DEFAULT_TOKEN_TTL).unwrap();
        let token = authority.issue("acct-1").unwrap();
        let state = AppState::new(Arc::new(AuthManager::new(
            Arc::new(StalledUpdates),
            verifier,
            Arc::new(authority),
            Duration::from_millis(50),
        )));
        let server = TestServer::new(build_router(state)).unwrap();

        let started = std::time::Instant::now();
        let response = server
            .put("/user/profile")
            .add_header(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            )
            .json(&serde_json::json!({"bio": "x"}))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
