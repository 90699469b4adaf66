//! HTTP middleware for metabee
//!
//! This module provides middleware for:
//! - Authentication of protected routes (bearer session tokens)
//! - Request/response logging

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthManager;
use crate::database::AccountStore;
use crate::models::Account;

/// Body text of every authentication failure
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Account resolved by the gate, attached to the request extensions
#[derive(Clone, Debug)]
pub struct AuthenticatedAccount(pub Account);

/// Authentication middleware function
///
/// This middleware:
/// 1. Extracts the Authorization header
/// 2. Validates the bearer token and re-reads the account it names
/// 3. Adds the resolved account to the request extensions
///
/// Every failure produces the same 401 response.
pub async fn auth_middleware<S: AccountStore + 'static>(
    State(auth_manager): State<Arc<AuthManager<S>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthResponse> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let account = auth_manager
        .authenticate(auth_header)
        .await
        .map_err(|_| AuthResponse::unauthorized())?;

    request
        .extensions_mut()
        .insert(AuthenticatedAccount(account));

    Ok(next.run(request).await)
}

/// Authentication error response
#[derive(Debug)]
pub struct AuthResponse {
    status: StatusCode,
    message: String,
}

impl AuthResponse {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: UNAUTHORIZED_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AuthResponse {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });
        (
            self.status,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            Json(body),
        )
            .into_response()
    }
}

/// Logging middleware function
///
/// Logs request and response details including:
/// - Method and path
/// - Status code
/// - Response time
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}
