//! Dashboard Authentication
//!
//! Single shared login backed by environment configuration.
//!
//! # Model
//!
//! - **Credentials**: one username/password pair, the password kept only as an
//!   Argon2id hash in memory
//! - **Tokens**: HS256 JWT carrying the configured user secret, 7-day expiry
//! - **Cookie storage**: httpOnly, sameSite=strict `token` cookie
//! - No revocation: expiry is the only way a token stops being valid
//!
//! # Endpoints
//!
//! - `POST /api/auth/login` - Exchange username/password for a token
//! - `POST /api/auth/validate` - Check a token (body or cookie)
//! - `POST /api/auth/logout` - Clear the session cookie

use crate::config::{env_flag, env_string};
use crate::dashboard::error::ApiError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::header,
    middleware::Next,
    response::Response,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Token lifetime (7 days)
pub const TOKEN_EXPIRY_DAYS: i64 = 7;

/// Cookie name for the session token
pub const SESSION_COOKIE: &str = "token";

const MISSING_SECRETS: &str = "JWT_SECRET and/or USER_SECRET not set";
const MISSING_LOGIN: &str = "LOGIN_USERNAME and/or LOGIN_PASSWORD not set";

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Config(String),

    #[error("Wrong credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

/// Authentication configuration
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// JWT signing key (`JWT_SECRET`)
    pub jwt_secret: Option<String>,
    /// Claim embedded in every token (`USER_SECRET`)
    pub user_secret: Option<String>,
    /// Shared login name (`LOGIN_USERNAME`)
    pub login_username: Option<String>,
    /// Shared login password (`LOGIN_PASSWORD`)
    pub login_password: Option<String>,
    /// Require a valid token on the inventory API
    pub require_auth: bool,
    /// Secure cookies (requires HTTPS)
    pub secure_cookies: bool,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("user_secret", &self.user_secret.as_ref().map(|_| "<redacted>"))
            .field("login_username", &self.login_username)
            .field("login_password", &self.login_password.as_ref().map(|_| "<redacted>"))
            .field("require_auth", &self.require_auth)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env_string("JWT_SECRET"),
            user_secret: env_string("USER_SECRET"),
            login_username: env_string("LOGIN_USERNAME"),
            login_password: env_string("LOGIN_PASSWORD"),
            require_auth: env_flag("PORTNOTE_REQUIRE_AUTH").unwrap_or(false),
            secure_cookies: env_flag("PORTNOTE_SECURE_COOKIES").unwrap_or(false),
        };

        if config.jwt_secret.is_none() || config.user_secret.is_none() {
            warn!("{} - login and validation will fail", MISSING_SECRETS);
        }
        if config.login_username.is_none() || config.login_password.is_none() {
            warn!("{} - login will fail", MISSING_LOGIN);
        }

        config
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque shared secret; a token without it is rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_secret: Option<String>,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    user_secret: String,
}

/// Issues and validates session tokens
pub struct TokenService {
    keys: Option<SigningKeys>,
}

impl TokenService {
    /// Both secrets must be present for the service to work; otherwise every
    /// call fails with a configuration error.
    pub fn new(jwt_secret: Option<&str>, user_secret: Option<&str>) -> Self {
        let keys = match (jwt_secret, user_secret) {
            (Some(jwt), Some(user)) => Some(SigningKeys {
                encoding: EncodingKey::from_secret(jwt.as_bytes()),
                decoding: DecodingKey::from_secret(jwt.as_bytes()),
                user_secret: user.to_string(),
            }),
            _ => None,
        };
        Self { keys }
    }

    fn keys(&self) -> Result<&SigningKeys, AuthError> {
        self.keys
            .as_ref()
            .ok_or_else(|| AuthError::Config(MISSING_SECRETS.to_string()))
    }

    /// Issue a token for the configured user secret, valid for 7 days
    pub fn issue(&self) -> Result<String, AuthError> {
        let keys = self.keys()?;
        self.issue_with(&keys.user_secret, Utc::now())
    }

    /// Issue a token embedding `claim`, as if issued at `issued_at`
    pub fn issue_with(&self, claim: &str, issued_at: DateTime<Utc>) -> Result<String, AuthError> {
        let keys = self.keys()?;

        let claims = Claims {
            user_secret: Some(claim.to_string()),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::days(TOKEN_EXPIRY_DAYS)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AuthError::Config(format!("Failed to encode token: {}", e)))
    }

    /// Verify signature and expiry, then check the embedded claim
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let keys = self.keys()?;

        let data = decode::<Claims>(token, &keys.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!("Token rejected: {:?}", e.kind());
                AuthError::InvalidToken
            })?;

        match data.claims.user_secret.as_deref() {
            Some(secret) if secret == keys.user_secret => Ok(data.claims),
            _ => Err(AuthError::InvalidToken),
        }
    }
}

/// The single configured login
pub struct Credentials {
    username: String,
    password_hash: String,
}

impl Credentials {
    /// Hash the password with Argon2id; the plain text is not kept
    pub fn new(username: &str, password: &str) -> Result<Self, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?
            .to_string();

        Ok(Self {
            username: username.to_string(),
            password_hash,
        })
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.password_hash) else {
            return false;
        };
        let password_ok = Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();

        password_ok && username == self.username
    }
}

/// Authentication state
pub struct AuthState {
    tokens: TokenService,
    credentials: Option<Credentials>,
    require_auth: bool,
    secure_cookies: bool,
}

impl AuthState {
    /// Build auth state from configuration
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let tokens = TokenService::new(config.jwt_secret.as_deref(), config.user_secret.as_deref());

        let credentials = match (&config.login_username, &config.login_password) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)?),
            _ => None,
        };

        Ok(Self {
            tokens,
            credentials,
            require_auth: config.require_auth,
            secure_cookies: config.secure_cookies,
        })
    }

    pub fn require_auth(&self) -> bool {
        self.require_auth
    }

    /// Fails with a configuration error when the signing secrets are unset
    pub fn ensure_configured(&self) -> Result<(), AuthError> {
        self.tokens.keys().map(|_| ())
    }

    /// Check the shared credentials and issue a token
    pub fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        // Secrets first: a misconfigured server never judges credentials
        self.ensure_configured()?;

        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| AuthError::Config(MISSING_LOGIN.to_string()))?;

        if !credentials.verify(username, password) {
            return Err(AuthError::InvalidCredentials);
        }

        self.tokens.issue()
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.validate(token)
    }

    /// Session cookie carrying a freshly issued token
    pub fn build_cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.secure_cookies)
            .max_age(cookie::time::Duration::days(TOKEN_EXPIRY_DAYS))
            .build()
    }

    /// Expired session cookie (logout)
    pub fn build_logout_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.secure_cookies)
            .max_age(cookie::time::Duration::ZERO)
            .build()
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Validate request; the cookie is used when `token` is absent
#[derive(Debug, Default, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Login handler
pub async fn login_handler(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<TokenResponse>), ApiError> {
    let Json(req) = payload?;

    let token = state.login(&req.username, &req.password).map_err(|e| {
        if matches!(e, AuthError::InvalidCredentials) {
            warn!("Failed login attempt for {:?}", req.username);
        }
        e
    })?;

    info!("User {:?} logged in", req.username);
    let jar = jar.add(state.build_cookie(&token));
    Ok((jar, Json(TokenResponse { token })))
}

/// Validate handler
pub async fn validate_handler(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.ensure_configured()?;

    let from_body = payload.ok().and_then(|Json(req)| req.token);
    let token = from_body
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .ok_or(ApiError::InvalidToken)?;

    state.validate(&token)?;
    Ok(Json(MessageResponse { message: "validated" }))
}

/// Logout handler
pub async fn logout_handler(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.add(state.build_logout_cookie());
    (jar, Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// Middleware
// ============================================================================

/// Token from an `Authorization: Bearer` header, else the session cookie
fn request_token(jar: &CookieJar, req: &Request) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
}

/// Authentication middleware for the inventory API
pub async fn auth_middleware(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.require_auth {
        return Ok(next.run(req).await);
    }

    state.ensure_configured()?;

    let token = request_token(&jar, &req).ok_or(ApiError::InvalidToken)?;
    let claims = state.validate(&token)?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

// ============================================================================
// Router
// ============================================================================

/// Create the authentication router
pub fn auth_router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/login", post(login_handler))
        .route("/validate", post(validate_handler))
        .route("/logout", post(logout_handler))
        .with_state(state)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request as HttpRequest, StatusCode};
    use tower::ServiceExt;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: Some("test-secret-at-least-32-characters-long".to_string()),
            user_secret: Some("user-secret".to_string()),
            login_username: Some("admin".to_string()),
            login_password: Some("hunter2".to_string()),
            require_auth: true,
            secure_cookies: false,
        }
    }

    fn post_json(uri: &str, body: serde_json::Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_credentials_verify() {
        let creds = Credentials::new("admin", "hunter2").unwrap();
        assert!(creds.verify("admin", "hunter2"));
        assert!(!creds.verify("admin", "hunter3"));
        assert!(!creds.verify("root", "hunter2"));
    }

    #[test]
    fn test_login_issues_valid_token() {
        let state = AuthState::new(test_config()).unwrap();
        let token = state.login("admin", "hunter2").unwrap();

        let claims = state.validate(&token).unwrap();
        assert_eq!(claims.user_secret.as_deref(), Some("user-secret"));
        assert_eq!(claims.exp - claims.iat, TOKEN_EXPIRY_DAYS * 24 * 60 * 60);
    }

    #[test]
    fn test_login_wrong_password() {
        let state = AuthState::new(test_config()).unwrap();
        let result = state.login("admin", "wrong");
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[test]
    fn test_missing_secrets_is_config_error() {
        let config = AuthConfig {
            jwt_secret: None,
            ..test_config()
        };
        let state = AuthState::new(config).unwrap();

        assert!(matches!(state.login("admin", "hunter2"), Err(AuthError::Config(_))));
        assert!(matches!(state.validate("abc"), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_missing_login_is_config_error() {
        let config = AuthConfig {
            login_password: None,
            ..test_config()
        };
        let state = AuthState::new(config).unwrap();
        assert!(matches!(state.login("admin", "hunter2"), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenService::new(Some("jwt"), Some("user-secret"));

        let fresh = tokens
            .issue_with("user-secret", Utc::now() - Duration::days(6))
            .unwrap();
        assert!(tokens.validate(&fresh).is_ok());

        let stale = tokens
            .issue_with("user-secret", Utc::now() - Duration::days(8))
            .unwrap();
        assert!(matches!(tokens.validate(&stale), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let ours = TokenService::new(Some("jwt"), Some("user-secret"));
        let theirs = TokenService::new(Some("other-jwt"), Some("user-secret"));

        let token = theirs.issue().unwrap();
        assert!(matches!(ours.validate(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_mismatched_claim_rejected() {
        let tokens = TokenService::new(Some("jwt"), Some("user-secret"));
        let token = tokens.issue_with("someone-else", Utc::now()).unwrap();
        assert!(matches!(tokens.validate(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_missing_claim_rejected() {
        let claims = Claims {
            user_secret: None,
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::days(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"jwt"),
        )
        .unwrap();

        let tokens = TokenService::new(Some("jwt"), Some("user-secret"));
        assert!(matches!(tokens.validate(&token), Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_login_endpoint_sets_cookie() {
        let state = Arc::new(AuthState::new(test_config()).unwrap());
        let app = auth_router(state);

        let response = app
            .oneshot(post_json(
                "/login",
                serde_json::json!({ "username": "admin", "password": "hunter2" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));

        let json = body_json(response).await;
        assert!(json["token"].is_string());
    }

    #[tokio::test]
    async fn test_login_endpoint_wrong_credentials() {
        let state = Arc::new(AuthState::new(test_config()).unwrap());
        let app = auth_router(state);

        let response = app
            .oneshot(post_json(
                "/login",
                serde_json::json!({ "username": "admin", "password": "nope" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let json = body_json(response).await;
        assert_eq!(json["error"], "Wrong credentials");
        assert!(json.get("token").is_none());
    }

    #[tokio::test]
    async fn test_validate_endpoint_body_and_cookie() {
        let state = Arc::new(AuthState::new(test_config()).unwrap());
        let token = state.login("admin", "hunter2").unwrap();
        let app = auth_router(state);

        let response = app
            .clone()
            .oneshot(post_json("/validate", serde_json::json!({ "token": token })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "validated");

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/validate")
            .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validate_endpoint_garbage_token() {
        let state = Arc::new(AuthState::new(test_config()).unwrap());
        let app = auth_router(state);

        let response = app
            .oneshot(post_json("/validate", serde_json::json!({ "token": "not-a-jwt" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid token");
    }

    #[tokio::test]
    async fn test_validate_endpoint_unconfigured() {
        let config = AuthConfig {
            user_secret: None,
            ..test_config()
        };
        let app = auth_router(Arc::new(AuthState::new(config).unwrap()));

        let response = app
            .oneshot(post_json("/validate", serde_json::json!({ "token": "x" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], MISSING_SECRETS);
    }

    #[tokio::test]
    async fn test_validate_endpoint_unconfigured_without_token() {
        let app = auth_router(Arc::new(AuthState::new(AuthConfig::default()).unwrap()));

        let response = app
            .clone()
            .oneshot(post_json("/validate", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], MISSING_SECRETS);

        let bare = HttpRequest::builder()
            .method("POST")
            .uri("/validate")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(bare).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    fn gated_app(config: AuthConfig) -> Router {
        let state = Arc::new(AuthState::new(config).unwrap());
        Router::new()
            .route("/inventory", axum::routing::get(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_gate_unconfigured_is_config_error() {
        let config = AuthConfig {
            require_auth: true,
            ..AuthConfig::default()
        };
        let request = HttpRequest::builder()
            .uri("/inventory")
            .body(Body::empty())
            .unwrap();

        let response = gated_app(config).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_gate_prefers_bearer_over_stale_cookie() {
        let state = AuthState::new(test_config()).unwrap();
        let token = state.login("admin", "hunter2").unwrap();

        let request = HttpRequest::builder()
            .uri("/inventory")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::COOKIE, format!("{}=stale-token", SESSION_COOKIE))
            .body(Body::empty())
            .unwrap();

        let response = gated_app(test_config()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
