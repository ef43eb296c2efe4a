//! Authentication: account registration, login, and bearer-token middleware.
//!
//! Tokens are self-contained: a base64url JSON claims blob plus an
//! HMAC-SHA256 signature over it, keyed by the server's token secret.
//! The middleware verifies the signature and expiry, then attaches the
//! resulting [`Principal`] to the request for handlers downstream.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use vidmill_common::{Error, UserId};
use vidmill_db::models::User;
use vidmill_db::queries::users;

use crate::server::{ApiError, AppContext};
use crate::transcode::orchestrator::Principal;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried inside a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
    pub expires_at: u64,
}

impl TokenClaims {
    fn new(user: &User, ttl_hours: u64) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
            expires_at: now_secs() + ttl_hours * 3600,
        }
    }

    fn is_valid(&self) -> bool {
        now_secs() < self.expires_at
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn sign(secret: &str, payload: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Issue a signed token for a user.
pub fn issue_token(secret: &str, user: &User, ttl_hours: u64) -> Result<String, Error> {
    let claims = TokenClaims::new(user, ttl_hours);
    let json = serde_json::to_string(&claims)
        .map_err(|e| Error::internal(format!("Failed to encode claims: {}", e)))?;
    let payload = URL_SAFE_NO_PAD.encode(json);
    let signature =
        sign(secret, &payload).ok_or_else(|| Error::internal("Failed to sign token"))?;
    Ok(format!("{}.{}", payload, signature))
}

/// Verify a token's signature and expiry, returning its claims.
pub fn verify_token(secret: &str, token: &str) -> Option<TokenClaims> {
    let (payload, signature) = token.split_once('.')?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    let expected = hex::decode(signature).ok()?;
    mac.verify_slice(&expected).ok()?;

    let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: TokenClaims = serde_json::from_slice(&json).ok()?;
    claims.is_valid().then_some(claims)
}

/// Bearer-token middleware. Rejects with 401 unless a valid token is
/// present, otherwise attaches the caller's [`Principal`] to the request.
pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let claims = token
        .and_then(|t| verify_token(&ctx.token_secret, t))
        .ok_or((StatusCode::UNAUTHORIZED, "Authentication required"))?;

    request.extensions_mut().insert(Principal {
        user_id: claims.user_id,
        is_admin: claims.is_admin,
    });

    Ok(next.run(request).await)
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Register a new account.
pub async fn register(
    State(ctx): State<AppContext>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if payload.username.trim().is_empty() || payload.password.len() < 6 {
        return Err(Error::invalid_input("Username required and password must be at least 6 characters").into());
    }

    let hash = hash_password(&payload.password)?;
    let conn = ctx.conn()?;
    let user = users::create_user(&conn, payload.username.trim(), &payload.email, &hash, false)?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in and receive a bearer token.
pub async fn login(
    State(ctx): State<AppContext>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let conn = ctx.conn()?;
    let user = match users::get_by_username(&conn, &payload.username) {
        Ok(user) => user,
        // Unknown usernames and bad passwords are indistinguishable.
        Err(_) => return Err(Error::Unauthorized.into()),
    };

    match bcrypt::verify(&payload.password, &user.password_hash) {
        Ok(true) => {
            let token = issue_token(
                &ctx.token_secret,
                &user,
                ctx.config.server.auth.token_ttl_hours,
            )?;
            Ok(Json(LoginResponse { token, user }))
        }
        _ => Err(Error::Unauthorized.into()),
    }
}

/// Hash a password with bcrypt.
pub fn hash_password(password: &str) -> Result<String, Error> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| Error::internal(format!("Failed to hash password: {}", e)))
}

/// Generate a random token-signing secret.
pub fn generate_secret() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// Create the default admin account when the user table is empty, so a
/// fresh install is immediately usable.
pub fn seed_default_admin(conn: &rusqlite::Connection) -> Result<(), Error> {
    if users::count_users(conn)? > 0 {
        return Ok(());
    }

    let hash = hash_password("admin123")?;
    users::create_user(conn, "admin", "admin@localhost", &hash, true)?;
    warn!("Created default admin account (admin/admin123) - change this password");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user() -> User {
        User {
            id: UserId::new(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "unused".to_string(),
            is_admin: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let user = test_user();
        let token = issue_token("secret", &user, 1).unwrap();

        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.username, "alice");
        assert!(!claims.is_admin);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token("secret", &test_user(), 1).unwrap();
        assert!(verify_token("other-secret", &token).is_none());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let token = issue_token("secret", &test_user(), 1).unwrap();
        let mut tampered = token.clone();
        tampered.insert(3, 'x');
        assert!(verify_token("secret", &tampered).is_none());
        assert!(verify_token("secret", "garbage").is_none());
        assert!(verify_token("secret", "").is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        // ttl of 0 hours expires immediately
        let token = issue_token("secret", &test_user(), 0).unwrap();
        assert!(verify_token("secret", &token).is_none());
    }

    #[test]
    fn test_generate_secret_is_random() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
