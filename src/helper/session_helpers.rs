//! Admin sessions as HS256-signed tokens carried in an HTTP-only cookie.
//!
//! Verification is stateless: a session is valid iff its token verifies
//! against the configured secret and has not expired.

use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

pub const SESSION_COOKIE: &str = "draft_session";
pub const SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24;
pub const ADMIN_ROLE: &str = "admin";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Configuration(String),
    #[error("could not sign session token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// The identity a verified session grants.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub username: String,
    pub role: String,
}

fn secret(config: &Config) -> Result<&[u8], SessionError> {
    config
        .session_secret
        .as_deref()
        .map(str::as_bytes)
        .ok_or_else(|| SessionError::Configuration("DRAFT_ADMIN_SECRET environment variable is not set".to_string()))
}

/// Issues a token for `username`, valid for 24 hours.
pub fn create_session(config: &Config, username: &str) -> Result<String, SessionError> {
    let now = chrono::Utc::now().timestamp();
    let claims = SessionClaims {
        username: username.to_string(),
        role: ADMIN_ROLE.to_string(),
        iat: now,
        exp: now + SESSION_MAX_AGE_SECS,
        jti: Uuid::new_v4().to_string(),
    };

    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret(config)?))?)
}

/// Returns the session a token grants, or `None` for any failure: expired,
/// malformed, wrongly signed, or no secret configured.
pub fn verify_session(config: &Config, token: &str) -> Option<AdminSession> {
    let key = secret(config).ok()?;
    decode::<SessionClaims>(token, &DecodingKey::from_secret(key), &Validation::default())
        .map(|data| AdminSession { username: data.claims.username, role: data.claims.role })
        .map_err(|e| log::debug!("Rejected session token: {}", e))
        .ok()
}

/// Checks a login attempt against the configured admin pair.
///
/// Errors when either expected value is unset; that is a configuration
/// problem and never grants access.
pub fn validate_credentials(config: &Config, username: &str, password: &str) -> Result<bool, SessionError> {
    match (config.admin_username.as_deref(), config.admin_password.as_deref()) {
        (Some(valid_user), Some(valid_pass)) => Ok(username == valid_user && password == valid_pass),
        _ => Err(SessionError::Configuration(
            "DRAFT_ADMIN_USER and DRAFT_ADMIN_PASS must be set".to_string(),
        )),
    }
}

/// Reads and verifies the session cookie of the current request.
pub fn get_session_from_cookies(config: &Config, req: &HttpRequest) -> Option<AdminSession> {
    let cookie = req.cookie(SESSION_COOKIE)?;
    verify_session(config, cookie.value())
}

pub fn build_session_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.use_secure_cookies)
        .max_age(Duration::seconds(SESSION_MAX_AGE_SECS))
        .finish()
}

pub fn build_clear_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::ZERO)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use assert_matches::assert_matches;

    fn config(secret: Option<&str>) -> Config {
        let mut config = Config::for_tests();
        config.session_secret = secret.map(str::to_string);
        config
    }

    #[test]
    fn issued_token_verifies_to_admin_session() {
        let config = config(Some("test-secret"));
        let token = create_session(&config, "editor").expect("token should be issued");

        let session = verify_session(&config, &token);

        assert_eq!(session, Some(AdminSession { username: "editor".to_string(), role: "admin".to_string() }));
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let token = create_session(&config(Some("secret-alpha")), "editor").expect("token should be issued");
        assert_eq!(verify_session(&config(Some("secret-bravo")), &token), None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = config(Some("test-secret"));
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            username: "editor".to_string(),
            role: ADMIN_ROLE.to_string(),
            iat: now - 2 * SESSION_MAX_AGE_SECS,
            exp: now - SESSION_MAX_AGE_SECS,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret"))
            .expect("encoding should succeed");

        assert_eq!(verify_session(&config, &token), None);
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert_eq!(verify_session(&config(Some("test-secret")), "not-a-token"), None);
    }

    #[test]
    fn missing_secret_fails_issuing_and_verifying() {
        let with_secret = config(Some("test-secret"));
        let token = create_session(&with_secret, "editor").expect("token should be issued");
        let without = config(None);

        assert_matches!(create_session(&without, "editor"), Err(SessionError::Configuration(_)));
        assert_eq!(verify_session(&without, &token), None);
    }

    #[test]
    fn credentials_must_match_both_values() {
        let config = config(Some("s"));
        assert_matches!(validate_credentials(&config, "editor", "hunter2"), Ok(true));
        assert_matches!(validate_credentials(&config, "editor", "wrong"), Ok(false));
        assert_matches!(validate_credentials(&config, "someone", "hunter2"), Ok(false));
    }

    #[test]
    fn unset_credentials_fail_closed() {
        let mut config = config(Some("s"));
        config.admin_password = None;
        assert_matches!(validate_credentials(&config, "editor", ""), Err(SessionError::Configuration(_)));
    }

    #[test]
    fn session_is_read_from_cookie() {
        let config = config(Some("test-secret"));
        let token = create_session(&config, "editor").expect("token should be issued");
        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE, token))
            .to_http_request();

        assert_eq!(get_session_from_cookies(&config, &req).map(|s| s.username), Some("editor".to_string()));
        assert_eq!(get_session_from_cookies(&config, &TestRequest::default().to_http_request()), None);
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = build_session_cookie(&config(Some("s")), "tok".to_string());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(SESSION_MAX_AGE_SECS)));

        let cleared = build_clear_session_cookie();
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(Duration::ZERO));
    }
}
