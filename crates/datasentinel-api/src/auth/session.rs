//! Cookie sessions signed as HS256 JWTs

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use chrono::{Duration, Utc};
use datasentinel_core::models::User;
use datasentinel_core::AppError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "datasentinel_session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account email
    pub sub: String,
    pub name: String,
    pub is_pro: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: i64,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        SessionKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_hours * 3600
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.email.clone(),
            name: user.name.clone(),
            is_pro: user.is_pro,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.ttl_hours)).timestamp(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign session: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Session validation failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::Unauthorized("Session has expired".to_string())
                    }
                    _ => AppError::Unauthorized("Invalid session".to_string()),
                }
            })
    }

    /// Claims from the session cookie, if one is present and valid.
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<SessionClaims> {
        cookie_value(headers, SESSION_COOKIE).and_then(|token| self.verify(&token).ok())
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value carrying a fresh session.
pub fn session_cookie(token: &str, path: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, token, path, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session.
pub fn clear_cookie(path: &str) -> String {
    format!(
        "{}=; Path={}; Max-Age=0; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, path
    )
}

/// Logged-in user, taken from the session cookie. Rejects with 401.
#[derive(Debug, Clone)]
pub struct SessionUser(pub SessionClaims);

impl SessionUser {
    pub fn email(&self) -> &str {
        &self.0.sub
    }
}

impl FromRequestParts<Arc<AppState>> for SessionUser {
    type Rejection = HttpAppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, SESSION_COOKIE)
            .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;
        let claims = state.sessions.verify(&token)?;
        Ok(SessionUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user() -> User {
        User {
            id: 1,
            email: "ada@example.com".to_string(),
            name: "ada".to_string(),
            is_pro: false,
            stripe_customer_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_session_round_trip() {
        let keys = SessionKeys::new("test-secret", 24);
        let token = keys.issue(&user()).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "ada@example.com");
        assert!(!claims.is_pro);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let keys = SessionKeys::new("test-secret", 24);
        let token = keys.issue(&user()).unwrap();

        let other = SessionKeys::new("another-secret", 24);
        assert!(matches!(other.verify(&token), Err(AppError::Unauthorized(_))));

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(keys.verify(&tampered).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = SessionKeys::new("test-secret", 24);
        let now = Utc::now().timestamp();
        let token = keys
            .sign(&SessionClaims {
                sub: "ada@example.com".to_string(),
                name: "ada".to_string(),
                is_pro: true,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        match keys.verify(&token) {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("expired")),
            other => panic!("Expected expiry rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_cookie_lookup() {
        let keys = SessionKeys::new("test-secret", 1);
        let token = keys.issue(&user()).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", SESSION_COOKIE, token)).unwrap(),
        );
        assert_eq!(
            keys.from_headers(&headers).map(|c| c.sub),
            Some("ada@example.com".to_string())
        );
        assert!(keys.from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("abc", "/datasentinel", 3600, true);
        assert!(cookie.starts_with("datasentinel_session=abc; Path=/datasentinel"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("; Secure"));
        assert!(clear_cookie("/datasentinel").contains("Max-Age=0"));
    }
}
