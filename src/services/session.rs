use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Token is not a JWT")]
    Malformed,
    #[error("Token payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Token payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Identity claims read from the bearer token. The signature is not checked;
/// the backend remains the authority on whether the token is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "userId")]
    pub user_id: u64,
    #[serde(default = "default_username", deserialize_with = "username_or_default")]
    pub username: String,
}

fn default_username() -> String {
    "用户".to_string()
}

fn username_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.filter(|n| !n.is_empty()).unwrap_or_else(default_username))
}

pub fn decode_claims(token: &str) -> Result<SessionClaims, SessionError> {
    let payload = token.split('.').nth(1).ok_or(SessionError::Malformed)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Owner of the opaque bearer token. The pipeline only reads the token and
/// reports expiry; how the token was obtained is not its concern.
pub trait SessionHandler: Send + Sync {
    fn token(&self) -> Option<String>;

    /// Clears local session state and returns the login entry point the
    /// client must navigate to.
    fn expire(&self) -> String;
}

/// In-memory session holding a single token.
pub struct TokenSession {
    token: Mutex<Option<String>>,
    login_url: String,
}

impl TokenSession {
    pub fn new(token: Option<String>, login_url: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(token.filter(|t| !t.is_empty())),
            login_url: login_url.into(),
        }
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Returns the claims of the current token. A token that cannot be decoded
    /// is discarded, leaving the session logged out.
    pub fn check_login_status(&self) -> Option<SessionClaims> {
        let mut guard = self.token.lock().unwrap_or_else(|e| e.into_inner());
        let token = guard.as_deref()?;

        match decode_claims(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::error!("Failed to decode token: {}", e);
                *guard = None;
                None
            }
        }
    }
}

impl SessionHandler for TokenSession {
    fn token(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn expire(&self) -> String {
        tracing::warn!("🔒 Session expired, clearing token");
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.login_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(payload: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn test_decode_claims() {
        let claims = decode_claims(&jwt(r#"{"userId":42,"username":"alice"}"#)).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn test_decode_claims_defaults_username() {
        let claims = decode_claims(&jwt(r#"{"userId":7}"#)).unwrap();
        assert_eq!(claims.username, "用户");
    }

    #[test]
    fn test_decode_claims_blank_username_uses_default() {
        let claims = decode_claims(&jwt(r#"{"userId":7,"username":""}"#)).unwrap();
        assert_eq!(claims.username, "用户");

        let claims = decode_claims(&jwt(r#"{"userId":7,"username":null}"#)).unwrap();
        assert_eq!(claims.username, "用户");
    }

    #[test]
    fn test_decode_claims_rejects_opaque_token() {
        assert!(matches!(decode_claims("opaque"), Err(SessionError::Malformed)));
        assert!(matches!(decode_claims("a.!!!.c"), Err(SessionError::Encoding(_))));
    }

    #[test]
    fn test_undecodable_token_is_cleared() {
        let session = TokenSession::new(Some("a.b.c".to_string()), "login.html");
        assert!(session.check_login_status().is_none());
        assert!(session.token().is_none());
    }

    #[test]
    fn test_expire_clears_token_and_returns_login_url() {
        let session = TokenSession::new(Some(jwt(r#"{"userId":1}"#)), "/login.html");
        assert!(session.check_login_status().is_some());
        assert_eq!(session.expire(), "/login.html");
        assert!(session.token().is_none());
        assert!(session.check_login_status().is_none());
    }

    #[test]
    fn test_empty_token_counts_as_logged_out() {
        let session = TokenSession::new(Some(String::new()), "login.html");
        assert!(session.token().is_none());
    }
}
