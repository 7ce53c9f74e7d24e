//! Shared Firebase auth client logic.
//!
//! A thin wrapper around the identity-toolkit REST API: usernames map to
//! internal email addresses and the rest is delegated to the provider.

use std::fmt;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const IDENTITY_TOOLKIT_BASE: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_BASE: &str = "https://securetoken.googleapis.com/v1";
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Internal domain appended to bare usernames.
pub const USERNAME_DOMAIN: &str = "camporosso.local";

/// Map a login username to the email the auth provider expects: trimmed,
/// lowercased; values already containing `@` pass through unchanged.
#[must_use]
pub fn format_username_to_email(username: &str, domain: &str) -> String {
    let value = username.trim().to_lowercase();
    if value.is_empty() {
        return value;
    }
    if value.contains('@') {
        value
    } else {
        format!("{value}@{domain}")
    }
}

/// Recover the username from a signed-in user's email.
#[must_use]
pub fn username_from_email(email: &str, domain: &str) -> String {
    let suffix = format!("@{domain}");
    email.strip_suffix(&suffix).map_or_else(
        || email.split('@').next().unwrap_or(email).to_string(),
        ToString::to_string,
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Where a signed-in session survives: across restarts or only in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persistence {
    Local,
    #[default]
    Session,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Auth is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

pub struct FirebaseAuthClient<S: SessionPersistence> {
    api_key: String,
    username_domain: String,
    client: Client,
    store: S,
    persistence: Persistence,
    /// Session kept only in-process under `Persistence::Session`.
    current: Mutex<Option<AuthSession>>,
}

impl<S: SessionPersistence> FirebaseAuthClient<S> {
    pub fn new(
        api_key: impl Into<String>,
        username_domain: impl Into<String>,
        store: S,
    ) -> AuthResult<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(AuthError::NotConfigured("API key must not be empty"));
        }

        Ok(Self {
            api_key,
            username_domain: username_domain.into(),
            client: Client::builder().build()?,
            store,
            persistence: Persistence::default(),
            current: Mutex::new(None),
        })
    }

    /// Choose whether subsequent sign-ins survive process restarts.
    pub fn set_persistence(&mut self, persistence: Persistence) {
        self.persistence = persistence;
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> AuthResult<AuthSession> {
        let email = format_username_to_email(username, &self.username_domain);
        if email.is_empty() {
            return Err(AuthError::Api("Username is required".to_string()));
        }
        if password.trim().is_empty() {
            return Err(AuthError::Api("Password is required".to_string()));
        }

        let payload = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        let response = self
            .client
            .post(format!(
                "{IDENTITY_TOOLKIT_BASE}/accounts:signInWithPassword"
            ))
            .query(&[("key", &self.api_key)])
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        let session: AuthSession = response.json::<SignInResponse>().await?.into();
        self.remember(&session)?;
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::NotConfigured("Refresh token must not be empty"));
        }

        let response = self
            .client
            .post(format!("{SECURE_TOKEN_BASE}/token"))
            .query(&[("key", &self.api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        let session: AuthSession = response.json::<RefreshResponse>().await?.into();
        self.remember(&session)?;
        Ok(session)
    }

    /// Restore the persisted session, refreshing it when expired. An
    /// unrecoverable refresh clears the stored session.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let stored = {
            let current = self.current.lock().expect("session lock poisoned");
            current.clone()
        };
        let Some(stored) = stored.map_or_else(|| self.store.load_session(), |s| Ok(Some(s)))?
        else {
            return Ok(None);
        };

        if !stored.is_expired() {
            return Ok(Some(stored));
        }

        match self.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("failed to refresh persisted session: {}", error);
                self.sign_out()?;
                Ok(None)
            }
        }
    }

    /// The provider has no server-side logout for password sessions; signing
    /// out drops the local credentials.
    pub fn sign_out(&self) -> AuthResult<()> {
        self.current
            .lock()
            .expect("session lock poisoned")
            .take();
        self.store.clear_session()
    }

    /// Signed-in user, if any (without refreshing).
    pub fn current_user(&self) -> AuthResult<Option<AuthUser>> {
        if let Some(session) = self.current.lock().expect("session lock poisoned").as_ref() {
            return Ok(Some(session.user.clone()));
        }
        Ok(self.store.load_session()?.map(|s| s.user))
    }

    /// Username of the signed-in user, with the internal domain stripped.
    pub fn current_username(&self) -> AuthResult<Option<String>> {
        Ok(self.current_user()?.and_then(|user| {
            user.email
                .map(|email| username_from_email(&email, &self.username_domain))
        }))
    }

    fn remember(&self, session: &AuthSession) -> AuthResult<()> {
        *self.current.lock().expect("session lock poisoned") = Some(session.clone());
        if self.persistence == Persistence::Local {
            self.store.save_session(session)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    /// Seconds until expiry, encoded as a string
    expires_in: String,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<SignInResponse> for AuthSession {
    fn from(value: SignInResponse) -> Self {
        Self {
            id_token: value.id_token,
            refresh_token: value.refresh_token,
            expires_at: expires_at_from(&value.expires_in),
            user: AuthUser {
                id: value.local_id,
                email: value.email,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

impl From<RefreshResponse> for AuthSession {
    fn from(value: RefreshResponse) -> Self {
        Self {
            id_token: value.id_token,
            refresh_token: value.refresh_token,
            expires_at: expires_at_from(&value.expires_in),
            user: AuthUser {
                id: value.user_id,
                email: None,
            },
        }
    }
}

fn expires_at_from(expires_in: &str) -> i64 {
    let seconds = expires_in.trim().parse::<i64>().unwrap_or(0);
    unix_timestamp_now().saturating_add(seconds)
}

#[derive(Debug, Deserialize)]
struct ProviderErrorResponse {
    error: Option<ProviderErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ProviderErrorResponse>(body) {
        if let Some(message) = payload.error.and_then(|detail| detail.message) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn unix_timestamp_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| {
            i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Clone, Default)]
    struct MapStore {
        sessions: Arc<Mutex<HashMap<String, String>>>,
    }

    impl SessionPersistence for MapStore {
        fn load_session(&self) -> AuthResult<Option<AuthSession>> {
            let guard = self.sessions.lock().unwrap();
            guard
                .get("session")
                .map(|raw| serde_json::from_str(raw).map_err(AuthError::from))
                .transpose()
        }

        fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
            let raw = serde_json::to_string(session)?;
            self.sessions.lock().unwrap().insert("session".into(), raw);
            Ok(())
        }

        fn clear_session(&self) -> AuthResult<()> {
            self.sessions.lock().unwrap().remove("session");
            Ok(())
        }
    }

    fn session(expires_at: i64) -> AuthSession {
        AuthSession {
            id_token: "id-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            expires_at,
            user: AuthUser {
                id: "user-1".to_string(),
                email: Some("anna@camporosso.local".to_string()),
            },
        }
    }

    #[test]
    fn username_mapping_lowercases_and_appends_domain() {
        assert_eq!(
            format_username_to_email("  Anna ", USERNAME_DOMAIN),
            "anna@camporosso.local"
        );
        assert_eq!(
            format_username_to_email("Anna@Example.com", USERNAME_DOMAIN),
            "anna@example.com"
        );
        assert_eq!(format_username_to_email("   ", USERNAME_DOMAIN), "");
    }

    #[test]
    fn username_from_email_strips_internal_domain() {
        assert_eq!(
            username_from_email("anna@camporosso.local", USERNAME_DOMAIN),
            "anna"
        );
        assert_eq!(
            username_from_email("anna@example.com", USERNAME_DOMAIN),
            "anna"
        );
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(1_700_000_000));
        assert!(!rendered.contains("id-token"));
        assert!(!rendered.contains("refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn expired_session_accounts_for_skew() {
        assert!(session(unix_timestamp_now()).is_expired());
        assert!(!session(unix_timestamp_now() + 3600).is_expired());
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let result = FirebaseAuthClient::new("  ", USERNAME_DOMAIN, MapStore::default());
        assert!(matches!(result, Err(AuthError::NotConfigured(_))));
    }

    #[test]
    fn session_persistence_skips_store_under_session_mode() {
        let store = MapStore::default();
        let client =
            FirebaseAuthClient::new("api-key", USERNAME_DOMAIN, store.clone()).unwrap();
        client.remember(&session(unix_timestamp_now() + 3600)).unwrap();

        assert!(store.sessions.lock().unwrap().is_empty());
        assert_eq!(
            client.current_username().unwrap(),
            Some("anna".to_string())
        );
    }

    #[test]
    fn local_persistence_saves_to_the_store() {
        let store = MapStore::default();
        let mut client =
            FirebaseAuthClient::new("api-key", USERNAME_DOMAIN, store.clone()).unwrap();
        client.set_persistence(Persistence::Local);
        client.remember(&session(unix_timestamp_now() + 3600)).unwrap();

        assert!(!store.sessions.lock().unwrap().is_empty());

        client.sign_out().unwrap();
        assert!(store.sessions.lock().unwrap().is_empty());
        assert_eq!(client.current_user().unwrap(), None);
    }

    #[test]
    fn sign_in_response_maps_to_session() {
        let payload = r#"{
            "idToken": "tok",
            "refreshToken": "refresh",
            "expiresIn": "3600",
            "localId": "user-1",
            "email": "anna@camporosso.local"
        }"#;
        let session: AuthSession =
            serde_json::from_str::<SignInResponse>(payload).unwrap().into();

        assert_eq!(session.user.id, "user-1");
        assert!(session.expires_at > unix_timestamp_now());
        assert!(!session.is_expired());
    }

    #[test]
    fn provider_errors_surface_message_and_status() {
        let body = r#"{"error":{"message":"INVALID_PASSWORD"}}"#;
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, body),
            "INVALID_PASSWORD (400)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
    }
}
