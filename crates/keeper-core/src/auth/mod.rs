//! Authentication state and the Keeper auth client.
//!
//! Reconciliation behavior is gated entirely on the identity held here: an
//! explicit [`AuthIdentity`] enum replaces the service's loose
//! "user-object-or-boolean" convention, and a generation counter lets the
//! sync engine discard fetches whose results went stale while in flight.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Current authentication identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthIdentity {
    Authenticated(AuthUser),
    Anonymous,
}

impl AuthIdentity {
    #[must_use]
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Anonymous => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

#[derive(Debug, Clone)]
struct AuthSnapshot {
    identity: AuthIdentity,
    generation: u64,
    action_in_progress: bool,
    check_in_progress: bool,
}

/// Shared authentication state container.
///
/// Passed by reference to the sync engine and presentation callers instead of
/// living in ambient global state. Identity changes bump a generation counter;
/// the two flags mirror "auth action in progress" and "auth check in
/// progress" for presentation polling.
pub struct AuthState {
    inner: Mutex<AuthSnapshot>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(AuthSnapshot {
                identity: AuthIdentity::Anonymous,
                generation: 0,
                action_in_progress: false,
                check_in_progress: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AuthSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn identity(&self) -> AuthIdentity {
        self.lock().identity.clone()
    }

    /// Monotonic counter bumped on every identity change. A reconciliation
    /// snapshots this before its fetch and discards the result if the value
    /// moved while the fetch was in flight.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Identity and generation read under one lock. Callers that compare the
    /// generation later must take both from the same snapshot, or an identity
    /// change landing between two separate reads slips past the check.
    #[must_use]
    pub fn identity_and_generation(&self) -> (AuthIdentity, u64) {
        let snapshot = self.lock();
        (snapshot.identity.clone(), snapshot.generation)
    }

    /// Replace the identity, bumping the generation when it actually changed.
    pub fn set_identity(&self, identity: AuthIdentity) {
        let mut snapshot = self.lock();
        if snapshot.identity != identity {
            snapshot.identity = identity;
            snapshot.generation += 1;
        }
    }

    pub fn set_action_in_progress(&self, value: bool) {
        self.lock().action_in_progress = value;
    }

    pub fn set_check_in_progress(&self, value: bool) {
        self.lock().check_in_progress = value;
    }

    #[must_use]
    pub fn action_in_progress(&self) -> bool {
        self.lock().action_in_progress
    }

    #[must_use]
    pub fn check_in_progress(&self) -> bool {
        self.lock().check_in_progress
    }
}

/// An authenticated session: the bearer token plus the account it belongs to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: AuthUser,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

/// Where sessions survive process restarts (keychain on the CLI, memory in
/// tests).
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> Result<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> Result<()>;
    fn clear_session(&self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: AuthUser,
}

/// HTTP client for the Keeper auth endpoints.
#[derive(Clone)]
pub struct AuthClient<S: SessionPersistence> {
    base_url: String,
    http: Client,
    store: S,
}

impl<S: SessionPersistence> AuthClient<S> {
    pub fn new(base_url: impl Into<String>, store: S) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .filter(|url| is_http_url(url))
            .ok_or_else(|| {
                Error::InvalidInput("auth server URL must include http:// or https://".to_string())
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::builder().build()?,
            store,
        })
    }

    /// Sign in with credentials; the session is persisted and the shared
    /// state updated before returning.
    pub async fn sign_in(
        &self,
        state: &AuthState,
        username: &str,
        password: &str,
    ) -> Result<AuthSession> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(Error::InvalidInput(
                "username and password are required".to_string(),
            ));
        }

        state.set_action_in_progress(true);
        let result = self.sign_in_inner(username, password).await;
        state.set_action_in_progress(false);

        let session = result?;
        self.store.save_session(&session)?;
        state.set_identity(AuthIdentity::Authenticated(session.user.clone()));
        Ok(session)
    }

    async fn sign_in_inner(&self, username: &str, password: &str) -> Result<AuthSession> {
        let payload = serde_json::json!({
            "username": username,
            "password": password,
        });
        let request = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .json(&payload);
        let response = crate::remote::expect_success(request.send().await?).await?;
        let body: LoginResponse = response.json().await?;
        Ok(AuthSession {
            token: body.token,
            user: body.user,
        })
    }

    /// Sign out on the server and clear the stored session. The shared state
    /// flips to anonymous even when the server call fails; the caller decides
    /// whether to surface the error.
    pub async fn sign_out(&self, state: &AuthState) -> Result<()> {
        state.set_action_in_progress(true);
        let result = match self.store.load_session()? {
            Some(session) => {
                let request = self
                    .authed(
                        self.http.post(format!("{}/auth/logout", self.base_url)),
                        &session,
                    )
                    .json(&serde_json::json!({}));
                match request.send().await {
                    Ok(response) => crate::remote::expect_success(response).await.map(|_| ()),
                    Err(error) => Err(Error::Http(error)),
                }
            }
            None => Ok(()),
        };

        self.store.clear_session()?;
        state.set_identity(AuthIdentity::Anonymous);
        state.set_action_in_progress(false);
        result
    }

    /// Validate the persisted session against `/auth/user` and fold the
    /// outcome into the shared state. An invalid or missing session resolves
    /// to [`AuthIdentity::Anonymous`] without error.
    pub async fn check_session(&self, state: &AuthState) -> Result<AuthIdentity> {
        state.set_check_in_progress(true);
        let identity = match self.store.load_session()? {
            None => AuthIdentity::Anonymous,
            Some(session) => match self.fetch_user(&session).await {
                Ok(user) => AuthIdentity::Authenticated(user),
                Err(Error::Api { status, .. }) if status == 401 || status == 403 => {
                    tracing::warn!("stored session rejected by server; clearing it");
                    self.store.clear_session()?;
                    AuthIdentity::Anonymous
                }
                Err(error) => {
                    state.set_check_in_progress(false);
                    return Err(error);
                }
            },
        };

        state.set_identity(identity.clone());
        state.set_check_in_progress(false);
        Ok(identity)
    }

    async fn fetch_user(&self, session: &AuthSession) -> Result<AuthUser> {
        let request = self.authed(
            self.http.get(format!("{}/auth/user", self.base_url)),
            session,
        );
        let response = crate::remote::expect_success(request.send().await?).await?;
        Ok(response.json().await?)
    }

    fn authed(&self, request: RequestBuilder, session: &AuthSession) -> RequestBuilder {
        request.bearer_auth(&session.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            name: "Test".to_string(),
            username: "test".to_string(),
            email: "test@example.com".to_string(),
        }
    }

    #[test]
    fn generation_bumps_only_on_identity_change() {
        let state = AuthState::new();
        assert_eq!(state.generation(), 0);

        state.set_identity(AuthIdentity::Anonymous);
        assert_eq!(state.generation(), 0);

        state.set_identity(AuthIdentity::Authenticated(user("u1")));
        assert_eq!(state.generation(), 1);

        state.set_identity(AuthIdentity::Authenticated(user("u1")));
        assert_eq!(state.generation(), 1);

        state.set_identity(AuthIdentity::Anonymous);
        assert_eq!(state.generation(), 2);
    }

    #[test]
    fn combined_snapshot_matches_single_reads() {
        let state = AuthState::new();
        state.set_identity(AuthIdentity::Authenticated(user("u1")));

        let (identity, generation) = state.identity_and_generation();
        assert_eq!(identity, AuthIdentity::Authenticated(user("u1")));
        assert_eq!(generation, 1);

        state.set_identity(AuthIdentity::Anonymous);
        let (identity, generation) = state.identity_and_generation();
        assert_eq!(identity, AuthIdentity::Anonymous);
        assert_eq!(generation, 2);
    }

    #[test]
    fn identity_exposes_user_only_when_authenticated() {
        assert!(AuthIdentity::Anonymous.user().is_none());
        let identity = AuthIdentity::Authenticated(user("u1"));
        assert_eq!(identity.user().map(|u| u.id.as_str()), Some("u1"));
        assert!(identity.is_authenticated());
    }

    #[test]
    fn session_debug_redacts_token() {
        let session = AuthSession {
            token: "secret-token".to_string(),
            user: user("u1"),
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn auth_user_wire_uses_underscore_id() {
        let parsed: AuthUser =
            serde_json::from_str(r#"{"_id":"u9","name":"N","username":"n","email":"n@x.io"}"#)
                .unwrap();
        assert_eq!(parsed.id, "u9");
    }
}
