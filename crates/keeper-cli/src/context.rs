//! Application state shared by every command.

use std::path::Path;
use std::sync::Arc;

use keeper_core::auth::{AuthClient, AuthIdentity, AuthState, SessionPersistence};
use keeper_core::remote::{HttpCollection, KeeperClient};
use keeper_core::store::{JsonFileStore, LocalStore, NOTES_KEY, TAGS_KEY};
use keeper_core::{Collection, Note, SyncEngine, Tag};

use crate::error::CliError;
use crate::session::SessionStore;

/// Explicit application-state container: auth state, remote client, and the
/// two sync engines, wired once and passed to commands by reference.
pub struct AppContext {
    pub auth_state: Arc<AuthState>,
    pub auth: AuthClient<SessionStore>,
    pub client: KeeperClient,
    pub notes: SyncEngine<Note, HttpCollection<Note>>,
    pub tags: SyncEngine<Tag, HttpCollection<Tag>>,
}

impl AppContext {
    /// Build the context from resolved configuration. The persisted session,
    /// when present, seeds the identity; `whoami` re-validates it against the
    /// server.
    pub fn init(server_url: &str, data_dir: &Path) -> Result<Self, CliError> {
        let session_store = SessionStore::new();
        let stored_session = session_store.load_session()?;

        let auth_state = Arc::new(AuthState::new());
        let token = stored_session.as_ref().map(|s| s.token.clone());
        if let Some(session) = stored_session {
            auth_state.set_identity(AuthIdentity::Authenticated(session.user));
        }

        let client = KeeperClient::new(server_url)?.with_token(token);
        let auth = AuthClient::new(server_url, session_store)?;

        let store: Arc<dyn LocalStore> = Arc::new(JsonFileStore::new(data_dir));
        let notes = SyncEngine::new(
            Collection::load(NOTES_KEY, store.clone())?,
            client.notes(),
            auth_state.clone(),
        );
        let tags = SyncEngine::new(
            Collection::load(TAGS_KEY, store)?,
            client.tags(),
            auth_state.clone(),
        );

        Ok(Self {
            auth_state,
            auth,
            client,
            notes,
            tags,
        })
    }

    /// The signed-in user id, or a sign-in error for authenticated commands.
    pub fn require_user_id(&self) -> Result<String, CliError> {
        self.auth_state
            .identity()
            .user()
            .map(|user| user.id.clone())
            .ok_or(CliError::NotSignedIn)
    }
}
