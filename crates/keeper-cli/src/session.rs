//! Keychain-backed session persistence for the CLI.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use keeper_core::auth::{AuthSession, SessionPersistence};
use keeper_core::{Error, Result};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "keeper-cli";
const SESSION_USERNAME: &str = "keeper_session";

#[derive(Clone)]
pub struct SessionStore;

impl SessionStore {
    pub const fn new() -> Self {
        Self
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry() -> Result<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, SESSION_USERNAME)
            .map_err(|error| Error::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> Result<Option<AuthSession>> {
        let entry = Self::entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(Error::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> Result<Option<AuthSession>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| Error::SecureStorage(error.to_string()))?;
        match guard.get(SESSION_USERNAME) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        Self::entry()?
            .set_password(&raw)
            .map_err(|error| Error::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| Error::SecureStorage(error.to_string()))?;
        guard.insert(SESSION_USERNAME.to_string(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> Result<()> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(Error::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> Result<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| Error::SecureStorage(error.to_string()))?;
        guard.remove(SESSION_USERNAME);
        Ok(())
    }
}
