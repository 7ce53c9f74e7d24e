//! Session persistence backed by the operating system keychain.

use gestionale_core::auth::{AuthError, AuthResult, AuthSession, SessionPersistence};
use keyring::Entry;

const KEYRING_SERVICE: &str = "gestionale-cli";
const KEYRING_ACCOUNT: &str = "session";

/// Stores the signed-in session as a JSON blob in the platform keychain.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringStore;

impl KeyringStore {
    fn entry() -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for KeyringStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        match Self::entry()?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        Self::entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    fn clear_session(&self) -> AuthResult<()> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }
}
