//! OS-keychain storage for the login password.
//!
//! Remembers the password used at login so `--login` can skip the prompt on
//! later runs. Tokens never pass through here; they live in the credential
//! store.

use anyhow::{Context, Result};
use keyring::Entry;

const KEYCHAIN_SERVICE: &str = "centavo";

pub struct PasswordVault;

impl PasswordVault {
    fn entry(username: &str) -> Result<Entry> {
        Entry::new(KEYCHAIN_SERVICE, username).context("Failed to open keychain entry")
    }

    /// Remember the password for a username
    pub fn store(username: &str, password: &str) -> Result<()> {
        Self::entry(username)?
            .set_password(password)
            .context("Failed to save password to the keychain")
    }

    /// Recall the remembered password for a username
    pub fn get_password(username: &str) -> Result<String> {
        Self::entry(username)?
            .get_password()
            .context("No usable password in the keychain")
    }

    /// Forget the remembered password for a username
    pub fn delete(username: &str) -> Result<()> {
        Self::entry(username)?
            .delete_credential()
            .context("Failed to remove password from the keychain")
    }

    /// Whether a password is remembered for a username
    pub fn has_password(username: &str) -> bool {
        Self::entry(username)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }
}
