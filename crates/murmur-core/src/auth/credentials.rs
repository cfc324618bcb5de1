use anyhow::{Context, Result};
use keyring::Entry;

use super::store::TokenStore;
use super::token::CredentialPair;

const SERVICE_NAME: &str = "murmur";

/// Keychain entry holding the serialized pair
const ENTRY_NAME: &str = "auth_tokens";

/// Persists the credential pair in the OS keychain as a single entry.
pub struct KeyringTokenStore {
    service: String,
    entry_name: String,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME, ENTRY_NAME)
    }
}

impl KeyringTokenStore {
    pub fn new(service: &str, entry_name: &str) -> Self {
        Self {
            service: service.to_string(),
            entry_name: entry_name.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.entry_name).context("Failed to create keyring entry")
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        match self.entry()?.get_password() {
            Ok(text) => {
                let pair = serde_json::from_str(&text)
                    .context("Failed to parse tokens from keychain")?;
                Ok(Some(pair))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read tokens from keychain"),
        }
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        let text = serde_json::to_string(pair)?;
        self.entry()?
            .set_password(&text)
            .context("Failed to store tokens in keychain")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete tokens from keychain"),
        }
    }
}
