//! Single-key persistence for the credential pair.
//!
//! Absence of the key means "logged out". The stored value is the pair as
//! JSON text, the same shape the token endpoint returns.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::token::CredentialPair;

/// Token file name in cache directory
const TOKEN_FILE: &str = "auth_tokens.json";

pub trait TokenStore: Send + Sync {
    /// Load the stored pair, `None` when nothing is stored
    fn load(&self) -> Result<Option<CredentialPair>>;

    fn save(&self, pair: &CredentialPair) -> Result<()>;

    /// Remove the stored pair. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

/// Stores the pair as a JSON file in the cache directory.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(TOKEN_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read token file")?;
        let pair = serde_json::from_str(&contents)
            .context("Failed to parse token file")?;
        Ok(Some(pair))
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string(pair)?;
        std::fs::write(&self.path, contents).context("Failed to write token file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}

/// In-process store for tests and sessions that should not outlive the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    value: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON text currently held, if any
    pub fn raw(&self) -> Option<String> {
        self.value.lock().ok().and_then(|v| v.clone())
    }

    /// Replace the stored text verbatim, valid JSON or not
    pub fn set_raw(&self, text: &str) {
        if let Ok(mut value) = self.value.lock() {
            *value = Some(text.to_string());
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        let guard = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        match guard.as_deref() {
            Some(text) => Ok(Some(serde_json::from_str(text)?)),
            None => Ok(None),
        }
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        let text = serde_json::to_string(pair)?;
        let mut guard = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        *guard = Some(text);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}
