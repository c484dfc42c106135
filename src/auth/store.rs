use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use super::TokenPair;

/// Keychain entry name for the access token
const ACCESS_TOKEN_KEY: &str = "access-token";

/// Keychain entry name for the refresh token
const REFRESH_TOKEN_KEY: &str = "refresh-token";

/// Durable backing for the token pair.
///
/// Implementations persist the two tokens under independent keys. Errors
/// are reported to the store, which treats a failed read as "no session"
/// and a failed write as non-fatal: the in-memory pair still governs the
/// rest of the process lifetime.
pub trait TokenPersistence: Send + Sync {
    fn load(&self) -> Result<Option<TokenPair>>;
    fn store(&self, tokens: &TokenPair) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Process-wide holder of the current token pair.
///
/// `get`/`set`/`clear` are atomic with respect to each other: a reader
/// never observes a new access token paired with a stale refresh token.
/// Persistence happens synchronously inside `set`/`clear`, so a restart
/// immediately after either call observes the new state.
pub struct TokenStore {
    tokens: Mutex<Option<TokenPair>>,
    persistence: Option<Box<dyn TokenPersistence>>,
}

impl TokenStore {
    /// Create a store backed by the given persistence layer, seeding the
    /// in-memory pair from whatever it holds. A persistence read failure
    /// starts the store empty rather than failing construction.
    pub fn new(persistence: Box<dyn TokenPersistence>) -> Self {
        let initial = match persistence.load() {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted tokens, starting unauthenticated");
                None
            }
        };
        Self {
            tokens: Mutex::new(initial),
            persistence: Some(persistence),
        }
    }

    /// Create a store with no durable backing. Used by tests and by hosts
    /// that manage persistence themselves.
    pub fn in_memory() -> Self {
        Self {
            tokens: Mutex::new(None),
            persistence: None,
        }
    }

    /// Current token pair, if authenticated. Never fails.
    pub fn get(&self) -> Option<TokenPair> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Overwrite both tokens. The new pair is visible to readers before
    /// this returns, and persisted synchronously; a persistence failure is
    /// logged and swallowed so the live session keeps working.
    pub fn set(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
        let pair = TokenPair::new(access_token, refresh_token);
        if let Some(ref persistence) = self.persistence {
            if let Err(e) = persistence.store(&pair) {
                warn!(error = %e, "Failed to persist tokens, session will not survive restart");
            }
        }
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner()) = Some(pair);
    }

    /// Remove both tokens. Idempotent. Returns whether a pair was present,
    /// so callers can signal session invalidation exactly once.
    pub fn clear(&self) -> bool {
        if let Some(ref persistence) = self.persistence {
            if let Err(e) = persistence.clear() {
                warn!(error = %e, "Failed to clear persisted tokens");
            }
        }
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
    }
}

/// Token persistence in the OS keychain.
///
/// The two tokens live under independent entries of one service name, so a
/// half-written state is possible in principle; `load` treats anything
/// short of both entries present as unauthenticated.
pub struct KeyringTokens {
    service: String,
}

impl KeyringTokens {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    fn read(&self, key: &str) -> Option<String> {
        self.entry(key).ok().and_then(|e| e.get_password().ok())
    }
}

impl TokenPersistence for KeyringTokens {
    fn load(&self) -> Result<Option<TokenPair>> {
        match (self.read(ACCESS_TOKEN_KEY), self.read(REFRESH_TOKEN_KEY)) {
            (Some(access), Some(refresh)) => Ok(Some(TokenPair::new(access, refresh))),
            (None, None) => Ok(None),
            _ => {
                // One entry survived without the other; drop the orphan
                warn!("Keychain held a partial token pair, discarding it");
                self.clear()?;
                Ok(None)
            }
        }
    }

    fn store(&self, tokens: &TokenPair) -> Result<()> {
        self.entry(ACCESS_TOKEN_KEY)?
            .set_password(&tokens.access_token)
            .context("Failed to store access token in keychain")?;
        self.entry(REFRESH_TOKEN_KEY)?
            .set_password(&tokens.refresh_token)
            .context("Failed to store refresh token in keychain")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            match self.entry(key)?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context("Failed to delete token from keychain"))
                }
            }
        }
        Ok(())
    }
}
