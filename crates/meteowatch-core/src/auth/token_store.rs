use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::claims::{Claims, User};
use super::storage::{MemoryStorage, TokenStorage};

/// Holds the single session token and answers questions about it.
///
/// Validity is derived on every call from the stored token and the wall
/// clock; nothing about the token is cached here.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
}

impl TokenStore {
    pub fn new(storage: impl TokenStorage + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Persist `token`, replacing any previous one. No validation.
    pub fn set_token(&self, token: &str) -> Result<()> {
        self.storage.save(token)?;
        debug!("Session token stored");
        Ok(())
    }

    /// The stored token verbatim. Backend read failures count as absent.
    pub fn get_token(&self) -> Option<String> {
        match self.storage.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read session token");
                None
            }
        }
    }

    pub fn remove_token(&self) -> Result<()> {
        self.storage.clear()?;
        debug!("Session token removed");
        Ok(())
    }

    /// Check if a token is stored, decodes, and has not expired
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.claims().map(|c| c.is_live_at(now)).unwrap_or(false)
    }

    pub fn current_user(&self) -> Option<User> {
        self.claims().map(|c| c.user())
    }

    pub fn claims(&self) -> Option<Claims> {
        self.get_token().and_then(|t| Claims::decode(&t))
    }

    /// Remaining token lifetime, `None` without a decodable token
    pub fn expires_in(&self) -> Option<Duration> {
        self.claims().map(|c| c.expires_in(Utc::now()))
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("has_token", &self.get_token().is_some())
            .finish()
    }
}
