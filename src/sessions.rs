//! Refresh session storage.
//!
//! Each login maps to the single refresh token currently allowed to renew it.
//! Writing a new token for a login replaces the previous one outright.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

/// Store of the live refresh token per login.
///
/// Implementations must be safe to share across request handlers. Swap the
/// in-memory store for a networked one without touching the auth service.
pub trait RefreshSessionStore: Send + Sync {
    /// Current refresh token for `login`, if a session exists.
    fn get(&self, login: &str) -> Option<String>;

    /// Record `token` as the only live refresh token for `login`.
    fn put(&self, login: &str, token: String);

    /// Replace the stored token with `new` only if it still equals `expected`.
    /// Returns whether the swap happened.
    fn rotate(&self, login: &str, expected: &str, new: String) -> bool;
}

const SHARD_COUNT: usize = 16;

/// Process-local session store, sharded so unrelated logins rarely contend.
pub struct InMemorySessionStore {
    shards: Vec<RwLock<HashMap<String, String>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard(&self, login: &str) -> &RwLock<HashMap<String, String>> {
        let mut hasher = DefaultHasher::new();
        login.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }

    /// Number of logins with a live session.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

// Every write is a single map insert, so a poisoned lock never guards a
// half-applied update and can be recovered.
impl RefreshSessionStore for InMemorySessionStore {
    fn get(&self, login: &str) -> Option<String> {
        self.shard(login)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(login)
            .cloned()
    }

    fn put(&self, login: &str, token: String) {
        self.shard(login)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(login.to_string(), token);
    }

    fn rotate(&self, login: &str, expected: &str, new: String) -> bool {
        let mut shard = self
            .shard(login)
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match shard.get_mut(login) {
            Some(current) if current.as_str() == expected => {
                *current = new;
                true
            }
            _ => false,
        }
    }
}
