use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::cache::{CacheError, StatusCache};

struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-process cache with per-key expiry, measured on the tokio clock.
#[derive(Default)]
pub struct MemoryCache {
    values: DashMap<String, Expiring<String>>,
    sets: DashMap<String, Expiring<HashSet<String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusCache for MemoryCache {
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let live = self
            .values
            .get(key)
            .map(|entry| entry.is_live().then(|| entry.value.clone()));

        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.values.remove_if(key, |_, entry| !entry.is_live());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.values
            .insert(key.to_string(), Expiring::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.values.remove(key);
        self.sets.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entry = self
            .sets
            .entry(key.to_string())
            .or_insert_with(|| Expiring::new(HashSet::new(), ttl));

        if !entry.is_live() {
            entry.value.clear();
        }
        entry.value.insert(member.to_string());
        entry.expires_at = Instant::now() + ttl;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), CacheError> {
        if let Some(mut entry) = self.sets.get_mut(key) {
            entry.value.remove(member);
        }
        self.sets
            .remove_if(key, |_, entry| entry.value.is_empty() || !entry.is_live());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut members: Vec<String> = self
            .sets
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.iter().cloned().collect())
            .unwrap_or_default();

        members.sort();
        Ok(members)
    }
}
