//! Key/value backends underneath the credential store.
//!
//! A backend provides atomic single-key operations, string values with native
//! expiry, and unordered string sets. Nothing here knows about credentials.

mod memory;
mod redis_backend;

pub(crate) use memory::MemoryBackend;
pub(crate) use redis_backend::RedisBackend;

use async_trait::async_trait;
use std::time::Duration;

use crate::core::error::Error;

#[async_trait]
pub(crate) trait KeyValueBackend: Send + Sync {
    /// Upserts `value` under `key`, expiring it after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), Error>;

    /// `None` when the key is missing or has expired.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Removes `key` whatever its kind. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), Error>;

    async fn set_add(&self, key: &str, member: &str) -> Result<(), Error>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), Error>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, Error>;

    async fn ping(&self) -> Result<(), Error>;
}

/// Runtime-selected backend with static dispatch.
#[derive(Clone)]
pub(crate) enum Backend {
    Memory(MemoryBackend),
    Redis(RedisBackend),
}

impl Backend {
    pub(crate) fn memory() -> Self {
        Self::Memory(MemoryBackend::new())
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }
}

#[async_trait]
impl KeyValueBackend for Backend {
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), Error> {
        match self {
            Self::Memory(backend) => backend.set_with_ttl(key, value, ttl).await,
            Self::Redis(backend) => backend.set_with_ttl(key, value, ttl).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        match self {
            Self::Memory(backend) => backend.get(key).await,
            Self::Redis(backend) => backend.get(key).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        match self {
            Self::Memory(backend) => backend.delete(key).await,
            Self::Redis(backend) => backend.delete(key).await,
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), Error> {
        match self {
            Self::Memory(backend) => backend.set_add(key, member).await,
            Self::Redis(backend) => backend.set_add(key, member).await,
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), Error> {
        match self {
            Self::Memory(backend) => backend.set_remove(key, member).await,
            Self::Redis(backend) => backend.set_remove(key, member).await,
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, Error> {
        match self {
            Self::Memory(backend) => backend.set_members(key).await,
            Self::Redis(backend) => backend.set_members(key).await,
        }
    }

    async fn ping(&self) -> Result<(), Error> {
        match self {
            Self::Memory(backend) => backend.ping().await,
            Self::Redis(backend) => backend.ping().await,
        }
    }
}
