use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::KeyValueBackend;
use crate::core::error::{ConfigError, Error};

/// Redis-backed store. Every command is bounded by `timeout` and surfaces
/// connectivity problems as [`Error::StoreUnavailable`]; retrying is left to
/// the caller.
#[derive(Clone)]
pub(crate) struct RedisBackend {
    connection: MultiplexedConnection,
    timeout: Duration,
}

impl RedisBackend {
    pub(crate) async fn connect(url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::open(url)?;
        let mut connection = client.get_multiplexed_async_connection().await?;

        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        debug!("redis connection established");

        Ok(Self {
            connection,
            timeout,
        })
    }

    async fn run<T, F>(&self, operation: F) -> Result<T, Error>
    where
        F: Future<Output = RedisResult<T>> + Send,
    {
        bounded(self.timeout, operation).await
    }
}

/// Runs a single command, folding both command errors and an elapsed
/// `timeout` into [`Error::StoreUnavailable`].
async fn bounded<T, F>(timeout: Duration, operation: F) -> Result<T, Error>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!("redis command failed: {}", e);
            Err(Error::StoreUnavailable(e.to_string()))
        }
        Err(_) => {
            warn!("redis command timed out after {:?}", timeout);
            Err(Error::StoreUnavailable("timed out".into()))
        }
    }
}

/// PSETEX refuses a zero expiry, so sub-millisecond TTLs round up.
fn expiry_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl KeyValueBackend for RedisBackend {
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), Error> {
        let mut connection = self.connection.clone();
        let milliseconds = expiry_millis(ttl);

        self.run(async move { connection.pset_ex(key, value, milliseconds).await })
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut connection = self.connection.clone();

        self.run(async move { connection.get(key).await }).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let mut connection = self.connection.clone();

        self.run(async move { connection.del(key).await }).await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), Error> {
        let mut connection = self.connection.clone();

        self.run(async move { connection.sadd(key, member).await })
            .await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), Error> {
        let mut connection = self.connection.clone();

        self.run(async move { connection.srem(key, member).await })
            .await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, Error> {
        let mut connection = self.connection.clone();

        self.run(async move { connection.smembers(key).await }).await
    }

    async fn ping(&self) -> Result<(), Error> {
        let mut connection = self.connection.clone();

        let _: String = self
            .run(async move { redis::cmd("PING").query_async(&mut connection).await })
            .await?;

        Ok(())
    }
}
