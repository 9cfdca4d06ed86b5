use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::error::Error;
use crate::token::backend::{Backend, KeyValueBackend};

/// Server-side record of a live credential.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenMetadata {
    pub(crate) subject: String,
    pub(crate) issued_at: i64,
    pub(crate) expires_at: i64,
}

impl TokenMetadata {
    /// Validity left at `now` (unix seconds), `None` once expired.
    pub(crate) fn remaining(&self, now: i64) -> Option<Duration> {
        match self.expires_at - now {
            secs if secs > 0 => Some(Duration::from_secs(secs as u64)),
            _ => None,
        }
    }
}

/// Metadata keyed by credential identity, plus a per-subject index of
/// identities used for mass revocation.
#[derive(Clone)]
pub(crate) struct CredentialStore<B = Backend> {
    backend: B,
    prefix: String,
}

impl<B: KeyValueBackend> CredentialStore<B> {
    pub(crate) fn new(backend: B, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    fn token_key(&self, identity: &str) -> String {
        format!("{}token:{}", self.prefix, identity)
    }

    fn index_key(&self, subject: &str) -> String {
        format!("{}subject-index:{}", self.prefix, subject)
    }

    #[instrument(skip(self, metadata), fields(subject = %metadata.subject))]
    pub(crate) async fn put(
        &self,
        identity: &str,
        metadata: &TokenMetadata,
        ttl: Duration,
    ) -> Result<(), Error> {
        let value = serde_json::to_string(metadata)?;

        // index first: a stale index entry is harmless, a live credential
        // missing from the index would survive revoke-all
        self.backend
            .set_add(&self.index_key(&metadata.subject), identity)
            .await?;
        self.backend
            .set_with_ttl(&self.token_key(identity), value, ttl)
            .await
    }

    pub(crate) async fn get(&self, identity: &str) -> Result<Option<TokenMetadata>, Error> {
        match self.backend.get(&self.token_key(identity)).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub(crate) async fn delete(&self, identity: &str, subject: &str) -> Result<(), Error> {
        self.backend.delete(&self.token_key(identity)).await?;
        self.backend
            .set_remove(&self.index_key(subject), identity)
            .await
    }

    /// Deletes every credential indexed under `subject`, then the index.
    /// Not atomic: an interrupted call leaves already-deleted credentials
    /// revoked and can be retried to completion.
    #[instrument(skip(self))]
    pub(crate) async fn delete_all_for_subject(&self, subject: &str) -> Result<usize, Error> {
        let index_key = self.index_key(subject);
        let identities = self.backend.set_members(&index_key).await?;

        for identity in &identities {
            self.backend.delete(&self.token_key(identity)).await?;
        }

        self.backend.delete(&index_key).await?;

        debug!("deleted {} credentials", identities.len());

        Ok(identities.len())
    }

    pub(crate) async fn ping(&self) -> Result<(), Error> {
        self.backend.ping().await
    }
}
