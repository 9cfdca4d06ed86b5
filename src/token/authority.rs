use chrono::Utc;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use crate::core::error::Error;
use crate::token::backend::{Backend, KeyValueBackend};
use crate::token::signer::Signer;
use crate::token::store::{CredentialStore, TokenMetadata};

/// Store identity of a credential: hex SHA-256 of the credential string.
pub(crate) fn credential_identity(credential: &str) -> String {
    hex::encode(Sha256::digest(credential.as_bytes()))
}

#[derive(Debug, Clone)]
pub(crate) struct IssuedToken {
    pub(crate) credential: String,
    pub(crate) metadata: TokenMetadata,
}

impl IssuedToken {
    pub(crate) fn expires_in(&self) -> i64 {
        self.metadata.expires_at - self.metadata.issued_at
    }
}

/// Reconciles signed credentials with the credential store.
///
/// The signature proves a credential's content is authentic; the store entry
/// proves it is still live. A credential is accepted only when both agree.
/// No in-process state is kept, so clones can be shared freely between
/// request handlers.
#[derive(Clone)]
pub(crate) struct TokenAuthority<B = Backend> {
    signer: Signer,
    store: CredentialStore<B>,
    ttl: Duration,
}

impl<B: KeyValueBackend> TokenAuthority<B> {
    pub(crate) fn new(signer: Signer, store: CredentialStore<B>, ttl: Duration) -> Self {
        Self { signer, store, ttl }
    }

    pub(crate) fn store(&self) -> &CredentialStore<B> {
        &self.store
    }

    #[instrument(skip(self))]
    pub(crate) async fn issue(&self, subject: &str) -> Result<IssuedToken, Error> {
        self.try_issue(subject).await.map_err(|e| {
            error!("issuance failed: {}", e);
            Error::IssuanceFailed(Box::new(e))
        })
    }

    async fn try_issue(&self, subject: &str) -> Result<IssuedToken, Error> {
        let (credential, claims) = self.signer.sign(subject, self.ttl)?;

        let metadata = TokenMetadata {
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        };
        let ttl = metadata
            .remaining(Utc::now().timestamp())
            .ok_or(Error::InvalidTtl)?;

        self.store
            .put(&credential_identity(&credential), &metadata, ttl)
            .await?;

        info!("issued credential");

        Ok(IssuedToken {
            credential,
            metadata,
        })
    }

    /// Returns the credential's subject if it is authentic, unexpired and
    /// still present in the store.
    #[instrument(skip_all)]
    pub(crate) async fn validate(&self, credential: &str) -> Result<String, Error> {
        let claims = self.signer.verify(credential)?;

        let metadata = self
            .store
            .get(&credential_identity(credential))
            .await?
            .ok_or(Error::RevokedOrUnknownCredential)?;

        if metadata.subject != claims.sub {
            return Err(Error::RevokedOrUnknownCredential);
        }

        // the store's own expiry may lag behind this process's clock
        if Utc::now().timestamp() > metadata.expires_at {
            return Err(Error::ExpiredCredential);
        }

        Ok(metadata.subject)
    }

    /// Revokes a single credential. Malformed, unknown and already revoked
    /// credentials all succeed; only store failures are reported.
    #[instrument(skip_all)]
    pub(crate) async fn revoke(&self, credential: &str) -> Result<(), Error> {
        if let Err(e) = self.signer.decode_ignoring_expiry(credential) {
            debug!("nothing to revoke: {}", e);
            return Ok(());
        }

        let identity = credential_identity(credential);

        match self.store.get(&identity).await? {
            Some(metadata) => {
                self.store.delete(&identity, &metadata.subject).await?;
                info!(subject = %metadata.subject, "revoked credential");
            }
            None => debug!("credential already revoked or unknown"),
        }

        Ok(())
    }

    /// `subject` must come from the caller's verified identity.
    #[instrument(skip(self))]
    pub(crate) async fn revoke_all(&self, subject: &str) -> Result<usize, Error> {
        let revoked = self.store.delete_all_for_subject(subject).await?;

        info!("revoked {} credentials", revoked);

        Ok(revoked)
    }

    /// Exchanges a valid credential for a fresh one. The successor is issued
    /// before the original is revoked, so a failure in between leaves two
    /// live credentials rather than none.
    #[instrument(skip_all)]
    pub(crate) async fn refresh(&self, credential: &str) -> Result<IssuedToken, Error> {
        let subject = self.validate(credential).await?;

        let issued = self.issue(&subject).await?;

        self.revoke(credential).await?;

        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::backend::MemoryBackend;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    const SECRET: &str = "test-secret";

    fn authority() -> TokenAuthority<MemoryBackend> {
        TokenAuthority::new(
            Signer::new(SECRET),
            CredentialStore::new(MemoryBackend::new(), "test:"),
            Duration::from_secs(3600),
        )
    }

    fn tamper(credential: &str) -> String {
        let mut bytes = credential.as_bytes().to_vec();
        let index = bytes.len() - 10;
        bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).unwrap()
    }

    /// Memory backend whose writes or reads can be switched off. With
    /// `yield_reads` set, every `get` yields to the scheduler first so that
    /// concurrent callers interleave at the store boundary.
    #[derive(Clone, Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_writes: Arc<AtomicBool>,
        fail_reads: Arc<AtomicBool>,
        fail_deletes: Arc<AtomicBool>,
        yield_reads: Arc<AtomicBool>,
    }

    impl FlakyBackend {
        fn check(flag: &AtomicBool) -> Result<(), Error> {
            match flag.load(Ordering::SeqCst) {
                true => Err(Error::StoreUnavailable("connection refused".into())),
                false => Ok(()),
            }
        }
    }

    #[async_trait]
    impl KeyValueBackend for FlakyBackend {
        async fn set_with_ttl(
            &self,
            key: &str,
            value: String,
            ttl: Duration,
        ) -> Result<(), Error> {
            Self::check(&self.fail_writes)?;
            self.inner.set_with_ttl(key, value, ttl).await
        }

        async fn get(&self, key: &str) -> Result<Option<String>, Error> {
            Self::check(&self.fail_reads)?;
            if self.yield_reads.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), Error> {
            Self::check(&self.fail_deletes)?;
            self.inner.delete(key).await
        }

        async fn set_add(&self, key: &str, member: &str) -> Result<(), Error> {
            Self::check(&self.fail_writes)?;
            self.inner.set_add(key, member).await
        }

        async fn set_remove(&self, key: &str, member: &str) -> Result<(), Error> {
            self.inner.set_remove(key, member).await
        }

        async fn set_members(&self, key: &str) -> Result<Vec<String>, Error> {
            Self::check(&self.fail_reads)?;
            self.inner.set_members(key).await
        }

        async fn ping(&self) -> Result<(), Error> {
            Self::check(&self.fail_reads)
        }
    }

    fn flaky_authority() -> (TokenAuthority<FlakyBackend>, FlakyBackend) {
        let backend = FlakyBackend::default();
        let authority = TokenAuthority::new(
            Signer::new(SECRET),
            CredentialStore::new(backend.clone(), "test:"),
            Duration::from_secs(3600),
        );
        (authority, backend)
    }

    #[test]
    fn test_identity_is_stable() {
        assert_eq!(credential_identity("abc"), credential_identity("abc"));
        assert_ne!(credential_identity("abc"), credential_identity("abd"));
        assert_eq!(credential_identity("abc").len(), 64);
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let authority = authority();
        let issued = authority.issue("u1").await.unwrap();

        assert_eq!(issued.metadata.subject, "u1");
        assert_eq!(issued.expires_in(), 3600);
        assert_eq!(authority.validate(&issued.credential).await.unwrap(), "u1");
    }

    #[tokio::test]
    async fn test_revoke_then_validate() {
        let authority = authority();
        let issued = authority.issue("u1").await.unwrap();

        authority.revoke(&issued.credential).await.unwrap();

        assert!(matches!(
            authority.validate(&issued.credential).await,
            Err(Error::RevokedOrUnknownCredential)
        ));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let authority = authority();
        let issued = authority.issue("u1").await.unwrap();

        authority.revoke(&issued.credential).await.unwrap();
        authority.revoke(&issued.credential).await.unwrap();

        // authentic but never stored
        let (unknown, _) = Signer::new(SECRET)
            .sign("u2", Duration::from_secs(60))
            .unwrap();
        authority.revoke(&unknown).await.unwrap();

        authority.revoke("garbage").await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_expired_but_stored_credential() {
        let authority = authority();
        let (credential, claims) = authority
            .signer
            .sign_at(
                "u1",
                Utc::now() - TimeDelta::hours(2),
                Duration::from_secs(3600),
                "jti".into(),
            )
            .unwrap();
        let identity = credential_identity(&credential);
        let metadata = TokenMetadata {
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        };
        authority
            .store
            .put(&identity, &metadata, Duration::from_secs(60))
            .await
            .unwrap();

        authority.revoke(&credential).await.unwrap();

        assert_eq!(authority.store.get(&identity).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh() {
        let authority = authority();
        let original = authority.issue("u1").await.unwrap();

        let refreshed = authority.refresh(&original.credential).await.unwrap();

        assert_ne!(refreshed.credential, original.credential);
        assert_eq!(
            authority.validate(&refreshed.credential).await.unwrap(),
            "u1"
        );
        assert!(matches!(
            authority.validate(&original.credential).await,
            Err(Error::RevokedOrUnknownCredential)
        ));
    }

    #[tokio::test]
    async fn test_refresh_revoked_credential_fails() {
        let authority = authority();
        let original = authority.issue("u1").await.unwrap();
        authority.revoke(&original.credential).await.unwrap();

        assert!(matches!(
            authority.refresh(&original.credential).await,
            Err(Error::RevokedOrUnknownCredential)
        ));
    }

    #[tokio::test]
    async fn test_refresh_keeps_successor_when_revoke_fails() {
        let (authority, backend) = flaky_authority();
        let original = authority.issue("u1").await.unwrap();

        backend.fail_deletes.store(true, Ordering::SeqCst);
        let result = authority.refresh(&original.credential).await;
        backend.fail_deletes.store(false, Ordering::SeqCst);

        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
        // the successor was issued before the failure: nobody is locked out
        assert_eq!(
            authority
                .store
                .delete_all_for_subject("u1")
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_concurrent_refresh_yields_valid_successors() {
        let (authority, backend) = flaky_authority();
        let original = authority.issue("u1").await.unwrap();
        backend.yield_reads.store(true, Ordering::SeqCst);

        // both refreshes validate the original before either revokes it
        let (first, second) = tokio::join!(
            authority.refresh(&original.credential),
            authority.refresh(&original.credential),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_ne!(first.credential, second.credential);
        for successor in [&first, &second] {
            assert_eq!(
                authority.validate(&successor.credential).await.unwrap(),
                "u1"
            );
        }
        assert!(matches!(
            authority.validate(&original.credential).await,
            Err(Error::RevokedOrUnknownCredential)
        ));

        authority.revoke(&first.credential).await.unwrap();
        assert!(authority.validate(&first.credential).await.is_err());
        assert_eq!(
            authority.validate(&second.credential).await.unwrap(),
            "u1"
        );
    }

    #[tokio::test]
    async fn test_revoke_all() {
        let authority = authority();
        let mut credentials = Vec::new();
        for _ in 0..5 {
            credentials.push(authority.issue("u1").await.unwrap().credential);
        }
        let other = authority.issue("u2").await.unwrap();

        assert_eq!(authority.revoke_all("u1").await.unwrap(), 5);

        for credential in &credentials {
            assert!(matches!(
                authority.validate(credential).await,
                Err(Error::RevokedOrUnknownCredential)
            ));
        }
        assert_eq!(authority.validate(&other.credential).await.unwrap(), "u2");
    }

    #[tokio::test]
    async fn test_revoke_all_is_retryable() {
        let authority = authority();
        authority.issue("u1").await.unwrap();

        assert_eq!(authority.revoke_all("u1").await.unwrap(), 1);
        assert_eq!(authority.revoke_all("u1").await.unwrap(), 0);
        assert_eq!(authority.revoke_all("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_claims_rejected_even_if_stored() {
        let authority = authority();
        let (credential, claims) = authority
            .signer
            .sign_at(
                "u1",
                Utc::now() - TimeDelta::hours(2),
                Duration::from_secs(3600),
                "jti".into(),
            )
            .unwrap();
        let metadata = TokenMetadata {
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        };
        authority
            .store
            .put(
                &credential_identity(&credential),
                &metadata,
                Duration::from_secs(3600),
            )
            .await
            .unwrap();

        assert!(matches!(
            authority.validate(&credential).await,
            Err(Error::ExpiredCredential)
        ));
    }

    #[tokio::test]
    async fn test_expired_metadata_rejected() {
        let authority = authority();
        let (credential, claims) = authority
            .signer
            .sign("u1", Duration::from_secs(3600))
            .unwrap();
        let metadata = TokenMetadata {
            subject: claims.sub,
            issued_at: claims.iat - 7200,
            expires_at: claims.iat - 3600,
        };
        authority
            .store
            .put(
                &credential_identity(&credential),
                &metadata,
                Duration::from_secs(3600),
            )
            .await
            .unwrap();

        assert!(matches!(
            authority.validate(&credential).await,
            Err(Error::ExpiredCredential)
        ));
    }

    #[tokio::test]
    async fn test_subject_mismatch_rejected() {
        let authority = authority();
        let (credential, claims) = authority
            .signer
            .sign("u1", Duration::from_secs(3600))
            .unwrap();
        let metadata = TokenMetadata {
            subject: "u2".into(),
            issued_at: claims.iat,
            expires_at: claims.exp,
        };
        authority
            .store
            .put(
                &credential_identity(&credential),
                &metadata,
                Duration::from_secs(3600),
            )
            .await
            .unwrap();

        assert!(matches!(
            authority.validate(&credential).await,
            Err(Error::RevokedOrUnknownCredential)
        ));
    }

    #[tokio::test]
    async fn test_issue_fails_when_store_write_fails() {
        let (authority, backend) = flaky_authority();
        backend.fail_writes.store(true, Ordering::SeqCst);

        let result = authority.issue("u1").await;

        assert!(matches!(
            result,
            Err(Error::IssuanceFailed(inner)) if matches!(*inner, Error::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_credential_never_reaches_store() {
        let (authority, backend) = flaky_authority();
        let issued = authority.issue("u1").await.unwrap();
        backend.fail_reads.store(true, Ordering::SeqCst);
        backend.fail_deletes.store(true, Ordering::SeqCst);

        let tampered = tamper(&issued.credential);

        assert!(matches!(
            authority.validate(&tampered).await,
            Err(Error::MalformedCredential)
        ));
        authority.revoke(&tampered).await.unwrap();
        assert!(matches!(
            authority.validate(&issued.credential).await,
            Err(Error::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_scenario() {
        let authority = authority();
        let issued = authority.issue("u1").await.unwrap();
        assert_eq!(authority.validate(&issued.credential).await.unwrap(), "u1");

        let tampered = tamper(&issued.credential);
        assert!(matches!(
            authority.validate(&tampered).await,
            Err(Error::MalformedCredential)
        ));
        authority.revoke(&tampered).await.unwrap();

        let refreshed = authority.refresh(&issued.credential).await.unwrap();
        assert_ne!(refreshed.credential, issued.credential);
        assert!(authority.validate(&issued.credential).await.is_err());
        assert_eq!(
            authority.validate(&refreshed.credential).await.unwrap(),
            "u1"
        );
    }
}
