use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::core::error::Error;

/// The signed claim set carried inside every credential.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
    pub(crate) jti: String,
}

/// Produces and checks HS256 credentials. Holds no state beyond the key.
#[derive(Clone)]
pub(crate) struct Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lenient_validation: Validation,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub(crate) fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let mut lenient_validation = validation.clone();
        lenient_validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lenient_validation,
        }
    }

    /// Signs a fresh claim set for `subject` valid for `ttl` from now.
    pub(crate) fn sign(&self, subject: &str, ttl: Duration) -> Result<(String, Claims), Error> {
        self.sign_at(subject, Utc::now(), ttl, Uuid::new_v4().to_string())
    }

    /// Deterministic for identical inputs.
    pub(crate) fn sign_at(
        &self,
        subject: &str,
        issued_at: DateTime<Utc>,
        ttl: Duration,
        jti: String,
    ) -> Result<(String, Claims), Error> {
        let ttl = i64::try_from(ttl.as_secs()).map_err(|_| Error::InvalidTtl)?;
        if ttl == 0 {
            return Err(Error::InvalidTtl);
        }

        let iat = issued_at.timestamp();
        let exp = iat.checked_add(ttl).ok_or(Error::InvalidTtl)?;
        let claims = Claims {
            sub: subject.to_string(),
            iat,
            exp,
            jti,
        };

        let credential =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok((credential, claims))
    }

    /// Checks signature, algorithm, claim shape and expiry. Never touches the
    /// credential store.
    pub(crate) fn verify(&self, credential: &str) -> Result<Claims, Error> {
        self.decode(credential, &self.validation)
    }

    /// Like [`Signer::verify`] but accepts credentials past their expiry, so
    /// an authentic credential stays addressable for revocation.
    pub(crate) fn decode_ignoring_expiry(&self, credential: &str) -> Result<Claims, Error> {
        self.decode(credential, &self.lenient_validation)
    }

    fn decode(&self, credential: &str, validation: &Validation) -> Result<Claims, Error> {
        let claims =
            match jsonwebtoken::decode::<Claims>(credential, &self.decoding_key, validation) {
                Ok(token_data) => token_data.claims,
                Err(e) => match e.kind() {
                    ErrorKind::ExpiredSignature => return Err(Error::ExpiredCredential),
                    _ => return Err(Error::MalformedCredential),
                },
            };

        if claims.sub.is_empty() || claims.iat >= claims.exp {
            return Err(Error::MalformedCredential);
        }

        Ok(claims)
    }
}
