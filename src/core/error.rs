use axum::BoxError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid setting: {0}")]
    InvalidSetting(&'static str),
    #[error("Database migration error: {0}")]
    DatabaseMigration(#[from] sqlx::migrate::MigrateError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed credential")]
    MalformedCredential,
    #[error("Expired credential")]
    ExpiredCredential,
    #[error("Revoked or unknown credential")]
    RevokedOrUnknownCredential,
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Issuance failed: {0}")]
    IssuanceFailed(#[source] Box<Error>),
    #[error("Credential lifetime must be at least one second")]
    InvalidTtl,
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("No credentials provided")]
    NoCredentials,
    #[error("Missing subject")]
    MissingSubject,
    #[error("Header decode error: {0}")]
    HeaderDecode(#[from] axum::http::header::ToStrError),
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("User already exists")]
    UserAlreadyExists,
    #[error("Invalid username")]
    InvalidUsername,
    #[error("Invalid password: {0}")]
    InvalidPassword(&'static str),
}

impl Error {
    /// Whether this error means the presented credential was refused, as
    /// opposed to the service failing to answer.
    pub(crate) fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::MalformedCredential
                | Error::ExpiredCredential
                | Error::RevokedOrUnknownCredential
                | Error::NoCredentials
                | Error::Unauthorized
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_rejection() {
            tracing::warn!("rejected: {}", self);
        } else {
            tracing::error!("{:?}", self);
        }

        let (status, message) = match self {
            Error::MalformedCredential
            | Error::ExpiredCredential
            | Error::RevokedOrUnknownCredential
            | Error::NoCredentials
            | Error::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated"),
            Error::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable"),
            Error::IssuanceFailed(_)
            | Error::InvalidTtl
            | Error::Jwt(_)
            | Error::Serialize(_)
            | Error::Sql(_)
            | Error::Bcrypt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
            Error::MissingSubject => (StatusCode::BAD_REQUEST, "Missing subject"),
            Error::HeaderDecode(_) => (StatusCode::BAD_REQUEST, "Invalid header"),
            Error::UserAlreadyExists => (StatusCode::CONFLICT, "User already exists"),
            Error::InvalidUsername => (StatusCode::BAD_REQUEST, "Invalid username"),
            Error::InvalidPassword(reason) => (StatusCode::BAD_REQUEST, reason),
        };

        (status, message).into_response()
    }
}

pub(crate) async fn handle_middleware_errors(err: BoxError) -> (StatusCode, &'static str) {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("request timed out");
        return (StatusCode::REQUEST_TIMEOUT, "Request timed out");
    }

    tracing::error!("Unhandled error: {:?}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}
