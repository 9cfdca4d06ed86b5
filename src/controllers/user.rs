use regex::Regex;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::core::error::{self, Error};
use crate::types::{User, Username};

const BCRYPT_COST: u32 = 12;
const MIN_PASSWORD_LENGTH: usize = 8;

/// Identity lookups and password checks. Only ever hands a subject to the
/// token authority; credentials are issued elsewhere.
#[derive(Clone)]
pub(crate) struct UserController {
    pool: PgPool,
    username_pattern: Regex,
}

impl std::fmt::Debug for UserController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserController")
            .field("username_pattern", &self.username_pattern.as_str())
            .finish()
    }
}

impl UserController {
    pub(crate) fn new(pool: PgPool) -> Result<Self, error::ConfigError> {
        Ok(Self {
            pool,
            username_pattern: Regex::new(r"^[a-zA-Z0-9_-]{3,20}$")?,
        })
    }

    pub(crate) async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        match sqlx::query("SELECT id, username, password_hash FROM users WHERE username = $1;")
            .bind(username)
            .map(map_user)
            .fetch_one(&self.pool)
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(sqlx::Error::RowNotFound) => Ok(None),
            Err(e) => Err(Error::Sql(e)),
        }
    }

    pub(crate) async fn register(&self, username: &str, password: &str) -> Result<User, Error> {
        if !self.username_pattern.is_match(username) {
            return Err(Error::InvalidUsername);
        }

        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::InvalidPassword(
                "Password must be at least 8 characters",
            ));
        }

        let password_hash = bcrypt::hash(password, BCRYPT_COST)?;

        let id: i32 = match sqlx::query(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id;",
        )
        .bind(username)
        .bind(&password_hash)
        .map(|row: PgRow| row.get("id"))
        .fetch_one(&self.pool)
        .await
        {
            Ok(id) => id,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(Error::UserAlreadyExists);
            }
            Err(e) => return Err(Error::Sql(e)),
        };

        tracing::info!(id, "registered user");

        Ok(User {
            id,
            username: Username::from(username),
            password_hash,
        })
    }

    /// Unknown users and wrong passwords are indistinguishable to the caller.
    pub(crate) async fn login(&self, username: &str, password: &str) -> Result<User, Error> {
        let user = self
            .get_user_by_username(username)
            .await?
            .ok_or(Error::Unauthorized)?;

        if !bcrypt::verify(password, &user.password_hash)? {
            return Err(Error::Unauthorized);
        }

        tracing::debug!(id = user.id, username = %user.username, "authenticated user");

        Ok(user)
    }
}

fn map_user(row: PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
    }
}
