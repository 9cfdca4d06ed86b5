pub(crate) mod auth;
pub(crate) mod health;
pub(crate) mod router;
pub(crate) mod token;
