use sqlx::postgres::PgPool;

use crate::controllers::user::UserController;
use crate::core::config::Args;
use crate::core::error::ConfigError;
use crate::token::authority::TokenAuthority;
use crate::token::backend::Backend;
use crate::token::signer::Signer;
use crate::token::store::CredentialStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) authority: TokenAuthority,
    pub(crate) backend_name: &'static str,
    pub(crate) user_controller: UserController,
}

impl AppState {
    pub(crate) fn new(pool: PgPool, backend: Backend, config: &Args) -> Result<Self, ConfigError> {
        let backend_name = backend.name();
        let store = CredentialStore::new(backend, config.store_prefix.clone());

        Ok(AppState {
            authority: TokenAuthority::new(Signer::new(&config.secret), store, config.token_ttl()),
            backend_name,
            user_controller: UserController::new(pool)?,
        })
    }
}
