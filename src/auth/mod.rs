//! Authentication module: configuration, credential handling, token minting,
//! session rotation, Rocket request guards, and HTTP route handlers.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod passwords;
pub mod responses;
pub mod routes;
pub mod sessions;
pub mod store;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::AuthUser;
pub use jwt::JwtService;
pub use passwords::PasswordService;
pub use sessions::{LoginOutcome, TokenPair};
pub use store::IdentityStore;

/// Everything an auth operation needs, built once at ignition and shared
/// through Rocket managed state.
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub password_service: Arc<PasswordService>,
    pub jwt_service: Arc<JwtService>,
    pub store: Arc<dyn IdentityStore>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        password_service: PasswordService,
        jwt_service: JwtService,
        store: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            config,
            password_service: Arc::new(password_service),
            jwt_service: Arc::new(jwt_service),
            store,
        }
    }

    /// Build the services described by `config` on top of `store`.
    pub fn from_config(config: AuthConfig, store: Arc<dyn IdentityStore>) -> AuthResult<Self> {
        let password_service = PasswordService::from_config(&config)?;
        let jwt_service = JwtService::from_config(&config)?;
        Ok(Self::new(config, password_service, jwt_service, store))
    }
}
