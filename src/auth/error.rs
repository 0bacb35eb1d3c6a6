use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Message returned for every authentication failure, whatever the cause.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized request";
/// Message returned for every unexpected failure.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token invalid")]
    TokenInvalid,
    #[error("refresh token does not match the stored session")]
    SessionMismatch,
    #[error("refresh token was rotated concurrently")]
    RotationConflict,
    #[error("unauthorized")]
    Unauthorized,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Sqlx(#[from] rocket_db_pools::sqlx::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::Validation(_) => Status::BadRequest,
            AuthError::Conflict(_) => Status::Conflict,
            AuthError::NotFound(_) => Status::NotFound,
            AuthError::InvalidCredentials
            | AuthError::TokenInvalid
            | AuthError::SessionMismatch
            | AuthError::RotationConflict
            | AuthError::Unauthorized => Status::Unauthorized,
            AuthError::Config(_)
            | AuthError::Sqlx(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Join(_)
            | AuthError::Other(_) => Status::InternalServerError,
        }
    }

    /// Text safe to put in a response body. Authentication and internal
    /// failures collapse to a fixed message so callers cannot tell which
    /// check rejected them.
    pub fn public_message(&self) -> String {
        match self.status().code {
            401 => UNAUTHORIZED_MESSAGE.to_string(),
            500 => INTERNAL_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Status::Unauthorized
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
