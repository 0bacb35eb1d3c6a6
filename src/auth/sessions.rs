//! Session lifecycle: registration, login, request authorization, refresh
//! token rotation, and logout.
//!
//! A session is the single refresh token stored for an identity. Login
//! overwrites it, rotation swaps it atomically, logout clears it. Access
//! tokens are never recorded; they stay valid until their own expiry.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::jwt::{SignedToken, subject_id};
use crate::auth::responses::{LoginRequest, RegisterRequest};
use crate::auth::{AuthError, AuthResult, AuthState};
use crate::models::{Identity, NewIdentity, PublicIdentity};

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: SignedToken,
    pub refresh_token: SignedToken,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicIdentity,
    pub tokens: TokenPair,
}

impl AuthState {
    pub async fn register(&self, request: &RegisterRequest) -> AuthResult<PublicIdentity> {
        let username = request.user_name.trim().to_lowercase();
        let full_name = request.full_name.trim().to_string();
        let email = normalize_email(&request.email)?;

        if username.is_empty() || full_name.is_empty() || request.password.trim().is_empty() {
            return Err(AuthError::Validation("All fields are required".into()));
        }

        if self
            .store
            .find_by_username_or_email(Some(&username), Some(&email))
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict(
                crate::auth::store::DUPLICATE_IDENTITY_MESSAGE.into(),
            ));
        }

        let password_hash = self.hash_password(&request.password).await?;
        let identity = self
            .store
            .insert(NewIdentity {
                username,
                email,
                full_name,
                password_hash,
            })
            .await?;

        log::info!("registered identity {}", identity.id);
        Ok(identity.into())
    }

    pub async fn login(&self, request: &LoginRequest) -> AuthResult<LoginOutcome> {
        let username = non_blank(request.user_name.as_deref()).map(str::to_lowercase);
        let email = non_blank(request.email.as_deref()).map(str::to_lowercase);

        if username.is_none() && email.is_none() {
            return Err(AuthError::Validation("Username or email is required".into()));
        }
        if request.password.trim().is_empty() {
            return Err(AuthError::Validation("Password is required".into()));
        }

        let identity = self
            .store
            .find_by_username_or_email(username.as_deref(), email.as_deref())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .verify_password(&request.password, &identity.password_hash)
            .await?
        {
            log::info!("rejected login for identity {}: wrong password", identity.id);
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_pair(&identity)?;
        self.store
            .set_refresh_token(identity.id, &tokens.refresh_token.token)
            .await?;

        log::info!("identity {} logged in", identity.id);
        Ok(LoginOutcome {
            user: identity.into(),
            tokens,
        })
    }

    /// Resolve an access token to the identity it names. Read-only: the
    /// stored refresh token is never touched here.
    pub async fn authorize(&self, raw_token: Option<&str>) -> AuthResult<PublicIdentity> {
        let raw_token = non_blank(raw_token).ok_or(AuthError::Unauthorized)?;
        let claims = self.jwt_service.decode_access_token(raw_token)?;
        let id = subject_id(&claims.sub)?;

        match self.store.find_by_id(id).await? {
            Some(identity) => Ok(identity.into()),
            None => {
                log::debug!("access token names unknown identity {}", id);
                Err(AuthError::Unauthorized)
            }
        }
    }

    /// Exchange the current refresh token for a new pair, invalidating it.
    pub async fn rotate(&self, incoming: Option<&str>) -> AuthResult<TokenPair> {
        let incoming = non_blank(incoming).ok_or(AuthError::Unauthorized)?;
        let claims = self.jwt_service.decode_refresh_token(incoming)?;
        let id = subject_id(&claims.sub)?;

        let identity = match self.store.find_by_id(id).await? {
            Some(identity) => identity,
            None => {
                log::debug!("refresh token names unknown identity {}", id);
                return Err(AuthError::Unauthorized);
            }
        };

        if identity.refresh_token.as_deref() != Some(incoming) {
            log::warn!(
                "refresh token for identity {} is not the stored session; possible reuse",
                id
            );
            return Err(AuthError::SessionMismatch);
        }

        let tokens = self.issue_pair(&identity)?;
        let swapped = self
            .store
            .compare_and_replace(id, incoming, &tokens.refresh_token.token)
            .await?;

        if !swapped {
            log::warn!("refresh token for identity {} was rotated concurrently", id);
            return Err(AuthError::RotationConflict);
        }

        log::info!("rotated session for identity {}", id);
        Ok(tokens)
    }

    pub async fn logout(&self, id: Uuid) -> AuthResult<()> {
        self.store.clear_refresh_token(id).await?;
        log::info!("identity {} logged out", id);
        Ok(())
    }

    pub async fn change_password(
        &self,
        id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        if old_password.trim().is_empty() || new_password.trim().is_empty() {
            return Err(AuthError::Validation(
                "Old password and new password are required".into(),
            ));
        }

        let identity = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if !self
            .verify_password(old_password, &identity.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = self.hash_password(new_password).await?;
        self.store.update_password(id, &password_hash).await?;
        log::info!("identity {} changed password", id);
        Ok(())
    }

    pub async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> AuthResult<PublicIdentity> {
        let full_name = full_name.trim();
        if full_name.is_empty() || email.trim().is_empty() {
            return Err(AuthError::Validation("Full name and email are required".into()));
        }
        let email = normalize_email(email)?;

        let identity = self.store.update_account(id, full_name, &email).await?;
        Ok(identity.into())
    }

    fn issue_pair(&self, identity: &Identity) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.jwt_service.issue_access_token(identity)?,
            refresh_token: self.jwt_service.issue_refresh_token(identity)?,
        })
    }

    async fn hash_password(&self, password: &str) -> AuthResult<String> {
        let service = Arc::clone(&self.password_service);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || service.hash_password(&password)).await?
    }

    async fn verify_password(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        let service = Arc::clone(&self.password_service);
        let password = password.to_string();
        let encoded = encoded.to_string();
        let verified =
            tokio::task::spawn_blocking(move || service.verify_password(&password, &encoded))
                .await?;
        Ok(verified)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn normalize_email(raw: &str) -> AuthResult<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AuthError::Validation("All fields are required".into()));
    }
    if !email.contains('@') {
        return Err(AuthError::Validation("Email must contain '@'".into()));
    }
    Ok(email)
}
