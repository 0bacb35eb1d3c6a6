use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::auth::store::{DUPLICATE_IDENTITY_MESSAGE, IdentityStore};
use crate::auth::{AuthError, AuthResult};
use crate::models::{Identity, NewIdentity};

/// Process-local identity store. Writes take the lock for the whole
/// check-and-mutate step, so compare-and-replace is atomic.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identities: RwLock<HashMap<Uuid, Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop an identity outright. Used by tests to simulate deleted accounts.
    pub fn remove(&self, id: Uuid) -> Option<Identity> {
        self.identities.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.identities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.read().is_empty()
    }
}

#[rocket::async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Identity>> {
        Ok(self.identities.read().get(&id).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> AuthResult<Option<Identity>> {
        let username = username.map(str::to_lowercase);
        let email = email.map(str::to_lowercase);
        let identities = self.identities.read();
        let found = identities.values().find(|identity| {
            username.as_deref() == Some(identity.username.as_str())
                || email.as_deref() == Some(identity.email.as_str())
        });
        Ok(found.cloned())
    }

    async fn insert(&self, new_identity: NewIdentity) -> AuthResult<Identity> {
        let mut identities = self.identities.write();
        let taken = identities.values().any(|existing| {
            existing.username == new_identity.username || existing.email == new_identity.email
        });
        if taken {
            return Err(AuthError::Conflict(DUPLICATE_IDENTITY_MESSAGE.into()));
        }

        let now = Utc::now();
        let identity = Identity {
            id: Uuid::new_v4(),
            username: new_identity.username,
            email: new_identity.email,
            full_name: new_identity.full_name,
            password_hash: new_identity.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AuthResult<()> {
        let mut identities = self.identities.write();
        let identity = identities
            .get_mut(&id)
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        identity.password_hash = password_hash.to_string();
        identity.updated_at = Utc::now();
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> AuthResult<Identity> {
        let mut identities = self.identities.write();
        if identities
            .values()
            .any(|other| other.id != id && other.email == email)
        {
            return Err(AuthError::Conflict(DUPLICATE_IDENTITY_MESSAGE.into()));
        }
        let identity = identities
            .get_mut(&id)
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        identity.full_name = full_name.to_string();
        identity.email = email.to_string();
        identity.updated_at = Utc::now();
        Ok(identity.clone())
    }

    async fn get_stored_refresh_token(&self, id: Uuid) -> AuthResult<Option<String>> {
        Ok(self
            .identities
            .read()
            .get(&id)
            .and_then(|identity| identity.refresh_token.clone()))
    }

    async fn set_refresh_token(&self, id: Uuid, token: &str) -> AuthResult<()> {
        let mut identities = self.identities.write();
        let identity = identities
            .get_mut(&id)
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        identity.refresh_token = Some(token.to_string());
        Ok(())
    }

    async fn clear_refresh_token(&self, id: Uuid) -> AuthResult<()> {
        if let Some(identity) = self.identities.write().get_mut(&id) {
            identity.refresh_token = None;
        }
        Ok(())
    }

    async fn compare_and_replace(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
    ) -> AuthResult<bool> {
        let mut identities = self.identities.write();
        match identities.get_mut(&id) {
            Some(identity) if identity.refresh_token.as_deref() == Some(expected) => {
                identity.refresh_token = Some(new_token.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
