//! Persistence contract for identities and their single stored refresh token.
//!
//! Every mutation of the stored refresh token goes through one of three
//! primitives: an unconditional [`IdentityStore::set_refresh_token`] (fresh
//! login), an unconditional [`IdentityStore::clear_refresh_token`] (logout), or
//! the atomic [`IdentityStore::compare_and_replace`] (rotation). There is no
//! read-then-write path.

use uuid::Uuid;

use crate::auth::AuthResult;
use crate::models::{Identity, NewIdentity};

pub mod memory;
pub mod postgres;

pub use memory::MemoryIdentityStore;
pub use postgres::PgIdentityStore;

pub const DUPLICATE_IDENTITY_MESSAGE: &str = "User with email or username already exists";

#[rocket::async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Identity>>;

    /// Look up by username or email; whichever is given. Both are matched
    /// against their lower-cased stored form.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> AuthResult<Option<Identity>>;

    /// Create an identity. Fails with `Conflict` when the username or email is taken.
    async fn insert(&self, new_identity: NewIdentity) -> AuthResult<Identity>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AuthResult<()>;

    /// Change full name and email. Fails with `Conflict` when the email belongs
    /// to another identity and `NotFound` when `id` is unknown.
    async fn update_account(&self, id: Uuid, full_name: &str, email: &str)
    -> AuthResult<Identity>;

    async fn get_stored_refresh_token(&self, id: Uuid) -> AuthResult<Option<String>>;

    async fn set_refresh_token(&self, id: Uuid, token: &str) -> AuthResult<()>;

    async fn clear_refresh_token(&self, id: Uuid) -> AuthResult<()>;

    /// Replace the stored token with `new_token` only if it currently equals
    /// `expected`. Returns whether the swap happened; on `false` nothing changed.
    async fn compare_and_replace(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
    ) -> AuthResult<bool>;
}
