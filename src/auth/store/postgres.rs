use rocket_db_pools::sqlx::{self, PgPool};
use uuid::Uuid;

use crate::auth::store::{DUPLICATE_IDENTITY_MESSAGE, IdentityStore};
use crate::auth::{AuthError, AuthResult};
use crate::models::{Identity, NewIdentity};

const IDENTITY_COLUMNS: &str =
    "id, username, email, full_name, password_hash, refresh_token, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(identity)
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> AuthResult<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM users \
             WHERE ($1::text IS NOT NULL AND username = lower($1)) \
                OR ($2::text IS NOT NULL AND email = lower($2)) \
             LIMIT 1"
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(identity)
    }

    async fn insert(&self, new_identity: NewIdentity) -> AuthResult<Identity> {
        let result = sqlx::query_as::<_, Identity>(&format!(
            "INSERT INTO users (id, username, email, full_name, password_hash) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new_identity.username)
        .bind(&new_identity.email)
        .bind(&new_identity.full_name)
        .bind(&new_identity.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(identity) => Ok(identity),
            Err(err) if is_unique_violation(&err) => {
                Err(AuthError::Conflict(DUPLICATE_IDENTITY_MESSAGE.into()))
            }
            Err(err) => Err(AuthError::from(err)),
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AuthResult<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("User not found".into()));
        }
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> AuthResult<Identity> {
        let result = sqlx::query_as::<_, Identity>(&format!(
            "UPDATE users SET full_name = $1, email = $2, updated_at = now() \
             WHERE id = $3 RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(full_name)
        .bind(email)
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => Err(AuthError::NotFound("User not found".into())),
            Err(err) if is_unique_violation(&err) => {
                Err(AuthError::Conflict(DUPLICATE_IDENTITY_MESSAGE.into()))
            }
            Err(err) => Err(AuthError::from(err)),
        }
    }

    async fn get_stored_refresh_token(&self, id: Uuid) -> AuthResult<Option<String>> {
        let token =
            sqlx::query_scalar::<_, Option<String>>("SELECT refresh_token FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(token.flatten())
    }

    async fn set_refresh_token(&self, id: Uuid, token: &str) -> AuthResult<()> {
        let result = sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("User not found".into()));
        }
        Ok(())
    }

    async fn clear_refresh_token(&self, id: Uuid) -> AuthResult<()> {
        sqlx::query("UPDATE users SET refresh_token = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn compare_and_replace(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
    ) -> AuthResult<bool> {
        // Single statement: the row lock taken by UPDATE serializes competing rotations.
        let result = sqlx::query(
            "UPDATE users SET refresh_token = $1 WHERE id = $2 AND refresh_token = $3",
        )
        .bind(new_token)
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err
                .code()
                .map(|code| code == "23505")
                .unwrap_or(false)
    )
}
