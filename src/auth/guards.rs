use rocket::Request;
use rocket::State;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;

use crate::auth::config::ACCESS_COOKIE_NAME;
use crate::auth::{AuthError, AuthResult, AuthState};
use crate::models::PublicIdentity;

/// The caller behind a valid access token. Handlers taking this guard only
/// run once the token has been verified and its identity resolved.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct AuthUser(pub PublicIdentity);

impl AuthUser {
    pub fn identity(&self) -> &PublicIdentity {
        &self.0
    }

    pub fn into_inner(self) -> PublicIdentity {
        self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_user(request).await {
            Ok(user) => Outcome::Success(user),
            Err(err) => {
                log::debug!("rejected {} {}: {}", request.method(), request.uri(), err);
                Outcome::Error((err.status(), err))
            }
        }
    }
}

async fn extract_user(request: &Request<'_>) -> AuthResult<AuthUser> {
    let auth_state = request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthState missing from state".into()))?;

    let token = access_token_from_request(request);
    let identity = auth_state.authorize(token.as_deref()).await?;
    Ok(AuthUser(identity))
}

/// The `accessToken` cookie wins; otherwise a `Bearer` authorization header.
fn access_token_from_request(request: &Request<'_>) -> Option<String> {
    if let Some(cookie) = request.cookies().get(ACCESS_COOKIE_NAME) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    let header = request.headers().get_one("Authorization")?;
    bearer_token(header).map(str::to_string)
}

fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}
