use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, get, patch, post};
use rocket_okapi::openapi;
use time::Duration as TimeDuration;

use crate::auth::config::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use crate::auth::guards::AuthUser;
use crate::auth::responses::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    RegisterRequest, UpdateAccountRequest,
};
use crate::auth::{AuthConfig, AuthState, TokenPair};
use crate::error::{ApiResult, ErrorReply, respond_error};
use crate::models::{ApiResponse, PublicIdentity};

#[openapi(tag = "Users")]
#[post("/users/register", data = "<payload>")]
pub async fn register(
    state: &State<AuthState>,
    payload: Json<RegisterRequest>,
) -> Result<status::Custom<Json<ApiResponse<PublicIdentity>>>, ErrorReply> {
    let user = state.register(&payload).await.map_err(respond_error)?;

    Ok(status::Custom(
        Status::Created,
        Json(ApiResponse::with_status(
            Status::Created,
            "User registered successfully",
            user,
        )),
    ))
}

#[openapi(tag = "Users")]
#[post("/users/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
    payload: Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let outcome = state.login(&payload).await.map_err(respond_error)?;

    set_session_cookies(cookies, &state.config, &outcome.tokens);

    Ok(Json(ApiResponse::ok(
        "User logged in successfully",
        LoginResponse {
            user: outcome.user,
            access_token: outcome.tokens.access_token.token,
            refresh_token: outcome.tokens.refresh_token.token,
            access_token_expires_at: outcome.tokens.access_token.expires_at,
            refresh_token_expires_at: outcome.tokens.refresh_token.expires_at,
        },
    )))
}

#[openapi(tag = "Users")]
#[post("/users/logout")]
pub async fn logout(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
    user: AuthUser,
) -> ApiResult<()> {
    state
        .logout(user.identity().id)
        .await
        .map_err(respond_error)?;

    clear_session_cookies(cookies);

    Ok(Json(ApiResponse::ok("User logged out successfully", ())))
}

#[openapi(tag = "Users")]
#[post("/users/refresh-token", data = "<payload>")]
pub async fn refresh(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
    payload: Option<Json<RefreshRequest>>,
) -> ApiResult<RefreshResponse> {
    let incoming = cookies
        .get(REFRESH_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| payload.and_then(|body| body.into_inner().refresh_token));

    let tokens = state
        .rotate(incoming.as_deref())
        .await
        .map_err(respond_error)?;

    set_session_cookies(cookies, &state.config, &tokens);

    Ok(Json(ApiResponse::ok(
        "Access token refreshed successfully",
        RefreshResponse {
            access_token: tokens.access_token.token,
            refresh_token: tokens.refresh_token.token,
            access_token_expires_at: tokens.access_token.expires_at,
            refresh_token_expires_at: tokens.refresh_token.expires_at,
        },
    )))
}

#[openapi(tag = "Users")]
#[post("/users/change-password", data = "<payload>")]
pub async fn change_password(
    state: &State<AuthState>,
    user: AuthUser,
    payload: Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    state
        .change_password(
            user.identity().id,
            &payload.old_password,
            &payload.new_password,
        )
        .await
        .map_err(respond_error)?;

    Ok(Json(ApiResponse::ok("Password changed successfully", ())))
}

#[openapi(tag = "Users")]
#[get("/users/current-user")]
pub async fn current_user(user: AuthUser) -> ApiResult<PublicIdentity> {
    Ok(Json(ApiResponse::ok(
        "Current user fetched successfully",
        user.into_inner(),
    )))
}

#[openapi(tag = "Users")]
#[patch("/users/update-account", data = "<payload>")]
pub async fn update_account(
    state: &State<AuthState>,
    user: AuthUser,
    payload: Json<UpdateAccountRequest>,
) -> ApiResult<PublicIdentity> {
    let updated = state
        .update_account(user.identity().id, &payload.full_name, &payload.email)
        .await
        .map_err(respond_error)?;

    Ok(Json(ApiResponse::ok(
        "Account details updated successfully",
        updated,
    )))
}

fn set_session_cookies(cookies: &CookieJar<'_>, config: &AuthConfig, tokens: &TokenPair) {
    for (name, value, ttl_secs) in [
        (
            ACCESS_COOKIE_NAME,
            &tokens.access_token.token,
            config.access_token_ttl_secs,
        ),
        (
            REFRESH_COOKIE_NAME,
            &tokens.refresh_token.token,
            config.refresh_token_ttl_secs,
        ),
    ] {
        let cookie = Cookie::build((name, value.clone()))
            .path("/")
            .http_only(config.cookie_http_only)
            .secure(config.cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::seconds(ttl_secs.max(0)))
            .build();
        cookies.add(cookie);
    }
}

fn clear_session_cookies(cookies: &CookieJar<'_>) {
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        let cookie = Cookie::build((name, String::new()))
            .path("/")
            .removal()
            .build();
        cookies.add(cookie);
    }
}
