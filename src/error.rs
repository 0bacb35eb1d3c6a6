//! The single place where typed failures become the wire-level failure envelope.

use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Request, catch};

use crate::auth::AuthError;
use crate::auth::error::{INTERNAL_MESSAGE, UNAUTHORIZED_MESSAGE};
use crate::models::{ApiResponse, ErrorResponse};

pub type ErrorReply = status::Custom<Json<ErrorResponse>>;
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ErrorReply>;

pub fn respond_error(err: AuthError) -> ErrorReply {
    let status = err.status();
    match status.class() {
        rocket::http::StatusClass::ServerError => log::error!("request failed: {}", err),
        _ => log::debug!("request rejected ({}): {}", status.code, err),
    }

    let message = err.public_message();
    let mut body = ErrorResponse::new(status, message.clone());
    if status != Status::Unauthorized && status != Status::InternalServerError {
        body.errors.push(message);
    }
    status::Custom(status, Json(body))
}

/// Envelope for everything that never reached a handler: failed guards,
/// unmatched routes, unparsable bodies, panics.
#[catch(default)]
pub fn default_catcher(status: Status, request: &Request<'_>) -> ErrorReply {
    let message = match status.code {
        401 => UNAUTHORIZED_MESSAGE.to_string(),
        404 => format!("Route {} {} not found", request.method(), request.uri().path()),
        400 | 422 => "Malformed request body".to_string(),
        code if code >= 500 => INTERNAL_MESSAGE.to_string(),
        _ => status.reason_lossy().to_string(),
    };

    if status.code >= 500 {
        log::error!("{} {} failed with {}", request.method(), request.uri(), status.code);
    }

    status::Custom(status, Json(ErrorResponse::new(status, message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failures_never_echo_their_cause() {
        let reply = respond_error(AuthError::SessionMismatch);
        assert_eq!(reply.0, Status::Unauthorized);
        let body = &(reply.1).0;
        assert_eq!(body.status_code, 401);
        assert_eq!(body.message, UNAUTHORIZED_MESSAGE);
        assert!(!body.success);
        assert!(body.errors.is_empty());
    }

    #[test]
    fn validation_failures_carry_the_message() {
        let reply = respond_error(AuthError::Validation("Password is required".into()));
        assert_eq!(reply.0, Status::BadRequest);
        let body = &(reply.1).0;
        assert_eq!(body.message, "Password is required");
        assert_eq!(body.errors, vec!["Password is required".to_string()]);
    }

    #[test]
    fn internal_failures_are_generic() {
        let reply = respond_error(AuthError::Other("pool timed out".into()));
        assert_eq!(reply.0, Status::InternalServerError);
        assert_eq!((reply.1).0.message, INTERNAL_MESSAGE);
    }
}
