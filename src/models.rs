use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket_db_pools::sqlx::FromRow;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ===== Identity Models =====

/// A registered user as held by the persistence layer.
#[derive(Debug, Clone, FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity with credential material stripped; the only shape sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicIdentity {
    pub id: Uuid,
    pub user_name: String,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Identity> for PublicIdentity {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            user_name: identity.username,
            email: identity.email,
            full_name: identity.full_name,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        }
    }
}

/// Fields needed to create an identity row.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
}

// ===== Response Envelopes =====

/// Success envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    pub data: T,
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(Status::Ok, message, data)
    }

    pub fn with_status(status: Status, message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: status.code,
            message: message.into(),
            data,
            success: true,
        }
    }
}

/// Failure envelope shared by every endpoint and catcher.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub errors: Vec<String>,
}

impl ErrorResponse {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status_code: status.code,
            message: message.into(),
            success: false,
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_identity_drops_credentials() {
        let now = Utc::now();
        let identity = Identity {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            full_name: "Alice Liddell".into(),
            password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".into(),
            refresh_token: Some("refresh".into()),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(PublicIdentity::from(identity)).expect("serialize");
        let object = json.as_object().expect("object");
        assert_eq!(object["userName"], "alice");
        assert!(!object.contains_key("passwordHash"));
        assert!(!object.contains_key("password_hash"));
        assert!(!object.contains_key("refreshToken"));
    }

    #[test]
    fn envelopes_use_camel_case_wire_names() {
        let ok = serde_json::to_value(ApiResponse::ok("fine", 7)).expect("serialize");
        assert_eq!(ok["statusCode"], 200);
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"], 7);

        let err = serde_json::to_value(ErrorResponse::new(Status::Conflict, "taken"))
            .expect("serialize");
        assert_eq!(err["statusCode"], 409);
        assert_eq!(err["success"], false);
        assert_eq!(err["errors"], serde_json::json!([]));
    }

    #[test]
    fn public_identity_schema_describes_uuid_ids() {
        let schema = serde_json::to_value(schemars::schema_for!(PublicIdentity)).expect("schema");
        assert_eq!(schema["properties"]["id"]["type"], "string");
        assert_eq!(schema["properties"]["id"]["format"], "uuid");
        assert!(schema["properties"].get("passwordHash").is_none());
    }
}
