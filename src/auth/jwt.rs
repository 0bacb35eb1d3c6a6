use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::auth::{AuthConfig, AuthError, AuthResult};
use crate::models::Identity;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub username: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// One signing key with its own TTL. Access and refresh tokens each get one.
struct SigningKey {
    kind: &'static str,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SigningKey {
    fn new(kind: &'static str, secret: &str, ttl_secs: i64) -> Self {
        Self {
            kind,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
        }
    }
}

pub struct JwtService {
    access: SigningKey,
    refresh: SigningKey,
    validation: Validation,
}

impl JwtService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        if config.access_token_secret.is_empty() || config.refresh_token_secret.is_empty() {
            return Err(AuthError::Config("token signing keys must not be empty".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;

        Ok(Self {
            access: SigningKey::new(
                "access",
                &config.access_token_secret,
                config.access_token_ttl_secs,
            ),
            refresh: SigningKey::new(
                "refresh",
                &config.refresh_token_secret,
                config.refresh_token_ttl_secs,
            ),
            validation,
        })
    }

    pub fn issue_access_token(&self, identity: &Identity) -> AuthResult<SignedToken> {
        let now = Utc::now();
        let expires_at = now + self.access.ttl;
        let claims = AccessTokenClaims {
            sub: identity.id.to_string(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access.encoding_key)?;
        Ok(SignedToken { token, expires_at })
    }

    pub fn issue_refresh_token(&self, identity: &Identity) -> AuthResult<SignedToken> {
        let now = Utc::now();
        let expires_at = now + self.refresh.ttl;
        let claims = RefreshTokenClaims {
            sub: identity.id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh.encoding_key)?;
        Ok(SignedToken { token, expires_at })
    }

    pub fn decode_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        self.decode_with(&self.access, token)
    }

    pub fn decode_refresh_token(&self, token: &str) -> AuthResult<RefreshTokenClaims> {
        self.decode_with(&self.refresh, token)
    }

    fn decode_with<T: DeserializeOwned>(&self, key: &SigningKey, token: &str) -> AuthResult<T> {
        match decode::<T>(token, &key.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "expired",
                    ErrorKind::InvalidSignature => "bad signature",
                    ErrorKind::InvalidAlgorithm => "unexpected algorithm",
                    _ => "malformed",
                };
                log::debug!("rejected {} token: {}", key.kind, reason);
                Err(AuthError::TokenInvalid)
            }
        }
    }
}

/// Pull the identity id out of a token subject.
pub fn subject_id(sub: &str) -> AuthResult<Uuid> {
    sub.parse::<Uuid>().map_err(|_| AuthError::TokenInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "access-test-key".into(),
            refresh_token_secret: "refresh-test-key".into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 864_000,
            cookie_secure: false,
            cookie_http_only: true,
            password_hash_memory_kib: 1024,
            password_hash_iterations: 1,
        }
    }

    fn make_identity() -> Identity {
        let now = Utc::now();
        Identity {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            full_name: "Alice Liddell".into(),
            password_hash: String::new(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issues_and_decodes_access_tokens() {
        let service = JwtService::from_config(&make_test_config()).expect("jwt service");
        let identity = make_identity();

        let token = service.issue_access_token(&identity).expect("issue token");
        let claims = service
            .decode_access_token(&token.token)
            .expect("decode token");

        assert_eq!(claims.sub, identity.id.to_string());
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "alice@example.com");
        assert!(claims.exp > claims.iat);
        assert_eq!(subject_id(&claims.sub).expect("uuid subject"), identity.id);
    }

    #[test]
    fn refresh_tokens_carry_only_the_id() {
        let service = JwtService::from_config(&make_test_config()).expect("jwt service");
        let identity = make_identity();

        let token = service.issue_refresh_token(&identity).expect("issue token");
        let claims = service
            .decode_refresh_token(&token.token)
            .expect("decode token");
        assert_eq!(claims.sub, identity.id.to_string());

        let payload: serde_json::Value = service
            .decode_with(&service.refresh, &token.token)
            .expect("raw claims");
        assert!(payload.get("email").is_none());
        assert!(payload.get("username").is_none());
    }

    #[test]
    fn keys_are_not_interchangeable() {
        let service = JwtService::from_config(&make_test_config()).expect("jwt service");
        let identity = make_identity();

        let access = service.issue_access_token(&identity).expect("access");
        let refresh = service.issue_refresh_token(&identity).expect("refresh");

        assert!(matches!(
            service.decode_refresh_token(&access.token),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            service.decode_access_token(&refresh.token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn back_to_back_tokens_differ() {
        let service = JwtService::from_config(&make_test_config()).expect("jwt service");
        let identity = make_identity();

        let first = service.issue_refresh_token(&identity).expect("first");
        let second = service.issue_refresh_token(&identity).expect("second");
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut config = make_test_config();
        config.access_token_ttl_secs = -3600;
        let service = JwtService::from_config(&config).expect("jwt service");

        let token = service
            .issue_access_token(&make_identity())
            .expect("issue token");
        assert!(matches!(
            service.decode_access_token(&token.token),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn tampered_and_garbage_tokens_are_rejected() {
        let service = JwtService::from_config(&make_test_config()).expect("jwt service");
        let token = service
            .issue_access_token(&make_identity())
            .expect("issue token");

        let signature_start = token.token.rfind('.').expect("three segments") + 1;
        let mut chars: Vec<char> = token.token.chars().collect();
        let target = signature_start + 4;
        chars[target] = if chars[target] == 'x' { 'y' } else { 'x' };
        let tampered: String = chars.into_iter().collect();

        assert!(matches!(
            service.decode_access_token(&tampered),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            service.decode_access_token("not.a.jwt"),
            Err(AuthError::TokenInvalid)
        ));
        assert!(matches!(
            service.decode_access_token(""),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[test]
    fn foreign_key_signatures_are_rejected() {
        let service = JwtService::from_config(&make_test_config()).expect("jwt service");
        let mut other_config = make_test_config();
        other_config.access_token_secret = "someone-elses-key".into();
        let other = JwtService::from_config(&other_config).expect("jwt service");

        let forged = other
            .issue_access_token(&make_identity())
            .expect("issue token");
        assert!(matches!(
            service.decode_access_token(&forged.token),
            Err(AuthError::TokenInvalid)
        ));
    }
}
