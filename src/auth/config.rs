use crate::auth::{AuthError, AuthResult};

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 10 * 24 * 60 * 60;
const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;
const DEFAULT_HASH_ITERATIONS: u32 = 2;
pub const MAX_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Authentication configuration loaded from environment variables.
#[derive(Clone)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub password_hash_memory_kib: u32,
    pub password_hash_iterations: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &"<redacted>")
            .field("refresh_token_secret", &"<redacted>")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_http_only", &self.cookie_http_only)
            .field("password_hash_memory_kib", &self.password_hash_memory_kib)
            .field("password_hash_iterations", &self.password_hash_iterations)
            .finish()
    }
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let access_token_secret = required_secret("ACCESS_TOKEN_SECRET")?;
        let refresh_token_secret = required_secret("REFRESH_TOKEN_SECRET")?;
        let access_token_ttl_secs = ttl_from_env("ACCESS_TOKEN_EXPIRY", DEFAULT_ACCESS_TTL_SECS)?;
        let refresh_token_ttl_secs =
            ttl_from_env("REFRESH_TOKEN_EXPIRY", DEFAULT_REFRESH_TTL_SECS)?;
        let cookie_secure = flag_from_env("COOKIE_SECURE", true);
        let cookie_http_only = flag_from_env("COOKIE_HTTP_ONLY", true);
        let (password_hash_memory_kib, password_hash_iterations) = Self::password_cost_from_env();

        let config = Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            cookie_secure,
            cookie_http_only,
            password_hash_memory_kib,
            password_hash_iterations,
        };
        config.validate()?;
        Ok(config)
    }

    /// Argon2 `(memory_kib, iterations)` from `PASSWORD_HASH_MEMORY_KIB` and
    /// `PASSWORD_HASH_ITERATIONS`, falling back to the server defaults.
    pub fn password_cost_from_env() -> (u32, u32) {
        (
            cost_from_env("PASSWORD_HASH_MEMORY_KIB", DEFAULT_HASH_MEMORY_KIB),
            cost_from_env("PASSWORD_HASH_ITERATIONS", DEFAULT_HASH_ITERATIONS),
        )
    }

    /// Reject configurations that would let one leaked key forge both kinds of token.
    pub fn validate(&self) -> AuthResult<()> {
        if self.access_token_secret == self.refresh_token_secret {
            return Err(AuthError::Config(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".into(),
            ));
        }
        if self.refresh_token_ttl_secs <= 0 {
            return Err(AuthError::Config("refresh token TTL must be positive".into()));
        }
        if self.access_token_ttl_secs <= 0 {
            return Err(AuthError::Config("access token TTL must be positive".into()));
        }
        if self.access_token_ttl_secs > MAX_TTL_SECS || self.refresh_token_ttl_secs > MAX_TTL_SECS
        {
            return Err(AuthError::Config("token TTLs must not exceed 365 days".into()));
        }
        Ok(())
    }
}

fn required_secret(name: &str) -> AuthResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AuthError::Config(format!("{name} is required"))),
    }
}

fn flag_from_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
        .unwrap_or(default)
}

fn cost_from_env(name: &str, default: u32) -> u32 {
    parse_cost(std::env::var(name).ok().as_deref(), default)
}

fn parse_cost(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn ttl_from_env(name: &str, default: i64) -> AuthResult<i64> {
    match std::env::var(name) {
        Ok(raw) => parse_ttl(&raw)
            .ok_or_else(|| AuthError::Config(format!("{name} has an unrecognized duration: {raw}"))),
        Err(_) => Ok(default),
    }
}

/// Parse `900`, `15m`, `12h`, `10d` style durations into seconds.
pub fn parse_ttl(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c.to_ascii_lowercase()),
        _ => (raw, 's'),
    };
    let value = digits.parse::<i64>().ok()?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_suffixed_durations() {
        assert_eq!(parse_ttl("900"), Some(900));
        assert_eq!(parse_ttl("15m"), Some(900));
        assert_eq!(parse_ttl("1h"), Some(3600));
        assert_eq!(parse_ttl("10d"), Some(864_000));
        assert_eq!(parse_ttl(" 30s "), Some(30));
    }

    #[test]
    fn rejects_unknown_units_and_garbage() {
        assert_eq!(parse_ttl(""), None);
        assert_eq!(parse_ttl("10w"), None);
        assert_eq!(parse_ttl("soon"), None);
        assert_eq!(parse_ttl("d"), None);
    }

    #[test]
    fn identical_signing_keys_are_refused() {
        let config = AuthConfig {
            access_token_secret: "same".into(),
            refresh_token_secret: "same".into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 864_000,
            cookie_secure: true,
            cookie_http_only: true,
            password_hash_memory_kib: DEFAULT_HASH_MEMORY_KIB,
            password_hash_iterations: DEFAULT_HASH_ITERATIONS,
        };
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));
    }

    fn base_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "access".into(),
            refresh_token_secret: "refresh".into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 864_000,
            cookie_secure: true,
            cookie_http_only: true,
            password_hash_memory_kib: DEFAULT_HASH_MEMORY_KIB,
            password_hash_iterations: DEFAULT_HASH_ITERATIONS,
        }
    }

    #[test]
    fn oversized_ttls_are_refused() {
        assert!(base_config().validate().is_ok());

        let mut config = base_config();
        config.access_token_ttl_secs = parse_ttl("99999999999999999").expect("parses");
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));

        let mut config = base_config();
        config.refresh_token_ttl_secs = MAX_TTL_SECS + 1;
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));

        let mut config = base_config();
        config.refresh_token_ttl_secs = MAX_TTL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn hash_cost_falls_back_to_defaults() {
        assert_eq!(parse_cost(None, DEFAULT_HASH_ITERATIONS), DEFAULT_HASH_ITERATIONS);
        assert_eq!(parse_cost(Some("lots"), DEFAULT_HASH_ITERATIONS), DEFAULT_HASH_ITERATIONS);
        assert_eq!(parse_cost(Some("0"), DEFAULT_HASH_ITERATIONS), DEFAULT_HASH_ITERATIONS);
        assert_eq!(parse_cost(Some(" 4096 "), DEFAULT_HASH_MEMORY_KIB), 4096);
    }
}
