use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Credentials and endpoints for the prompt and image generation APIs.
#[derive(Debug, Clone)]
pub struct GenAiConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub clipdrop_api_key: String,
    pub clipdrop_url: String,
    /// Upper bound for each generation call.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub genai: GenAiConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "jigsaw"),
            audience: env_or("JWT_AUDIENCE", "jigsaw-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
        };
        let genai = GenAiConfig {
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: env_or("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_base_url: env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            clipdrop_api_key: required("CLIPDROP_API_KEY")?,
            clipdrop_url: env_or("CLIPDROP_URL", "https://clipdrop-api.co/text-to-image/v1"),
            timeout: Duration::from_secs(env_parse("GENERATION_TIMEOUT_SECS", 60)),
        };
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            host: env_or("APP_HOST", "0.0.0.0"),
            port: env_parse("APP_PORT", 8080),
            jwt,
            genai,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("{key} must be set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
impl AppConfig {
    pub fn test() -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            genai: GenAiConfig {
                gemini_api_key: "fake".into(),
                gemini_model: "fake-model".into(),
                gemini_base_url: "http://fake.local".into(),
                clipdrop_api_key: "fake".into(),
                clipdrop_url: "http://fake.local/text-to-image".into(),
                timeout: Duration::from_secs(2),
            },
        }
    }
}
