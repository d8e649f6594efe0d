//! Application settings loaded from environment variables.

use std::env;

use super::constants::{
    DEFAULT_CACHE_TTL_SECONDS, DEFAULT_DATABASE_URL, DEFAULT_JWT_EXPIRATION_HOURS,
    DEFAULT_MEDIA_ROOT, DEFAULT_PASSWORD_RESET_TTL_MINUTES, DEFAULT_PUBLIC_URL, DEFAULT_REDIS_URL, DEFAULT_SERVER_HOST,
    DEFAULT_SERVER_PORT, DEFAULT_SMTP_FROM, DEFAULT_SMTP_PORT, MIN_JWT_SECRET_LENGTH,
};

/// Outbound mail settings.
#[derive(Clone)]
pub struct MailSettings {
    /// SMTP relay host; `None` means mails are only logged
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    smtp_pass: Option<String>,
    pub smtp_from: String,
    pub smtp_tls: bool,
    /// Whether a failed activation mail aborts registration
    pub activation_mail_required: bool,
}

impl std::fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSettings")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_pass", &"[REDACTED]")
            .field("smtp_from", &self.smtp_from)
            .field("smtp_tls", &self.smtp_tls)
            .field("activation_mail_required", &self.activation_mail_required)
            .finish()
    }
}

impl MailSettings {
    fn from_env() -> Self {
        Self {
            smtp_host: env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()),
            smtp_port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            smtp_user: env::var("SMTP_USER").ok(),
            smtp_pass: env::var("SMTP_PASS").ok(),
            smtp_from: env::var("SMTP_FROM").unwrap_or_else(|_| DEFAULT_SMTP_FROM.to_string()),
            smtp_tls: env_flag("SMTP_TLS", true),
            activation_mail_required: env_flag("ACTIVATION_MAIL_REQUIRED", true),
        }
    }

    /// SMTP password, if configured.
    pub fn smtp_password(&self) -> Option<&str> {
        self.smtp_pass.as_deref()
    }

    /// Settings that only log mail; used by tests and local tooling.
    pub fn log_only(from: impl Into<String>) -> Self {
        Self {
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_user: None,
            smtp_pass: None,
            smtp_from: from.into(),
            smtp_tls: false,
            activation_mail_required: true,
        }
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    /// Base URL used to build links embedded in emails
    pub public_url: String,
    /// Directory receiving uploaded images
    pub media_root: String,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u64,
    /// How long an emailed password reset link stays redeemable
    pub password_reset_ttl_minutes: i64,
    pub mail: MailSettings,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiration_hours", &self.jwt_expiration_hours)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("public_url", &self.public_url)
            .field("media_root", &self.media_root)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .field("password_reset_ttl_minutes", &self.password_reset_ttl_minutes)
            .field("mail", &self.mail)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if JWT_SECRET is not set in release builds or is too short.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                tracing::warn!("JWT_SECRET not set, using insecure default for development");
                "dev-secret-key-minimum-32-chars!!".to_string()
            } else {
                panic!("JWT_SECRET environment variable must be set in production");
            }
        });

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            panic!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            jwt_secret,
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_JWT_EXPIRATION_HOURS),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            public_url: env::var("PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_PUBLIC_URL.to_string()),
            media_root: env::var("MEDIA_ROOT").unwrap_or_else(|_| DEFAULT_MEDIA_ROOT.to_string()),
            cache_enabled: env_flag("CACHE_ENABLED", true),
            cache_ttl_seconds: env::var("CACHE_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CACHE_TTL_SECONDS),
            password_reset_ttl_minutes: env::var("PASSWORD_RESET_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|minutes: &i64| *minutes > 0)
                .unwrap_or(DEFAULT_PASSWORD_RESET_TTL_MINUTES),
            mail: MailSettings::from_env(),
        }
    }

    /// Build a configuration for tests without touching the environment.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            media_root: DEFAULT_MEDIA_ROOT.to_string(),
            cache_enabled: false,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            password_reset_ttl_minutes: DEFAULT_PASSWORD_RESET_TTL_MINUTES,
            mail: MailSettings::log_only(DEFAULT_SMTP_FROM),
        }
    }

    /// Get JWT secret bytes for token signing/verification.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Absolute link that redeems an activation token.
    pub fn activation_link(&self, token: &str) -> String {
        format!("{}/profile/email-confirm/{}/", self.public_url, token)
    }

    /// Link to the page that posts `token` and a new password to
    /// `/password-change/`.
    pub fn password_reset_link(&self, token: &str) -> String {
        format!("{}/password-change/?token={}", self.public_url, token)
    }
}

/// Read a boolean flag, accepting `true`/`1` and `false`/`0`.
fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        Err(_) => default,
    }
}
