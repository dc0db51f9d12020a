//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Minimum length of the JWT signing secret.
const MIN_JWT_SECRET_LEN: usize = 32;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 5000).
    pub port: u16,

    /// Whether the server runs in production mode (`APP_ENV=production`).
    pub production: bool,

    /// PostgreSQL connection URL, or `memory://` for the in-process store.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// HS256 signing secret for auth tokens.
    pub jwt_secret: String,

    /// Token lifetime in days (default: 30).
    pub jwt_expire_days: i64,

    /// Auth cookie lifetime in days (default: 30).
    pub jwt_cookie_expire_days: i64,

    /// Directory bootcamp photos are written to (default: ./public/uploads).
    pub file_upload_path: PathBuf,

    /// Base URL photos are served under (default: /uploads).
    pub files_url: String,

    /// Largest accepted photo upload in bytes (default: 1000000).
    pub max_file_upload: usize,

    /// MapQuest API key. When None, geocoding is disabled.
    pub geocoder_api_key: Option<String>,

    /// Geocoding endpoint.
    pub geocoder_url: String,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// SMTP host for email delivery. When None, mail is only logged.
    pub smtp_host: Option<String>,

    /// SMTP port (default: 587).
    pub smtp_port: u16,

    /// SMTP username for authentication.
    pub smtp_username: Option<String>,

    /// SMTP password for authentication.
    pub smtp_password: Option<String>,

    /// SMTP encryption mode: "starttls" (default), "tls", or "none".
    pub smtp_encryption: String,

    /// From address for outgoing email.
    pub smtp_from_email: String,

    /// Public site URL for constructing links in emails.
    pub site_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let jwt_secret =
            env::var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        let jwt_expire_days = env::var("JWT_EXPIRE_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("JWT_EXPIRE_DAYS must be a whole number of days")?;

        let jwt_cookie_expire_days = env::var("JWT_COOKIE_EXPIRE_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("JWT_COOKIE_EXPIRE_DAYS must be a whole number of days")?;

        let file_upload_path = env::var("FILE_UPLOAD_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public/uploads"));

        let files_url = env::var("FILES_URL").unwrap_or_else(|_| "/uploads".to_string());

        let max_file_upload = env::var("MAX_FILE_UPLOAD")
            .unwrap_or_else(|_| "1000000".to_string())
            .parse()
            .context("MAX_FILE_UPLOAD must be a byte count")?;

        let geocoder_api_key = env::var("GEOCODER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let geocoder_url = env::var("GEOCODER_URL")
            .unwrap_or_else(|_| "https://www.mapquestapi.com/geocoding/v1/address".to_string());

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let smtp_host = env::var("SMTP_HOST").ok();

        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .context("SMTP_PORT must be a valid u16")?;

        let smtp_username = env::var("SMTP_USERNAME").ok();
        let smtp_password = env::var("SMTP_PASSWORD").ok();

        let smtp_encryption = env::var("SMTP_ENCRYPTION")
            .unwrap_or_else(|_| "starttls".to_string())
            .to_lowercase();

        let smtp_from_email =
            env::var("SMTP_FROM_EMAIL").unwrap_or_else(|_| "noreply@devcamper.io".to_string());

        let site_url = env::var("SITE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

        Ok(Self {
            port,
            production,
            database_url,
            database_max_connections,
            jwt_secret,
            jwt_expire_days,
            jwt_cookie_expire_days,
            file_upload_path,
            files_url,
            max_file_upload,
            geocoder_api_key,
            geocoder_url,
            cors_allowed_origins,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            smtp_encryption,
            smtp_from_email,
            site_url,
        })
    }

    /// True when `DATABASE_URL` selects the in-process document store.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}
