//! Deployment configuration for backend selection.
//!
//! Supported environment variables:
//! - `STORE_MODE`: `auto` (default), `embedded` or `remote`
//! - `DATABASE_URL`: embedded file, `sqlite:///./file.db` or a plain path
//! - `TURSO_DATABASE_URL`: remote service URL (`libsql://`, `https://`, `http://`)
//! - `TURSO_AUTH_TOKEN`: remote bearer token
//! - `STORE_BUSY_TIMEOUT_MS`: embedded busy timeout
//! - `STORE_HTTP_TIMEOUT_MS`: remote request timeout
//! - `STORE_SEED_ADMIN_EMAIL`, `STORE_SEED_ADMIN_NAME`, `STORE_SEED_ADMIN_PASSWORD`:
//!   initial administrator for a fresh embedded store
//!
//! Only the process environment is read. `.env` files are not loaded here;
//! a binary that wants them must load them before calling
//! [`StoreConfig::from_env`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::error::{Result, StoreError};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:///./munsociety_dev.db";
const DEFAULT_SEED_ADMIN_NAME: &str = "Administrator";
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_millis(30_000);

/// How the backend strategy is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreMode {
    /// Remote when credentials are present and well-formed, embedded otherwise.
    #[default]
    Auto,
    Embedded,
    Remote,
}

impl FromStr for StoreMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(StoreMode::Auto),
            "embedded" | "sqlite" | "local" => Ok(StoreMode::Embedded),
            "remote" | "turso" | "libsql" => Ok(StoreMode::Remote),
            other => Err(StoreError::Config(format!(
                "unknown STORE_MODE `{}` (expected auto, embedded or remote)",
                other
            ))),
        }
    }
}

/// Validated remote credentials.
#[derive(Clone, PartialEq)]
pub struct RemoteCredentials {
    pub url: Url,
    pub auth_token: String,
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("url", &self.url.as_str())
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// Initial administrator written into the embedded store at bootstrap.
///
/// The email always goes on the signup allowlist with the admin role. With a
/// password, an admin account and its author profile are created as well.
/// Existing rows are never changed.
#[derive(Clone, PartialEq)]
pub struct SeedAdmin {
    pub email: String,
    pub name: String,
    pub password: Option<String>,
}

impl SeedAdmin {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Author username: the local part of the email.
    pub fn username(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

impl fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The backend the selection algorithm settled on.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendChoice {
    Embedded { path: PathBuf },
    Remote(RemoteCredentials),
}

#[derive(Clone)]
pub struct StoreConfig {
    pub mode: StoreMode,
    pub database_path: PathBuf,
    pub remote_url: Option<String>,
    pub auth_token: Option<String>,
    pub busy_timeout: Duration,
    pub http_timeout: Duration,
    pub seed_admin: Option<SeedAdmin>,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("mode", &self.mode)
            .field("database_path", &self.database_path)
            .field("remote_url", &self.remote_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("busy_timeout", &self.busy_timeout)
            .field("http_timeout", &self.http_timeout)
            .field("seed_admin", &self.seed_admin)
            .finish()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: StoreMode::Auto,
            database_path: database_path_from_url(DEFAULT_DATABASE_URL),
            remote_url: None,
            auth_token: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            seed_admin: None,
        }
    }
}

impl StoreConfig {
    /// An embedded-only configuration for the given file.
    pub fn embedded(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: StoreMode::Embedded,
            database_path: path.into(),
            ..Self::default()
        }
    }

    /// A remote-only configuration.
    pub fn remote(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            mode: StoreMode::Remote,
            remote_url: Some(url.into()),
            auth_token: Some(auth_token.into()),
            ..Self::default()
        }
    }

    /// Seed an administrator into the embedded store.
    pub fn with_seed_admin(mut self, admin: SeedAdmin) -> Self {
        self.seed_admin = Some(admin);
        self
    }

    /// Load from the process environment. `.env` files are not read.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(mode) = get("STORE_MODE") {
            config.mode = mode.parse()?;
        }
        if let Some(url) = get("DATABASE_URL") {
            config.database_path = database_path_from_url(&url);
        }
        config.remote_url = get("TURSO_DATABASE_URL");
        config.auth_token = get("TURSO_AUTH_TOKEN");
        if let Some(ms) = get("STORE_BUSY_TIMEOUT_MS") {
            config.busy_timeout = parse_millis("STORE_BUSY_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = get("STORE_HTTP_TIMEOUT_MS") {
            config.http_timeout = parse_millis("STORE_HTTP_TIMEOUT_MS", &ms)?;
        }

        let seed_name = get("STORE_SEED_ADMIN_NAME");
        let seed_password = get("STORE_SEED_ADMIN_PASSWORD");
        config.seed_admin = match get("STORE_SEED_ADMIN_EMAIL") {
            Some(email) => {
                let email = email.trim().to_string();
                if !email.contains('@') {
                    return Err(StoreError::Config(format!(
                        "STORE_SEED_ADMIN_EMAIL `{}` is not an email address",
                        email
                    )));
                }
                let admin = SeedAdmin::new(
                    email,
                    seed_name.unwrap_or_else(|| DEFAULT_SEED_ADMIN_NAME.to_string()),
                );
                Some(match seed_password {
                    Some(password) => admin.with_password(password),
                    None => admin,
                })
            }
            None if seed_name.is_some() || seed_password.is_some() => {
                return Err(StoreError::Config(
                    "STORE_SEED_ADMIN_NAME and STORE_SEED_ADMIN_PASSWORD require STORE_SEED_ADMIN_EMAIL"
                        .to_string(),
                ))
            }
            None => None,
        };

        Ok(config)
    }

    /// Validate remote credentials, if any were given.
    ///
    /// `Ok(None)` means none were configured; a partial or malformed set is an error.
    pub fn remote_credentials(&self) -> Result<Option<RemoteCredentials>> {
        let (url, token) = match (&self.remote_url, &self.auth_token) {
            (None, None) => return Ok(None),
            (Some(_), None) => {
                return Err(StoreError::Config(
                    "TURSO_DATABASE_URL is set but TURSO_AUTH_TOKEN is missing".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(StoreError::Config(
                    "TURSO_AUTH_TOKEN is set but TURSO_DATABASE_URL is missing".to_string(),
                ))
            }
            (Some(url), Some(token)) => (url, token),
        };

        let url = parse_remote_url(url)?;
        let token = token.trim();
        if token.chars().any(char::is_whitespace) {
            return Err(StoreError::Config(
                "TURSO_AUTH_TOKEN must not contain whitespace".to_string(),
            ));
        }

        Ok(Some(RemoteCredentials {
            url,
            auth_token: token.to_string(),
        }))
    }

    /// Run the selection algorithm.
    pub fn choose_backend(&self) -> Result<BackendChoice> {
        let embedded = || BackendChoice::Embedded {
            path: self.database_path.clone(),
        };

        match self.mode {
            StoreMode::Embedded => Ok(embedded()),
            StoreMode::Remote => self
                .remote_credentials()?
                .map(BackendChoice::Remote)
                .ok_or_else(|| {
                    StoreError::Config(
                        "STORE_MODE=remote requires TURSO_DATABASE_URL and TURSO_AUTH_TOKEN"
                            .to_string(),
                    )
                }),
            StoreMode::Auto => match self.remote_credentials() {
                Ok(Some(credentials)) => Ok(BackendChoice::Remote(credentials)),
                Ok(None) => Ok(embedded()),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring malformed remote credentials");
                    Ok(embedded())
                }
            },
        }
    }
}

/// Strip the `sqlite:///` scheme, if present.
pub fn database_path_from_url(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

/// `libsql://` is the service's advertised scheme; requests go over HTTPS.
fn parse_remote_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let rewritten = match raw.strip_prefix("libsql://") {
        Some(rest) => format!("https://{}", rest),
        None => raw.to_string(),
    };

    let url = Url::parse(&rewritten)
        .map_err(|e| StoreError::Config(format!("invalid TURSO_DATABASE_URL: {}", e)))?;

    match url.scheme() {
        "https" | "http" => {}
        other => {
            return Err(StoreError::Config(format!(
                "unsupported TURSO_DATABASE_URL scheme `{}`",
                other
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(StoreError::Config(
            "TURSO_DATABASE_URL has no host".to_string(),
        ));
    }

    Ok(url)
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| StoreError::Config(format!("invalid {} value: {}", key, value)))
}
