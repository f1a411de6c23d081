//!
//! digicard configuration
//! ----------------------
//! Settings come from CLI flags, then environment variables, then defaults.
//! The session secret has no default: startup fails without it.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::identity::DEFAULT_SESSION_TTL;

pub const DEFAULT_HTTP_PORT: u16 = 7878;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub const USAGE: &str = "digicard server

USAGE:
  digicard [--host ADDR] [--http-port N] [--data-dir PATH] [--session-ttl SECS] [--production]

OPTIONS:
  --host ADDR          Bind address (env: DIGICARD_HOST, default 0.0.0.0)
  --http-port N        HTTP port (env: DIGICARD_HTTP_PORT, default 7878)
  --data-dir PATH      Data folder for store.json and uploads/ (env: DIGICARD_DATA_DIR, default data)
  --session-ttl SECS   Session lifetime in seconds (env: DIGICARD_SESSION_TTL_SECS, default 86400)
  --production         Mark session cookies Secure (env: DIGICARD_ENV=production)

ENVIRONMENT:
  DIGICARD_SESSION_SECRET    Token signing secret (required)
  DIGICARD_MAX_UPLOAD_BYTES  Upload size limit in bytes (default 10485760)
";

#[derive(Clone)]
pub struct Settings {
    pub host: String,
    pub http_port: u16,
    pub data_dir: PathBuf,
    pub session_secret: String,
    pub session_ttl: Duration,
    pub production: bool,
    pub max_upload_bytes: u64,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("http_port", &self.http_port)
            .field("data_dir", &self.data_dir)
            .field("session_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("production", &self.production)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl Settings {
    /// Defaults with the given secret; what tests start from.
    pub fn with_secret<S: Into<String>>(secret: S) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            session_secret: secret.into(),
            session_ttl: DEFAULT_SESSION_TTL,
            production: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn from_env_and_args() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |k| std::env::var(k).ok())
    }

    pub fn from_sources<F>(args: &[String], env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = env("DIGICARD_SESSION_SECRET").unwrap_or_default();
        if secret.trim().is_empty() {
            bail!("DIGICARD_SESSION_SECRET must be set to a non-empty value");
        }
        let mut s = Self::with_secret(secret);

        if let Some(host) = arg_value(args, "--host").or_else(|| env("DIGICARD_HOST")) {
            s.host = host;
        }
        if let Some(port) = arg_value(args, "--http-port").or_else(|| env("DIGICARD_HTTP_PORT")) {
            s.http_port = port.parse::<u16>().with_context(|| format!("invalid http port '{}'", port))?;
        }
        if let Some(dir) = arg_value(args, "--data-dir").or_else(|| env("DIGICARD_DATA_DIR")) {
            s.data_dir = PathBuf::from(dir);
        }
        if let Some(ttl) = arg_value(args, "--session-ttl").or_else(|| env("DIGICARD_SESSION_TTL_SECS")) {
            let secs = ttl.parse::<u64>().with_context(|| format!("invalid session ttl '{}'", ttl))?;
            if secs == 0 {
                bail!("session ttl must be at least one second");
            }
            s.session_ttl = Duration::from_secs(secs);
        }
        if let Some(limit) = env("DIGICARD_MAX_UPLOAD_BYTES") {
            s.max_upload_bytes = limit.parse::<u64>().with_context(|| format!("invalid upload limit '{}'", limit))?;
        }
        s.production = has_flag(args, "--production")
            || env("DIGICARD_ENV").map(|v| v.eq_ignore_ascii_case("production")).unwrap_or(false);
        Ok(s)
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.host, self.http_port) }

    pub fn uploads_dir(&self) -> PathBuf { self.data_dir.join("uploads") }
}

pub fn help_requested(args: &[String]) -> bool {
    has_flag(args, "--help") || has_flag(args, "-h")
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let i = args.iter().position(|a| a == flag)?;
    args.get(i + 1).filter(|v| !v.starts_with("--")).cloned()
}
