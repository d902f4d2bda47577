//! Configuration for StepLoop
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Secret used when dev mode is on and no secret was supplied
const DEV_SESSION_SECRET: &str = "dev-only-insecure-session-secret-0123456789";

/// Minimum accepted HS256 secret length
pub const MIN_SECRET_LEN: usize = 32;

/// Default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("steploop")
        .join("steploop.db")
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// StepLoop - goal journal with daily reflections
#[derive(Parser, Debug, Clone)]
#[command(name = "steploop")]
#[command(about = "Goal-tracking journal service with idempotent daily reflections")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value_os_t = default_database_path())]
    pub database_path: PathBuf,

    /// HS256 secret shared with the identity provider that signs session tokens
    #[arg(long, env = "SESSION_SECRET")]
    pub session_secret: Option<String>,

    /// Name of the cookie carrying the session token
    #[arg(long, env = "SESSION_COOKIE", default_value = "steploop.session")]
    pub session_cookie: String,

    /// Enable development mode (falls back to an insecure built-in secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Args {
    /// Effective session secret (built-in fallback only in dev mode)
    pub fn session_secret(&self) -> Option<String> {
        match (&self.session_secret, self.dev_mode) {
            (Some(secret), _) => Some(secret.clone()),
            (None, true) => Some(DEV_SESSION_SECRET.to_string()),
            (None, false) => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.session_secret {
                None => return Err("SESSION_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < MIN_SECRET_LEN => {
                    return Err(format!(
                        "SESSION_SECRET must be at least {} characters",
                        MIN_SECRET_LEN
                    ));
                }
                Some(_) => {}
            }
        }

        if self.session_cookie.trim().is_empty() {
            return Err("SESSION_COOKIE must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["steploop"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_production_requires_secret() {
        let args = parse(&["--database-path", "/tmp/x.db"]);
        if args.session_secret.is_none() {
            assert!(args.validate().is_err());
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        let args = parse(&["--session-secret", "short"]);
        assert!(args.validate().unwrap_err().contains("at least"));
    }

    #[test]
    fn test_dev_mode_fallback_secret() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.session_secret().as_deref(), Some(DEV_SESSION_SECRET));
    }

    #[test]
    fn test_log_format_flag() {
        let args = parse(&["--dev-mode", "--log-format", "json"]);
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
