pub mod credential_store;

use std::fmt;

use anyhow::{Result, anyhow};
use log::debug;

use crate::config::Config;

/// Environment fallback when the keyring has no entry.
pub const PASSWORD_ENV: &str = "IMAP_PASS";

/// Decrypted login handed to the access layer. Never logged.
#[derive(Clone)]
pub struct Credential {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Host and user from config; password from the keyring, then `IMAP_PASS`.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        if cfg.user.trim().is_empty() {
            return Err(anyhow!("user not set in config"));
        }

        let password = match credential_store::load_password(&cfg.user) {
            Ok(Some(p)) => Some(p),
            Ok(None) => None,
            Err(e) => {
                debug!("keyring unavailable ({e}); trying {PASSWORD_ENV}");
                None
            }
        }
        .or_else(|| std::env::var(PASSWORD_ENV).ok())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            anyhow!(
                "no password for {}: run `set-password --user {}` or set {PASSWORD_ENV}",
                cfg.user,
                cfg.user
            )
        })?;

        Ok(Self {
            host: cfg.imap_server.clone(),
            port: cfg.imap_port,
            user: cfg.user.clone(),
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_password() {
        let c = Credential {
            host: "imap.example.com".into(),
            port: 993,
            user: "me@example.com".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{c:?}");
        assert!(shown.contains("me@example.com"));
        assert!(!shown.contains("hunter2"));
    }
}
