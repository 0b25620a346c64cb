use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::message::MailboxName;

/// Errors raised by the mailbox access layer and recorded per mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server rejected the credential.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network or TLS failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server refused a command or answered something unusable.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A page was fetched but could not be decoded into records.
    #[error("could not decode page at offset {offset}: {reason}")]
    PageDecode { offset: usize, reason: String },

    /// The unit of work never reported back (its worker thread died).
    #[error("fetch worker exited before completing")]
    Interrupted,
}

impl FetchError {
    pub fn is_auth(&self) -> bool {
        matches!(self, FetchError::Auth(_))
    }

    /// Page-local errors skip one page; everything else ends the mailbox.
    pub fn is_page_local(&self) -> bool {
        matches!(self, FetchError::PageDecode { .. })
    }
}

impl From<imap::error::Error> for FetchError {
    fn from(e: imap::error::Error) -> Self {
        use imap::error::Error as E;
        match e {
            E::Io(_) | E::Tls(_) | E::ConnectionLost => {
                FetchError::Connection(e.to_string())
            }
            E::Parse(_) => FetchError::Protocol(format!("unparseable response: {e}")),
            other => FetchError::Protocol(other.to_string()),
        }
    }
}

/// Where a run was when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Enumerating,
    Collecting,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Enumerating => "enumerating",
            RunPhase::Collecting => "collecting",
        };
        f.write_str(name)
    }
}

/// Fatal run errors. Nothing is written when one of these is returned.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not list mailboxes: {0}")]
    Enumeration(FetchError),

    #[error("authentication rejected while {phase} (mailbox {mailbox:?}): {source}")]
    Auth {
        phase: RunPhase,
        mailbox: Option<MailboxName>,
        source: FetchError,
    },
}

impl RunError {
    pub fn phase(&self) -> RunPhase {
        match self {
            RunError::Enumeration(_) => RunPhase::Enumerating,
            RunError::Auth { phase, .. } => *phase,
        }
    }
}

/// Writing an artifact failed; the destination was left untouched.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct SinkError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("to_address_filter {0:?} is not an email address")]
    InvalidAddress(String),
}
