use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::filter::MailboxSelection;
use crate::error::ConfigError;
use crate::store::ArtifactPaths;

/// On-disk configuration, `config.toml`. Every key is optional.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub imap_server: String,
    pub imap_port: u16,
    pub user: String,
    pub fetch_page_size: usize,
    pub max_records: usize,
    pub multi_threaded: bool,
    pub worker_count: usize,
    pub mailboxes_to_include: Vec<String>,
    pub mailboxes_to_exclude: Vec<String>,
    pub since_days_ago: u32,
    pub to_address_filter: Option<String>,
    pub output_path: Option<String>,
    pub mailbox_list_path: Option<String>,
    /// Append `_YYYYMMDD` to both artifact file names.
    pub date_suffix: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            imap_server: "imap.example.com".to_string(),
            imap_port: 993,
            user: String::new(),
            fetch_page_size: 50,
            max_records: 1000,
            multi_threaded: false,
            worker_count: 4,
            mailboxes_to_include: vec![],
            mailboxes_to_exclude: ["Drafts", "Sent", "Spam", "Trash"]
                .into_iter()
                .map(String::from)
                .collect(),
            since_days_ago: 1,
            to_address_filter: None,
            output_path: None,
            mailbox_list_path: None,
            date_suffix: false,
        }
    }
}

/// Validated, immutable settings for one run of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub page_size: usize,
    pub max_records: usize,
    pub multi_threaded: bool,
    pub worker_count: usize,
    pub selection: MailboxSelection,
    pub since_days_ago: u32,
    pub to_address: Option<String>,
}

impl Config {
    /// Check every value once. `max_records_override` replaces `max_records`
    /// for this run only.
    pub fn validate(&self, max_records_override: Option<usize>) -> Result<FetchSettings, ConfigError> {
        if self.imap_server.trim().is_empty() {
            return Err(ConfigError::Empty("imap_server"));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::Empty("user"));
        }
        if self.fetch_page_size == 0 {
            return Err(ConfigError::Zero("fetch_page_size"));
        }
        let max_records = max_records_override.unwrap_or(self.max_records);
        if max_records == 0 {
            return Err(ConfigError::Zero("max_records"));
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Zero("worker_count"));
        }

        let to_address = match self.to_address_filter.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(addr) if addr.contains('@') => Some(addr.to_string()),
            Some(addr) => return Err(ConfigError::InvalidAddress(addr.to_string())),
        };

        Ok(FetchSettings {
            page_size: self.fetch_page_size,
            max_records,
            multi_threaded: self.multi_threaded,
            worker_count: self.worker_count,
            selection: MailboxSelection::new(&self.mailboxes_to_include, &self.mailboxes_to_exclude),
            since_days_ago: self.since_days_ago,
            to_address,
        })
    }

    /// Where this run's artifacts go.
    pub fn artifact_paths(&self, today: NaiveDate) -> Result<ArtifactPaths> {
        let messages = match &self.output_path {
            Some(p) => PathBuf::from(p),
            None => config_dir()?.join("mails.txt"),
        };
        let mailbox_list = match &self.mailbox_list_path {
            Some(p) => PathBuf::from(p),
            None => config_dir()?.join("mailboxes.txt"),
        };
        if self.date_suffix {
            Ok(ArtifactPaths {
                messages: with_date_suffix(&messages, today),
                mailbox_list: with_date_suffix(&mailbox_list, today),
            })
        } else {
            Ok(ArtifactPaths {
                messages,
                mailbox_list,
            })
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("rs_mail_fetch"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

/// Load `path`, or the default location. A missing file is replaced by a
/// template and reported as an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            user: "you@example.com".to_string(),
            ..Config::default()
        };
        let tom = toml::to_string_pretty(&sample)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {}; edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(&path)?;
    let cfg: Config =
        toml::from_str(&s).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// `mails.txt` -> `mails_20240612.txt`, `logs/out` -> `logs/out_20240612`.
pub fn with_date_suffix(path: &Path, today: NaiveDate) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{}.{}", today.format("%Y%m%d"), ext.to_string_lossy()),
        None => format!("{stem}_{}", today.format("%Y%m%d")),
    };
    path.with_file_name(name)
}
