use std::path::Path;
use std::process::ExitCode;

use anyhow::{Result, anyhow};
use chrono::Local;
use log::{error, info, warn};

use crate::auth::Credential;
use crate::config::{Config, load_config};
use crate::domain::message::SearchCriterion;
use crate::engine::{AggregateResult, Orchestrator, RunStatus};
use crate::error::{RunError, SinkError};
use crate::mail::access::MailboxAccess;
use crate::mail::imap_client::ImapClient;
use crate::store::files::FileSink;
use crate::store::sink::ResultSink;

/// How a fetch ended, from the caller's point of view.
#[derive(Debug)]
pub enum RunReport {
    Finished(AggregateResult),
    Fatal(RunError),
    /// The run succeeded but its artifacts could not be written.
    Unwritten(AggregateResult, SinkError),
}

impl RunReport {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RunReport::Finished(result) => match result.status() {
                RunStatus::Success => ExitCode::SUCCESS,
                RunStatus::CompletedWithErrors => ExitCode::from(2),
            },
            RunReport::Fatal(_) | RunReport::Unwritten(..) => ExitCode::FAILURE,
        }
    }
}

/// One run against any access layer, written through `sink`.
pub fn fetch_with<A: MailboxAccess>(
    access: &A,
    cfg: &Config,
    max_records_override: Option<usize>,
    sink: &dyn ResultSink,
) -> Result<RunReport> {
    let settings = cfg
        .validate(max_records_override)
        .map_err(|e| anyhow!("Configuration error: {e}"))?;
    let criterion = SearchCriterion::new(
        Local::now().date_naive(),
        settings.since_days_ago,
        settings.to_address.clone(),
    );

    let orchestrator = Orchestrator::new(access, &settings, criterion);
    let result = match orchestrator.run() {
        Ok(result) => result,
        Err(e) => {
            error!("run failed while {}: {e}", e.phase());
            return Ok(RunReport::Fatal(e));
        }
    };

    for failure in &result.failures {
        warn!("{}: {}", failure.mailbox, failure.cause);
    }

    match sink.write_result(&result) {
        Ok(()) => Ok(RunReport::Finished(result)),
        Err(e) => {
            error!("{e}");
            Ok(RunReport::Unwritten(result, e))
        }
    }
}

/// One run against the configured IMAP account.
pub fn fetch_once(config_path: Option<&Path>, max_records_override: Option<usize>) -> Result<RunReport> {
    let cfg = load_config(config_path)?;
    let credential = Credential::from_config(&cfg)?;
    let paths = cfg.artifact_paths(Local::now().date_naive())?;
    info!("fetching from {} as {}", credential.host, credential.user);

    let client = ImapClient::new(credential);
    fetch_with(&client, &cfg, max_records_override, &FileSink::new(paths))
}

/// Enumerate mailboxes and write only the mailbox-list artifact.
pub fn list_mailboxes(config_path: Option<&Path>) -> Result<Vec<String>> {
    let cfg = load_config(config_path)?;
    let settings = cfg
        .validate(None)
        .map_err(|e| anyhow!("Configuration error: {e}"))?;
    let credential = Credential::from_config(&cfg)?;
    let sink = FileSink::new(cfg.artifact_paths(Local::now().date_naive())?);

    let client = ImapClient::new(credential);
    let criterion = SearchCriterion::new(Local::now().date_naive(), settings.since_days_ago, None);
    let mailboxes = Orchestrator::new(&client, &settings, criterion).enumerate()?;
    sink.write_mailbox_list(&mailboxes)?;
    Ok(mailboxes)
}
