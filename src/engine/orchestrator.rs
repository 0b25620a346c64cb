use std::time::Instant;

use crossbeam::channel;
use log::{debug, error, info, warn};

use crate::config::FetchSettings;
use crate::domain::message::{MailboxName, MessageRecord, SearchCriterion};
use crate::engine::budget::RecordBudget;
use crate::engine::worker::{FetchOutcome, FetchUnit, fetch_mailbox};
use crate::error::{FetchError, RunError, RunPhase};
use crate::mail::access::MailboxAccess;

/// A mailbox that did not fetch cleanly, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxFailure {
    pub mailbox: MailboxName,
    pub cause: FetchError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    CompletedWithErrors,
}

/// Everything one run produced, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateResult {
    pub records: Vec<MessageRecord>,
    pub mailbox_list: Vec<MailboxName>,
    pub failures: Vec<MailboxFailure>,
}

impl AggregateResult {
    pub fn status(&self) -> RunStatus {
        if self.failures.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::CompletedWithErrors
        }
    }
}

/// Drives one fetch run: enumerate, dispatch, collect, finalize.
pub struct Orchestrator<'a, A: MailboxAccess> {
    access: &'a A,
    settings: &'a FetchSettings,
    criterion: SearchCriterion,
}

impl<'a, A: MailboxAccess> Orchestrator<'a, A> {
    pub fn new(access: &'a A, settings: &'a FetchSettings, criterion: SearchCriterion) -> Self {
        Self {
            access,
            settings,
            criterion,
        }
    }

    /// Enumerate only; used for the mailbox-list artifact on its own.
    pub fn enumerate(&self) -> Result<Vec<MailboxName>, RunError> {
        self.access.list_mailboxes().map_err(|e| {
            if e.is_auth() {
                RunError::Auth {
                    phase: RunPhase::Enumerating,
                    mailbox: None,
                    source: e,
                }
            } else {
                RunError::Enumeration(e)
            }
        })
    }

    pub fn run(&self) -> Result<AggregateResult, RunError> {
        let started = Instant::now();

        let mailboxes = self.enumerate()?;
        let selected = mailboxes
            .iter()
            .filter(|m| self.settings.selection.is_selected(m))
            .count();
        info!(
            "{} mailboxes listed, {selected} selected, since {}",
            mailboxes.len(),
            self.criterion.since
        );

        let budget = RecordBudget::new(self.settings.max_records, mailboxes.len());
        let slots = if self.settings.multi_threaded && mailboxes.len() > 1 {
            self.dispatch_pooled(&mailboxes, &budget)
        } else {
            self.dispatch_sequential(&mailboxes, &budget)
        };
        debug!(
            "{} records claimed against a cap of {}",
            budget.claimed_total(),
            self.settings.max_records
        );

        if let Some((index, cause)) = first_auth_failure(&slots) {
            error!("authentication rejected for {:?}", mailboxes[index]);
            return Err(RunError::Auth {
                phase: RunPhase::Collecting,
                mailbox: Some(mailboxes[index].clone()),
                source: cause.clone(),
            });
        }

        let result = self.finalize(mailboxes, slots);
        info!(
            "{} records from {} mailboxes ({} failures) in {:.3}s",
            result.records.len(),
            selected,
            result.failures.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(result)
    }

    fn unit<'u>(&'u self, index: usize, mailbox: &'u str, budget: &'u RecordBudget) -> FetchUnit<'u> {
        FetchUnit {
            index,
            mailbox,
            criterion: &self.criterion,
            selection: &self.settings.selection,
            page_size: self.settings.page_size,
            budget,
        }
    }

    fn dispatch_sequential(
        &self,
        mailboxes: &[MailboxName],
        budget: &RecordBudget,
    ) -> Vec<Option<FetchOutcome>> {
        let mut slots: Vec<Option<FetchOutcome>> = vec![None; mailboxes.len()];
        for (index, mailbox) in mailboxes.iter().enumerate() {
            let outcome = fetch_mailbox(self.access, self.unit(index, mailbox, budget));
            let auth_failed = outcome.errors().iter().any(FetchError::is_auth);
            slots[index] = Some(outcome);
            if auth_failed {
                break;
            }
        }
        slots
    }

    /// Fan out over at most `worker_count` threads. Outcomes arrive in
    /// completion order and are parked in their enumeration slot.
    fn dispatch_pooled(
        &self,
        mailboxes: &[MailboxName],
        budget: &RecordBudget,
    ) -> Vec<Option<FetchOutcome>> {
        let mut slots: Vec<Option<FetchOutcome>> = vec![None; mailboxes.len()];
        let workers = self.settings.worker_count.min(mailboxes.len()).max(1);
        debug!("dispatching {} units to {workers} workers", mailboxes.len());

        let (job_tx, job_rx) = channel::unbounded::<usize>();
        let (done_tx, done_rx) = channel::unbounded::<(usize, FetchOutcome)>();
        for index in 0..mailboxes.len() {
            // The receiver lives until the end of this function.
            let _ = job_tx.send(index);
        }
        drop(job_tx);

        let scoped = crossbeam::scope(|s| {
            let mut spawned = 0;
            for n in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let spawn = s
                    .builder()
                    .name(format!("fetch-worker-{n}"))
                    .spawn(move |_| {
                        for index in job_rx.iter() {
                            let outcome =
                                fetch_mailbox(self.access, self.unit(index, &mailboxes[index], budget));
                            if done_tx.send((index, outcome)).is_err() {
                                break;
                            }
                        }
                    });
                match spawn {
                    Ok(_) => spawned += 1,
                    Err(e) => warn!("could not start fetch worker {n}: {e}"),
                }
            }
            drop(done_tx);

            if spawned == 0 {
                // Nobody to drain the queue; run it here.
                for index in job_rx.iter() {
                    let outcome = fetch_mailbox(self.access, self.unit(index, &mailboxes[index], budget));
                    slots[index] = Some(outcome);
                }
                return;
            }

            for (index, outcome) in done_rx.iter() {
                if outcome.errors().iter().any(FetchError::is_auth) {
                    budget.cancel();
                }
                slots[index] = Some(outcome);
            }
        });
        if scoped.is_err() {
            error!("a fetch worker panicked");
        }
        slots
    }

    fn finalize(
        &self,
        mailboxes: Vec<MailboxName>,
        slots: Vec<Option<FetchOutcome>>,
    ) -> AggregateResult {
        let cap = self.settings.max_records;
        let mut records = Vec::new();
        let mut failures = Vec::new();

        for (mailbox, slot) in mailboxes.iter().zip(slots) {
            let (mut kept, errors) = slot
                .unwrap_or(FetchOutcome::Failed(FetchError::Interrupted))
                .into_parts();
            failures.extend(errors.into_iter().map(|cause| MailboxFailure {
                mailbox: mailbox.clone(),
                cause,
            }));

            let room = cap.saturating_sub(records.len());
            if kept.len() > room {
                debug!("{mailbox}: dropping {} records over the cap", kept.len() - room);
                kept.truncate(room);
            }
            records.append(&mut kept);
        }

        AggregateResult {
            records,
            mailbox_list: mailboxes,
            failures,
        }
    }
}

fn first_auth_failure(slots: &[Option<FetchOutcome>]) -> Option<(usize, &FetchError)> {
    slots.iter().enumerate().find_map(|(index, slot)| {
        slot.as_ref()?
            .errors()
            .iter()
            .find(|e| e.is_auth())
            .map(|e| (index, e))
    })
}
