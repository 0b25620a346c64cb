use log::{debug, warn};

use crate::domain::message::{MessageRecord, SearchCriterion};
use crate::engine::budget::RecordBudget;
use crate::engine::filter::{MailboxSelection, accept};
use crate::error::FetchError;
use crate::mail::access::{MailboxAccess, MailboxSession};

/// Result of one mailbox unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed(Vec<MessageRecord>),
    /// Some pages failed; `records` holds everything accepted around them.
    Partial {
        records: Vec<MessageRecord>,
        errors: Vec<FetchError>,
    },
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn errors(&self) -> &[FetchError] {
        match self {
            FetchOutcome::Completed(_) => &[],
            FetchOutcome::Partial { errors, .. } => errors,
            FetchOutcome::Failed(e) => std::slice::from_ref(e),
        }
    }

    pub fn into_parts(self) -> (Vec<MessageRecord>, Vec<FetchError>) {
        match self {
            FetchOutcome::Completed(records) => (records, vec![]),
            FetchOutcome::Partial { records, errors } => (records, errors),
            FetchOutcome::Failed(e) => (vec![], vec![e]),
        }
    }
}

/// Everything a worker needs besides the access layer.
#[derive(Debug, Clone, Copy)]
pub struct FetchUnit<'a> {
    /// Position in enumeration order; also the budget slot.
    pub index: usize,
    pub mailbox: &'a str,
    pub criterion: &'a SearchCriterion,
    pub selection: &'a MailboxSelection,
    pub page_size: usize,
    pub budget: &'a RecordBudget,
}

/// Page through one mailbox, keeping the records that pass the filter.
///
/// The session is dropped, and so closed, before this returns. There is no
/// retry: a failed page is reported, not repeated.
pub fn fetch_mailbox<A: MailboxAccess>(access: &A, unit: FetchUnit<'_>) -> FetchOutcome {
    if !unit.selection.is_selected(unit.mailbox) {
        debug!("{}: ignored", unit.mailbox);
        return FetchOutcome::Completed(vec![]);
    }
    if !unit.budget.has_room() {
        debug!("{}: budget exhausted before start", unit.mailbox);
        return FetchOutcome::Completed(vec![]);
    }

    let mut session = match access.open(unit.mailbox) {
        Ok(s) => s,
        Err(e) => {
            warn!("{}: open failed: {e}", unit.mailbox);
            return FetchOutcome::Failed(e);
        }
    };

    let mut records = Vec::new();
    let mut errors = Vec::new();
    let mut offset = 0;
    let mut fatal = false;

    while unit.budget.has_room() {
        match session.fetch_page(unit.criterion, unit.page_size, offset) {
            Ok(page) => {
                let fetched = page.records.len();
                let accepted: Vec<_> = page
                    .records
                    .into_iter()
                    .filter(|r| accept(r, unit.criterion))
                    .collect();
                let granted = unit.budget.claim(unit.index, accepted.len());
                debug!(
                    "{} @{offset}: fetched {fetched}, accepted {}, kept {granted}",
                    unit.mailbox,
                    accepted.len()
                );
                records.extend(accepted.into_iter().take(granted));
                if !page.has_more {
                    break;
                }
            }
            Err(e) if e.is_page_local() => {
                warn!("{} @{offset}: skipping page: {e}", unit.mailbox);
                errors.push(e);
            }
            Err(e) => {
                warn!("{} @{offset}: giving up on mailbox: {e}", unit.mailbox);
                errors.push(e);
                fatal = true;
                break;
            }
        }
        offset += unit.page_size;
    }
    drop(session);
    if unit.budget.is_cancelled() {
        debug!("{}: stopped by cancellation", unit.mailbox);
    }

    if errors.is_empty() {
        FetchOutcome::Completed(records)
    } else if fatal && records.is_empty() && errors.len() == 1 {
        FetchOutcome::Failed(errors.remove(0))
    } else {
        FetchOutcome::Partial { records, errors }
    }
}
