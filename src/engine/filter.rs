use std::collections::BTreeSet;

use chrono::Local;

use crate::domain::message::{MessageRecord, SearchCriterion};

/// Whether `record` qualifies for the output.
///
/// Records without a timestamp never qualify. The mailbox allow/deny lists are
/// not checked here; `MailboxSelection` handles them before any fetch.
pub fn accept(record: &MessageRecord, criterion: &SearchCriterion) -> bool {
    let Some(received_at) = record.received_at else {
        return false;
    };
    if received_at.with_timezone(&Local).date_naive() < criterion.since {
        return false;
    }

    match &criterion.to_address {
        None => true,
        Some(wanted) => {
            let wanted = wanted.trim();
            record
                .recipients
                .iter()
                .any(|r| r.trim().eq_ignore_ascii_case(wanted))
        }
    }
}

/// Mailbox allow/deny lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxSelection {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl MailboxSelection {
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        let norm = |names: &[String]| {
            names
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(canonical)
                .collect()
        };
        Self {
            include: norm(include),
            exclude: norm(exclude),
        }
    }

    /// An empty include list selects everything not excluded.
    pub fn is_selected(&self, mailbox: &str) -> bool {
        let name = canonical(mailbox);
        if self.exclude.contains(&name) {
            return false;
        }
        self.include.is_empty() || self.include.contains(&name)
    }
}

/// `INBOX` is case-insensitive in IMAP; every other name is compared as is.
fn canonical(name: &str) -> String {
    if name.eq_ignore_ascii_case("INBOX") {
        "INBOX".to_string()
    } else {
        name.to_string()
    }
}
