use crate::domain::message::{MailboxName, MessageRecord, SearchCriterion};
use crate::error::FetchError;

/// One bounded batch of records returned by a single fetch call.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<MessageRecord>,
    pub has_more: bool,
}

/// Blocking access to a mail account.
///
/// Implementations are shared by every worker of a run, so they must be
/// `Sync`. Sessions are not: each worker opens and owns its own.
pub trait MailboxAccess: Send + Sync {
    type Session: MailboxSession;

    /// Selectable mailboxes, in server order.
    fn list_mailboxes(&self) -> Result<Vec<MailboxName>, FetchError>;

    /// Open `mailbox` read-only. The session is closed when dropped.
    fn open(&self, mailbox: &str) -> Result<Self::Session, FetchError>;
}

pub trait MailboxSession {
    /// Records `[offset, offset + page_size)` of the messages matching
    /// `criterion`, in the order the mailbox yields them.
    fn fetch_page(
        &mut self,
        criterion: &SearchCriterion,
        page_size: usize,
        offset: usize,
    ) -> Result<Page, FetchError>;
}
