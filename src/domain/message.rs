use chrono::{DateTime, Duration, FixedOffset, NaiveDate};

pub type MailboxName = String;
pub type MessageUid = u32;

/// One fetched message. Built by the access layer, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub mailbox: MailboxName,
    pub uid: MessageUid,
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    /// INTERNALDATE, or the Date header when the server sent none.
    pub received_at: Option<DateTime<FixedOffset>>,
    pub body: String,
}

/// What to look for in every mailbox of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriterion {
    /// Inclusive, local calendar date.
    pub since: NaiveDate,
    pub to_address: Option<String>,
}

impl SearchCriterion {
    /// Cutoff is the start of the day `since_days_ago` days before `today`.
    pub fn new(today: NaiveDate, since_days_ago: u32, to_address: Option<String>) -> Self {
        Self {
            since: today - Duration::days(i64::from(since_days_ago)),
            to_address,
        }
    }

    /// Server-side narrowing for `UID SEARCH`. The predicate is still applied
    /// to every record since IMAP `TO` is a substring match.
    pub fn to_imap_query(&self) -> String {
        let mut query = format!("SINCE {}", self.since.format("%d-%b-%Y"));
        if let Some(addr) = &self.to_address {
            query.push_str(&format!(" TO \"{}\"", addr.replace('"', "")));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_counts_back_whole_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let c = SearchCriterion::new(today, 1, None);
        assert_eq!(c.since, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let c = SearchCriterion::new(today, 0, None);
        assert_eq!(c.since, today);
    }

    #[test]
    fn imap_query_uses_imap_date_format() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
        let c = SearchCriterion::new(today, 7, None);
        assert_eq!(c.to_imap_query(), "SINCE 05-Jun-2024");

        let c = SearchCriterion::new(today, 0, Some("x@y.com".into()));
        assert_eq!(c.to_imap_query(), "SINCE 12-Jun-2024 TO \"x@y.com\"");
    }
}
