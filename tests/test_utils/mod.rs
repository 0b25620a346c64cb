//! In-memory mailbox access for integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local};

use rs_mail_fetch::config::{Config, FetchSettings};
use rs_mail_fetch::domain::message::{MailboxName, MessageRecord, SearchCriterion};
use rs_mail_fetch::error::FetchError;
use rs_mail_fetch::mail::access::{MailboxAccess, MailboxSession, Page};

/// A message received `days_ago` days before now, addressed to `to`.
pub fn msg(mailbox: &str, uid: u32, days_ago: i64, to: &[&str]) -> MessageRecord {
    let received: DateTime<FixedOffset> = (Local::now() - chrono::Duration::days(days_ago)).fixed_offset();
    MessageRecord {
        mailbox: mailbox.to_string(),
        uid,
        subject: format!("{mailbox} #{uid}"),
        sender: "sender@example.com".to_string(),
        recipients: to.iter().map(|s| s.to_string()).collect(),
        received_at: Some(received),
        body: format!("body of {mailbox} {uid}\n\nsecond   line"),
    }
}

/// `n` fresh messages with uids `1..=n`.
pub fn fresh(mailbox: &str, n: u32) -> Vec<MessageRecord> {
    (1..=n).map(|uid| msg(mailbox, uid, 0, &["me@example.com"])).collect()
}

#[derive(Clone, Default)]
pub struct FakeMailbox {
    pub name: String,
    pub messages: Vec<MessageRecord>,
    pub open_error: Option<FetchError>,
    /// Page number (offset / page_size) -> error returned for that page.
    pub page_errors: HashMap<usize, FetchError>,
    /// Sleep before answering each page.
    pub page_delay: Duration,
}

impl FakeMailbox {
    pub fn new(name: &str, messages: Vec<MessageRecord>) -> Self {
        Self {
            name: name.to_string(),
            messages,
            ..Self::default()
        }
    }

    pub fn failing_open(mut self, e: FetchError) -> Self {
        self.open_error = Some(e);
        self
    }

    pub fn failing_page(mut self, page: usize, e: FetchError) -> Self {
        self.page_errors.insert(page, e);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }
}

#[derive(Default)]
pub struct Calls {
    pub opens: Mutex<HashMap<String, usize>>,
    pub closes: Mutex<HashMap<String, usize>>,
    pub pages: Mutex<HashMap<String, usize>>,
}

impl Calls {
    fn bump(map: &Mutex<HashMap<String, usize>>, key: &str) {
        *map.lock().unwrap().entry(key.to_string()).or_default() += 1;
    }

    pub fn opens(&self, mailbox: &str) -> usize {
        self.opens.lock().unwrap().get(mailbox).copied().unwrap_or(0)
    }

    pub fn closes(&self, mailbox: &str) -> usize {
        self.closes.lock().unwrap().get(mailbox).copied().unwrap_or(0)
    }

    pub fn pages(&self, mailbox: &str) -> usize {
        self.pages.lock().unwrap().get(mailbox).copied().unwrap_or(0)
    }

    pub fn total_pages(&self) -> usize {
        self.pages.lock().unwrap().values().sum()
    }

    pub fn total_opens(&self) -> usize {
        self.opens.lock().unwrap().values().sum()
    }

    pub fn total_closes(&self) -> usize {
        self.closes.lock().unwrap().values().sum()
    }
}

pub struct FakeAccess {
    pub mailboxes: Vec<FakeMailbox>,
    pub list_error: Option<FetchError>,
    pub calls: Arc<Calls>,
}

impl FakeAccess {
    pub fn new(mailboxes: Vec<FakeMailbox>) -> Self {
        Self {
            mailboxes,
            list_error: None,
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn failing_list(mut self, e: FetchError) -> Self {
        self.list_error = Some(e);
        self
    }
}

impl MailboxAccess for FakeAccess {
    type Session = FakeSession;

    fn list_mailboxes(&self) -> Result<Vec<MailboxName>, FetchError> {
        if let Some(e) = &self.list_error {
            return Err(e.clone());
        }
        Ok(self.mailboxes.iter().map(|m| m.name.clone()).collect())
    }

    fn open(&self, mailbox: &str) -> Result<FakeSession, FetchError> {
        Calls::bump(&self.calls.opens, mailbox);
        let found = self
            .mailboxes
            .iter()
            .find(|m| m.name == mailbox)
            .ok_or_else(|| FetchError::Protocol(format!("no mailbox {mailbox}")))?;
        if let Some(e) = &found.open_error {
            // A failed open never hands out a session, so count it closed here.
            Calls::bump(&self.calls.closes, mailbox);
            return Err(e.clone());
        }
        Ok(FakeSession {
            mailbox: found.clone(),
            calls: self.calls.clone(),
        })
    }
}

pub struct FakeSession {
    mailbox: FakeMailbox,
    calls: Arc<Calls>,
}

impl MailboxSession for FakeSession {
    fn fetch_page(
        &mut self,
        _criterion: &SearchCriterion,
        page_size: usize,
        offset: usize,
    ) -> Result<Page, FetchError> {
        Calls::bump(&self.calls.pages, &self.mailbox.name);
        if !self.mailbox.page_delay.is_zero() {
            thread::sleep(self.mailbox.page_delay);
        }
        if let Some(e) = self.mailbox.page_errors.get(&(offset / page_size)) {
            return Err(e.clone());
        }
        let all = &self.mailbox.messages;
        if offset >= all.len() {
            return Ok(Page::default());
        }
        let end = (offset + page_size).min(all.len());
        Ok(Page {
            records: all[offset..end].to_vec(),
            has_more: end < all.len(),
        })
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        Calls::bump(&self.calls.closes, &self.mailbox.name);
    }
}

/// A config that validates, with no mailbox excluded.
pub fn config(max_records: usize, page_size: usize, multi_threaded: bool) -> Config {
    Config {
        user: "me@example.com".into(),
        fetch_page_size: page_size,
        max_records,
        multi_threaded,
        worker_count: 4,
        mailboxes_to_exclude: vec![],
        since_days_ago: 1,
        ..Config::default()
    }
}

pub fn criterion_for(settings: &FetchSettings) -> SearchCriterion {
    SearchCriterion::new(
        Local::now().date_naive(),
        settings.since_days_ago,
        settings.to_address.clone(),
    )
}

/// `(mailbox, uid)` pairs, for compact assertions.
pub fn keys(records: &[MessageRecord]) -> Vec<(String, u32)> {
    records.iter().map(|r| (r.mailbox.clone(), r.uid)).collect()
}
