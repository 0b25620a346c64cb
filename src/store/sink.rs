use std::fmt::Write as _;

use crate::domain::message::MessageRecord;
use crate::engine::AggregateResult;
use crate::error::SinkError;
use crate::mail::decoders::collapse_whitespace;

pub const RECORD_SEPARATOR: &str = "----------------------------------------";

/// Accepts the finished result of a run.
pub trait ResultSink {
    /// Write the mailbox-list artifact only.
    fn write_mailbox_list(&self, mailboxes: &[String]) -> Result<(), SinkError>;

    /// Write both artifacts. On error, the caller still owns `result` and
    /// may retry.
    fn write_result(&self, result: &AggregateResult) -> Result<(), SinkError>;
}

/// One name per line, in the order given.
pub fn render_mailbox_list(mailboxes: &[String]) -> String {
    let mut out = String::new();
    for name in mailboxes {
        out.push_str(name);
        out.push('\n');
    }
    out
}

pub fn render_records(records: &[MessageRecord]) -> String {
    let mut out = String::new();
    for record in records {
        render_record(&mut out, record);
    }
    out
}

fn render_record(out: &mut String, r: &MessageRecord) {
    let date = r
        .received_at
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "Mailbox: {}", r.mailbox);
    let _ = writeln!(out, "UID: {}", r.uid);
    let _ = writeln!(out, "From: {}", r.sender);
    let _ = writeln!(out, "To: {}", r.recipients.join(", "));
    let _ = writeln!(out, "Subject: {}", r.subject);
    let _ = writeln!(out, "Date: {date}");
    let _ = writeln!(out, "Body:\n{}", collapse_whitespace(&r.body));
    let _ = writeln!(out, "{RECORD_SEPARATOR}");
}
