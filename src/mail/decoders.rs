use chrono::{DateTime, FixedOffset};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};

use crate::domain::message::{MailboxName, MessageRecord, MessageUid};

/// Decode one raw RFC 822 message into a record.
///
/// `internal_date` wins over the `Date` header when both are present.
pub fn decode_message(
    mailbox: &MailboxName,
    uid: MessageUid,
    internal_date: Option<DateTime<FixedOffset>>,
    raw_rfc822: &[u8],
) -> Result<MessageRecord, mailparse::MailParseError> {
    let parsed = mailparse::parse_mail(raw_rfc822)?;

    let subject = parsed
        .headers
        .get_first_value("Subject")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let sender = parsed
        .headers
        .get_first_value("From")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let received_at = internal_date.or_else(|| {
        parsed
            .headers
            .get_first_value("Date")
            .and_then(|d| header_date(&d))
    });

    let body = extract_text_part(&parsed).unwrap_or_else(|| {
        parsed
            .get_body()
            .unwrap_or_else(|_| String::from_utf8_lossy(raw_rfc822).into_owned())
    });

    Ok(MessageRecord {
        mailbox: mailbox.clone(),
        uid,
        subject,
        sender,
        recipients: recipients(&parsed),
        received_at,
        body,
    })
}

/// RFC 2822 keeps the sender's offset; anything looser is read as UTC.
fn header_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(value.trim()).ok().or_else(|| {
        mailparse::dateparse(value)
            .ok()
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
            .map(|dt| dt.fixed_offset())
    })
}

/// Bare addresses from every `To` and `Cc` header, groups flattened. Each
/// address appears once (case-insensitively), where it was first seen.
fn recipients(parsed: &ParsedMail) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |addr: &str| {
        let addr = addr.trim();
        if !addr.is_empty() && !out.iter().any(|seen| seen.eq_ignore_ascii_case(addr)) {
            out.push(addr.to_string());
        }
    };
    for name in ["To", "Cc"] {
        for header in parsed.headers.get_all_headers(name) {
            let Ok(list) = mailparse::addrparse_header(header) else {
                // Unparseable list: keep the raw value so it still shows up.
                push(&header.get_value());
                continue;
            };
            for addr in list.iter() {
                match addr {
                    MailAddr::Single(info) => push(&info.addr),
                    MailAddr::Group(group) => group.addrs.iter().for_each(|info| push(&info.addr)),
                }
            }
        }
    }
    out
}

fn extract_text_part(p: &ParsedMail) -> Option<String> {
    if matches!(
        p.get_content_disposition().disposition,
        DispositionType::Attachment
    ) {
        return None;
    }

    let mime = p.ctype.mimetype.to_ascii_lowercase();
    if mime == "text/plain" {
        return p.get_body().ok();
    }

    for sp in &p.subparts {
        if let Some(t) = extract_text_part(sp) {
            return Some(t);
        }
    }

    if mime == "text/html" {
        return p.get_body().ok().map(|html| html_to_text(&html));
    }

    None
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 120).unwrap_or_else(|_| html.to_string())
}

/// Trim, and collapse every run of whitespace into one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &[u8] = b"From: Alice <alice@example.com>\r\n\
To: Bob <BOB@example.com>, carol@example.com\r\n\
Cc: team: dave@example.com, erin@example.com;\r\n\
Subject: =?UTF-8?B?44GT44KT44Gr44Gh44Gv?=\r\n\
Date: Tue, 11 Jun 2024 09:30:00 +0900\r\n\
\r\n\
Hello\r\n\
   world\r\n";

    const MULTIPART: &[u8] = b"From: a@example.com\r\n\
To: b@example.com\r\n\
Subject: parts\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain; name=\"notes.txt\"\r\n\
Content-Disposition: attachment; filename=\"notes.txt\"\r\n\
\r\n\
attached notes\r\n\
--XX\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>Rendered <b>body</b></p>\r\n\
--XX--\r\n";

    #[test]
    fn decodes_headers_and_recipients() {
        let rec = decode_message(&"INBOX".to_string(), 7, None, PLAIN).unwrap();
        assert_eq!(rec.mailbox, "INBOX");
        assert_eq!(rec.uid, 7);
        assert_eq!(rec.subject, "こんにちは");
        assert_eq!(rec.sender, "Alice <alice@example.com>");
        assert_eq!(
            rec.recipients,
            vec![
                "BOB@example.com",
                "carol@example.com",
                "dave@example.com",
                "erin@example.com"
            ]
        );
        assert_eq!(collapse_whitespace(&rec.body), "Hello world");
    }

    #[test]
    fn date_header_is_fallback_for_internal_date() {
        let rec = decode_message(&"INBOX".to_string(), 1, None, PLAIN).unwrap();
        let expected = DateTime::parse_from_rfc3339("2024-06-11T09:30:00+09:00").unwrap();
        assert_eq!(rec.received_at, Some(expected));
        // The sender's own offset survives, not just the instant.
        assert_eq!(
            rec.received_at.map(|d| d.offset().local_minus_utc()),
            Some(9 * 3600)
        );

        let internal = DateTime::parse_from_rfc3339("2024-06-12T08:00:00+09:00").unwrap();
        let rec = decode_message(&"INBOX".to_string(), 1, Some(internal), PLAIN).unwrap();
        assert_eq!(rec.received_at, Some(internal));
    }

    #[test]
    fn skips_attachments_and_renders_html() {
        let rec = decode_message(&"INBOX".to_string(), 2, None, MULTIPART).unwrap();
        let body = collapse_whitespace(&rec.body);
        assert!(body.contains("Rendered"), "{body}");
        assert!(!body.contains("attached notes"), "{body}");
        assert!(!body.contains("<p>"), "{body}");
        assert_eq!(rec.received_at, None);
    }

    #[test]
    fn repeated_recipients_are_kept_once() {
        let raw = b"From: a@example.com\r\n\
To: Bob <bob@example.com>, carol@example.com\r\n\
Cc: BOB@example.com, dave@example.com, carol@example.com\r\n\
Subject: twice\r\n\
\r\n\
hi\r\n";
        let rec = decode_message(&"INBOX".to_string(), 3, None, raw).unwrap();
        assert_eq!(
            rec.recipients,
            vec!["bob@example.com", "carol@example.com", "dave@example.com"]
        );
    }

    #[test]
    fn date_header_with_comment_still_parses() {
        let raw = b"From: a@example.com\r\n\
Date: 11 Jun 2024 09:30:00 +0900 (JST)\r\n\
\r\n\
hi\r\n";
        let rec = decode_message(&"INBOX".to_string(), 4, None, raw).unwrap();
        let expected = DateTime::parse_from_rfc3339("2024-06-11T00:30:00+00:00").unwrap();
        assert_eq!(rec.received_at, Some(expected));
    }

    #[test]
    fn collapse_whitespace_trims() {
        assert_eq!(collapse_whitespace("  a\r\n\tb  c \n"), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }
}
