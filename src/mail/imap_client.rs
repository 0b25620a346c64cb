use std::collections::HashMap;
use std::net::TcpStream;

use imap::types::NameAttribute;
use log::{debug, warn};
use native_tls::{TlsConnector, TlsStream};
use utf7_imap::{decode_utf7_imap, encode_utf7_imap};

use crate::auth::Credential;
use crate::domain::message::{MailboxName, MessageUid, SearchCriterion};
use crate::error::FetchError;
use crate::mail::access::{MailboxAccess, MailboxSession, Page};
use crate::mail::decoders::decode_message;

type TlsSession = imap::Session<TlsStream<TcpStream>>;

/// Mailbox access over IMAP with TLS. Every `open` is its own connection, so
/// workers never share a socket.
pub struct ImapClient {
    credential: Credential,
}

impl ImapClient {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    fn connect_and_login(&self) -> Result<TlsSession, FetchError> {
        let host = self.credential.host.as_str();
        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| FetchError::Connection(e.to_string()))?;
        let client = imap::connect((host, self.credential.port), host, &tls)?;

        let session = client
            .login(&self.credential.user, &self.credential.password)
            .map_err(|(e, _client)| match e {
                imap::error::Error::No(msg) | imap::error::Error::Bad(msg) => {
                    FetchError::Auth(msg)
                }
                other => FetchError::from(other),
            })?;
        debug!("logged in to {} as {}", host, self.credential.user);
        Ok(session)
    }
}

impl MailboxAccess for ImapClient {
    type Session = ImapMailboxSession;

    fn list_mailboxes(&self) -> Result<Vec<MailboxName>, FetchError> {
        let mut session = self.connect_and_login()?;
        let listed = session.list(Some(""), Some("*"));
        let names = listed.map(|names| {
            names
                .iter()
                .filter_map(|n| {
                    if n
                        .attributes()
                        .iter()
                        .any(|a| matches!(a, NameAttribute::NoSelect))
                    {
                        warn!(
                            "mailbox {:?} is not selectable, skipping",
                            decode_mailbox_name(n.name())
                        );
                        None
                    } else {
                        Some(decode_mailbox_name(n.name()))
                    }
                })
                .collect::<Vec<_>>()
        });
        if let Err(e) = session.logout() {
            warn!("logout after LIST failed: {e}");
        }
        Ok(names?)
    }

    fn open(&self, mailbox: &str) -> Result<ImapMailboxSession, FetchError> {
        let mut session = self.connect_and_login()?;
        match session.examine(encode_mailbox_name(mailbox)) {
            Ok(status) => {
                debug!("{mailbox}: {} messages", status.exists);
                Ok(ImapMailboxSession {
                    session,
                    mailbox: mailbox.to_string(),
                    uids: None,
                })
            }
            Err(e) => {
                if let Err(logout) = session.logout() {
                    warn!("logout after failed EXAMINE {mailbox:?} failed: {logout}");
                }
                Err(e.into())
            }
        }
    }
}

/// Wire form (IMAP modified UTF-7) to the name shown to users and matched
/// against the include/exclude lists.
pub fn decode_mailbox_name(raw: &str) -> MailboxName {
    decode_utf7_imap(raw.to_string())
}

pub fn encode_mailbox_name(name: &str) -> String {
    encode_utf7_imap(name.to_string())
}

/// An examined mailbox. Logs out on drop.
pub struct ImapMailboxSession {
    session: TlsSession,
    mailbox: MailboxName,
    /// Search result, newest first. Filled by the first page request.
    uids: Option<Vec<MessageUid>>,
}

impl ImapMailboxSession {
    fn matching_uids(&mut self, criterion: &SearchCriterion) -> Result<&[MessageUid], FetchError> {
        if self.uids.is_none() {
            let query = criterion.to_imap_query();
            let mut uids: Vec<MessageUid> = self.session.uid_search(&query)?.into_iter().collect();
            uids.sort_unstable_by(|a, b| b.cmp(a));
            debug!("{}: {} uids match {query}", self.mailbox, uids.len());
            self.uids = Some(uids);
        }
        Ok(self.uids.as_deref().unwrap_or_default())
    }
}

impl MailboxSession for ImapMailboxSession {
    fn fetch_page(
        &mut self,
        criterion: &SearchCriterion,
        page_size: usize,
        offset: usize,
    ) -> Result<Page, FetchError> {
        let all = self.matching_uids(criterion)?;
        if offset >= all.len() {
            return Ok(Page::default());
        }
        let end = (offset + page_size).min(all.len());
        let page_uids = all[offset..end].to_vec();
        let has_more = end < all.len();

        let uid_set = page_uids
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let fetches = self
            .session
            .uid_fetch(&uid_set, "(UID INTERNALDATE BODY.PEEK[])")
            .map_err(|e| match FetchError::from(e) {
                FetchError::Protocol(reason) => FetchError::PageDecode { offset, reason },
                other => other,
            })?;

        // Servers may answer in any order; index by UID and walk the slice.
        let by_uid: HashMap<MessageUid, &imap::types::Fetch> = fetches
            .iter()
            .filter_map(|f| f.uid.map(|uid| (uid, f)))
            .collect();

        let mut records = Vec::with_capacity(page_uids.len());
        for uid in page_uids {
            let Some(fetch) = by_uid.get(&uid) else {
                warn!("{}: UID {uid} vanished before FETCH", self.mailbox);
                continue;
            };
            let raw = fetch.body().ok_or_else(|| FetchError::PageDecode {
                offset,
                reason: format!("UID {uid} has no body"),
            })?;
            let record = decode_message(&self.mailbox, uid, fetch.internal_date(), raw)
                .map_err(|e| FetchError::PageDecode {
                    offset,
                    reason: format!("UID {uid}: {e}"),
                })?;
            records.push(record);
        }

        Ok(Page { records, has_more })
    }
}

impl Drop for ImapMailboxSession {
    fn drop(&mut self) {
        if let Err(e) = self.session.logout() {
            warn!("logout from {:?} failed: {e}", self.mailbox);
        }
    }
}
