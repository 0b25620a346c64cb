//! Concurrent fetch-and-aggregate engine.
//!
//! `orchestrator` enumerates mailboxes and fans one unit of work per mailbox
//! out to `worker`, which pages through the access layer and keeps what
//! `filter` accepts. `budget` holds the global record cap they share.

pub mod budget;
pub mod filter;
pub mod orchestrator;
pub mod worker;

pub use orchestrator::{AggregateResult, MailboxFailure, Orchestrator, RunStatus};
pub use worker::FetchOutcome;
