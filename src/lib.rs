//! Fetch messages from an IMAP account and aggregate them into flat text
//! artifacts.
//!
//! The engine (`engine`) is independent of IMAP: it drives any
//! `mail::access::MailboxAccess`. `mail::imap_client` is the production
//! implementation.

pub mod auth;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod engine;
pub mod error;
pub mod mail;
pub mod runner;
pub mod store;
